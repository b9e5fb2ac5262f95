//! In-tree scorers, registered via an explicit `init`-style call rather
//! than the source's decorator-at-import-time registration (spec §9).

mod classification_f1;
mod csv_table;
mod regression_rmse;

use crate::Registry;
use std::sync::Arc;

/// Registers every built-in scorer. Call once at process startup, before
/// serving any `score`/`pipeline` requests.
pub fn register_builtin_scorers(registry: &Registry) {
    registry.register(Arc::new(classification_f1::ClassificationF1));
    registry.register(Arc::new(regression_rmse::RegressionRmse));
}
