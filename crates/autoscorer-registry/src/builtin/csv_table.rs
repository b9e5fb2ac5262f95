//! Minimal two-column CSV loading shared by the built-in scorers.

use autoscorer_core::{ErrorBlock, ErrorCode, Stage};
use std::collections::BTreeMap;
use std::path::Path;

/// Reads a two-column `id,<value>` CSV into an ordered map, keyed by `id`.
/// The value column's header name is not inspected — only its position.
pub fn read_id_value_csv(path: &Path) -> Result<BTreeMap<String, String>, ErrorBlock> {
    if !path.is_file() {
        return Err(ErrorBlock::new(
            ErrorCode::MissingFile,
            Stage::Scoring,
            format!("{} not found", path.display()),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| ErrorBlock::new(ErrorCode::BadFormat, Stage::Scoring, e.to_string()))?;

    let mut rows = BTreeMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| ErrorBlock::new(ErrorCode::BadFormat, Stage::Scoring, e.to_string()))?;
        let id = record
            .get(0)
            .ok_or_else(|| ErrorBlock::new(ErrorCode::BadFormat, Stage::Scoring, "row missing id column"))?
            .to_string();
        let value = record
            .get(1)
            .ok_or_else(|| ErrorBlock::new(ErrorCode::BadFormat, Stage::Scoring, "row missing value column"))?
            .to_string();
        rows.insert(id, value);
    }
    Ok(rows)
}

/// Fails with `MISMATCH` unless `gt` and `pred` share exactly the same key
/// set (spec §8 scenario 6).
pub fn assert_same_ids(
    gt: &BTreeMap<String, String>,
    pred: &BTreeMap<String, String>,
) -> Result<(), ErrorBlock> {
    let gt_ids: std::collections::BTreeSet<_> = gt.keys().collect();
    let pred_ids: std::collections::BTreeSet<_> = pred.keys().collect();
    if gt_ids != pred_ids {
        let missing: Vec<_> = gt_ids.difference(&pred_ids).cloned().collect();
        let extra: Vec<_> = pred_ids.difference(&gt_ids).cloned().collect();
        return Err(ErrorBlock::new(
            ErrorCode::Mismatch,
            Stage::Scoring,
            format!("id sets differ: missing={:?} extra={:?}", missing, extra),
        ));
    }
    Ok(())
}
