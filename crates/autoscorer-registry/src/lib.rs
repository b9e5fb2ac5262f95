//! AutoScorer Registry - thread-safe scorer lookup with dynamic loading
//! and hot-reload (spec §4.2).

pub mod builtin;
pub mod plugin;
pub mod registry;
pub mod scorer;

pub use builtin::register_builtin_scorers;
pub use registry::{Registry, RegistryError, DEFAULT_WATCH_INTERVAL};
pub use scorer::{Scorer, ScorerEntry, ScorerListing};
