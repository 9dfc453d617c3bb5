//! Harvest orchestration: options, progress events, and the engine
//! that drives repository discovery through to CSV rows.

pub mod engine;
pub mod progress;
pub mod types;

pub use engine::{run_harvest, HarvestError};
pub use progress::{HarvestProgress, ProgressCallback};
pub use types::{HarvestOptions, HarvestRow, HarvestSummary};
