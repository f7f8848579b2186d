//! The four validation stages.
//!
//! Each stage takes a dataset handle and its row count, issues engine
//! operations, and returns a new handle plus the report entry for what it did.
//! Stages never mutate their input; the pipeline decides which handle moves on.

mod bounds;
mod completeness;
mod stats;
mod uniqueness;

pub use bounds::{check_bounds, BoundsOutcome};
pub use completeness::check_completeness;
pub use stats::{collect_stats, RunStats};
pub use uniqueness::resolve_duplicates;

use crate::core::RuleReport;
use crate::engine::Dataset;

/// Result of the completeness and uniqueness stages.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Dataset passed to the next stage
    pub dataset: Dataset,
    pub row_count_before: u64,
    pub row_count_after: u64,
    /// Report entry for the stage
    pub entry: RuleReport,
    /// Inconsistency detected but not repaired
    pub inconsistency: Option<String>,
}

impl StageOutcome {
    /// Rows removed by the stage.
    pub fn rows_removed(&self) -> u64 {
        self.row_count_before.saturating_sub(self.row_count_after)
    }
}
