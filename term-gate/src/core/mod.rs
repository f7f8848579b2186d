//! Pipeline orchestration, run state and reports.
//!
//! ```text
//! Init → CompletenessChecked → Deduplicated → StatsCollected → BoundsChecked → Completed
//!                                                                           └→ Aborted
//! ```
//!
//! [`ValidationPipeline`] drives a dataset through the stages in that order,
//! recording one [`RuleReport`] per rule into a [`ValidationReport`].

mod pipeline;
mod report;
mod state;

pub use pipeline::{run, ValidationPipeline};
pub use report::{RuleOutcome, RuleReport, StageBoundary, ValidationReport};
pub use state::PipelineState;
