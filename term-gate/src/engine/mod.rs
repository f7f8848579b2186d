//! The dataset engine collaborator.
//!
//! The validation stages never touch rows directly. They issue scan, filter,
//! aggregate and distinct-count operations against a [`DatasetEngine`] and
//! await each result before moving on. Partition-level parallelism is the
//! engine's business; every aggregate used here is commutative and associative.
//!
//! [`DataFusionEngine`] is the shipped implementation.

mod predicate;
mod session;

pub use predicate::{Coercion, Measure, Predicate};
pub use session::DataFusionEngine;

use crate::error::Result;
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A handle to an immutable dataset held by an engine.
///
/// Handles are cheap to clone. Two handles are equal when they name the same
/// registered dataset, which means they hold exactly the same rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dataset {
    name: Arc<str>,
}

impl Dataset {
    /// Creates a handle for a dataset registered under `name`.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the registered name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// One column to include in an aggregate scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateRequest {
    pub column: String,
    pub measure: Measure,
}

impl AggregateRequest {
    pub fn new(column: impl Into<String>, measure: Measure) -> Self {
        Self {
            column: column.into(),
            measure,
        }
    }
}

/// Aggregate statistics of one column.
///
/// Value statistics are filled for [`Measure::IntegerValue`] requests, length
/// statistics for [`Measure::Length`] requests. `None` means the statistic is
/// undefined (no rows, or only NULLs).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<i64>,
}

impl ColumnStats {
    /// Returns true when no statistic is defined.
    pub fn is_undefined(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.min_length.is_none()
            && self.max_length.is_none()
    }
}

/// Relational primitives the validation stages are built on.
///
/// Implementations must never mutate a dataset in place: `select` and
/// `deduplicate` return new handles and leave their input untouched.
#[async_trait]
pub trait DatasetEngine: Send + Sync {
    /// Counts the rows of a dataset.
    async fn count(&self, dataset: &Dataset) -> Result<u64>;

    /// Counts distinct tuples of the projection onto `columns`.
    async fn distinct_count(&self, dataset: &Dataset, columns: &[String]) -> Result<u64>;

    /// Returns the rows matching `predicate`.
    async fn select(&self, dataset: &Dataset, predicate: &Predicate) -> Result<Dataset>;

    /// Computes min/max of each requested measure in a single scan.
    async fn aggregate(
        &self,
        dataset: &Dataset,
        requests: &[AggregateRequest],
    ) -> Result<HashMap<String, ColumnStats>>;

    /// Keeps exactly one row per distinct tuple of `key_columns`.
    ///
    /// Which duplicate survives is unspecified.
    async fn deduplicate(&self, dataset: &Dataset, key_columns: &[String]) -> Result<Dataset>;

    /// Materializes a dataset.
    async fn collect(&self, dataset: &Dataset) -> Result<Vec<RecordBatch>>;

    /// Drops a dataset nobody reads any more.
    ///
    /// The handle and all of its clones become invalid. Datasets already
    /// derived from it stay usable. Releasing an unknown handle is a no-op.
    async fn release(&self, dataset: &Dataset) -> Result<()>;
}
