//! Statistics collection for the bounds stage.

use crate::engine::{AggregateRequest, ColumnStats, Dataset, DatasetEngine};
use crate::error::Result;
use crate::rules::RuleSet;
use crate::schema::SchemaDescriptor;
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Aggregates of every rule-referenced column, computed once per run.
///
/// Bounds rules are evaluated against these values even after earlier rules
/// have filtered rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    columns: HashMap<String, ColumnStats>,
}

impl RunStats {
    pub fn new(columns: HashMap<String, ColumnStats>) -> Self {
        Self { columns }
    }

    /// Statistics of `column`; undefined when the column was not collected.
    pub fn get(&self, column: &str) -> ColumnStats {
        self.columns.get(column).copied().unwrap_or_default()
    }

    pub fn columns(&self) -> &HashMap<String, ColumnStats> {
        &self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Computes min/max of every column referenced by `rules` in one engine call.
///
/// Each column is measured according to its semantic type. No engine call is
/// made when the rule set is empty.
#[instrument(skip_all, fields(dataset = %dataset, rules = rules.len()))]
pub async fn collect_stats(
    engine: &dyn DatasetEngine,
    dataset: &Dataset,
    schema: &SchemaDescriptor,
    rules: &RuleSet,
) -> Result<RunStats> {
    let requests: Vec<AggregateRequest> = rules
        .referenced_columns()
        .into_iter()
        .filter_map(|name| {
            schema
                .column(name)
                .map(|spec| AggregateRequest::new(name, spec.semantic_type.measure()))
        })
        .collect();

    if requests.is_empty() {
        return Ok(RunStats::default());
    }

    let columns = engine.aggregate(dataset, &requests).await?;
    debug!(columns = columns.len(), "Statistics collected");
    Ok(RunStats::new(columns))
}
