//! Uniqueness: keep one row per uniqueness-key tuple.

use super::StageOutcome;
use crate::core::RuleReport;
use crate::engine::{Dataset, DatasetEngine};
use crate::error::Result;
use crate::rules::{Severity, UNIQUENESS_RULE_ID};
use crate::schema::KeyDefinition;
use tracing::{debug, instrument, warn};

/// Removes duplicate key tuples.
///
/// Compares the distinct-key count with the row count; if they differ, the
/// dataset is deduplicated and both counts are taken again once. A remaining
/// mismatch is reported as an inconsistency, never retried.
#[instrument(skip_all, fields(dataset = %dataset, rows = row_count))]
pub async fn resolve_duplicates(
    engine: &dyn DatasetEngine,
    dataset: &Dataset,
    row_count: u64,
    keys: &KeyDefinition,
) -> Result<StageOutcome> {
    let key = &keys.uniqueness_key;
    let distinct = engine.distinct_count(dataset, key).await?;

    let entry = RuleReport::passed(
        UNIQUENESS_RULE_ID,
        key.clone(),
        UNIQUENESS_RULE_ID,
        Severity::Recoverable,
        row_count,
    );

    if distinct == row_count {
        debug!("No duplicate keys");
        return Ok(StageOutcome {
            dataset: dataset.clone(),
            row_count_before: row_count,
            row_count_after: row_count,
            entry,
            inconsistency: None,
        });
    }

    debug!(distinct, "Duplicate keys found");
    let deduplicated = engine.deduplicate(dataset, key).await?;
    let row_count_after = engine.count(&deduplicated).await?;
    let distinct_after = engine.distinct_count(&deduplicated, key).await?;

    let inconsistency = (distinct_after != row_count_after).then(|| {
        let message = format!(
            "uniqueness key ({}) still has {} rows for {} distinct tuples after deduplication",
            key.join(", "),
            row_count_after,
            distinct_after
        );
        warn!(%message);
        message
    });

    let removed = row_count.saturating_sub(row_count_after);
    Ok(StageOutcome {
        dataset: deduplicated,
        row_count_before: row_count,
        row_count_after,
        entry: entry.filtered(removed),
        inconsistency,
    })
}
