//! Completeness: drop rows whose key columns are missing or malformed.

use super::StageOutcome;
use crate::core::RuleReport;
use crate::engine::{Dataset, DatasetEngine, Predicate};
use crate::error::Result;
use crate::rules::{Severity, COMPLETENESS_RULE_ID};
use crate::schema::KeyDefinition;
use crate::sink::ReportSink;
use tracing::{debug, instrument};

/// Keeps the rows where every completeness-key column survives coercion.
///
/// Invalid rows are counted first and handed to the sink before the valid
/// subset is selected; the invalid subset is released right after. When
/// nothing is invalid the input handle is returned as is.
#[instrument(skip_all, fields(dataset = %dataset, rows = row_count))]
pub async fn check_completeness(
    engine: &dyn DatasetEngine,
    dataset: &Dataset,
    row_count: u64,
    keys: &KeyDefinition,
    sink: &dyn ReportSink,
) -> Result<StageOutcome> {
    let valid = Predicate::coercible(&keys.completeness_key, keys.coercion);
    let invalid_rows = engine.select(dataset, &valid.clone().negate()).await?;
    let invalid_count = engine.count(&invalid_rows).await?;

    let entry = RuleReport::passed(
        COMPLETENESS_RULE_ID,
        keys.completeness_key.clone(),
        COMPLETENESS_RULE_ID,
        Severity::Recoverable,
        row_count,
    );

    if invalid_count == 0 {
        engine.release(&invalid_rows).await?;
        debug!("All rows complete");
        return Ok(StageOutcome {
            dataset: dataset.clone(),
            row_count_before: row_count,
            row_count_after: row_count,
            entry,
            inconsistency: None,
        });
    }

    sink.record_rejected(COMPLETENESS_RULE_ID, &invalid_rows, invalid_count);
    engine.release(&invalid_rows).await?;
    let kept = engine.select(dataset, &valid).await?;
    // The predicate is never NULL, so valid and invalid partition the input.
    let row_count_after = row_count.saturating_sub(invalid_count);

    debug!(rows.removed = invalid_count, "Incomplete rows dropped");
    Ok(StageOutcome {
        dataset: kept,
        row_count_before: row_count,
        row_count_after,
        entry: entry.filtered(invalid_count),
        inconsistency: None,
    })
}
