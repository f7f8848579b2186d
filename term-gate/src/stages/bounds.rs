//! Bounds checking: evaluate each rule against the collected statistics.

use super::RunStats;
use crate::core::RuleReport;
use crate::engine::{Dataset, DatasetEngine, Predicate};
use crate::error::Result;
use crate::rules::{BoundCheck, Breach, Rule, RuleSet};
use crate::sink::ReportSink;
use tracing::{debug, instrument, warn};

/// Result of the bounds stage.
#[derive(Debug, Clone)]
pub enum BoundsOutcome {
    /// Every rule was evaluated.
    Completed {
        dataset: Dataset,
        row_count_after: u64,
        /// One entry per rule, in declaration order
        entries: Vec<RuleReport>,
    },
    /// A fatal rule was breached. Later rules were not evaluated.
    Aborted {
        /// Entries up to and including the aborting rule
        entries: Vec<RuleReport>,
        rule: Rule,
        breach: Breach,
    },
}

/// A rule judged against the statistics, before any row is touched.
struct Verdict<'a> {
    rule: &'a Rule,
    check: &'a BoundCheck,
    breach: Option<Breach>,
}

impl Verdict<'_> {
    fn entry(&self, rows_examined: u64) -> RuleReport {
        RuleReport::passed(
            self.rule.id.clone(),
            vec![self.rule.column.clone()],
            self.rule.kind.as_str(),
            self.rule.severity,
            rows_examined,
        )
        .with_message(self.check.to_string())
    }

    /// Entry for a rule judged before a fatal rule stopped the run.
    fn unapplied(&self, rows_examined: u64, aborted_by: &str) -> RuleReport {
        let entry = self.entry(rows_examined);
        match self.breach {
            None => entry,
            Some(breach) => entry
                .with_breach(breach)
                .filtered(0)
                .with_message(format!("filter not applied, run aborted by {aborted_by}")),
        }
    }
}

/// Evaluates `rules` in order against `stats`.
///
/// Every rule is judged against the statistics first. If a fatal rule is
/// breached the stage stops there without filtering anything, and the
/// entries of earlier rules report no removed rows. Otherwise each
/// recoverable breach removes the rows outside its bounds, in rule order.
/// Intermediate subsets are released once the next one exists.
#[instrument(skip_all, fields(dataset = %dataset, rows = row_count, rules = rules.len()))]
pub async fn check_bounds(
    engine: &dyn DatasetEngine,
    dataset: &Dataset,
    row_count: u64,
    rules: &RuleSet,
    stats: &RunStats,
    sink: &dyn ReportSink,
) -> Result<BoundsOutcome> {
    let mut verdicts = Vec::with_capacity(rules.len());
    for rule in rules {
        let Some(check) = rule.bound_check() else {
            continue;
        };
        let verdict = Verdict {
            rule,
            check,
            breach: check.evaluate(&stats.get(&rule.column)),
        };

        if let Some(breach) = verdict.breach.filter(|_| rule.severity.is_fatal()) {
            warn!(
                rule.id = %rule.id,
                column = %rule.column,
                statistic = %breach.statistic,
                observed = breach.observed,
                bound = breach.bound,
                "Fatal rule breached"
            );
            let mut entries: Vec<RuleReport> = verdicts
                .iter()
                .map(|earlier: &Verdict<'_>| earlier.unapplied(row_count, &rule.id))
                .collect();
            entries.push(verdict.entry(row_count).with_breach(breach).aborted());
            return Ok(BoundsOutcome::Aborted {
                entries,
                rule: rule.clone(),
                breach,
            });
        }
        verdicts.push(verdict);
    }

    let mut current = dataset.clone();
    let mut current_count = row_count;
    let mut entries = Vec::with_capacity(verdicts.len());

    for verdict in &verdicts {
        let rule = verdict.rule;
        let entry = verdict.entry(current_count);
        let Some(breach) = verdict.breach else {
            debug!(rule.id = %rule.id, "Rule passed");
            entries.push(entry);
            continue;
        };

        let in_bounds = Predicate::in_bounds(rule.column.clone(), *verdict.check);
        let rejected = engine.select(&current, &in_bounds.clone().negate()).await?;
        let rejected_count = engine.count(&rejected).await?;

        if rejected_count == 0 {
            engine.release(&rejected).await?;
            // Statistics predate earlier filters; the offenders may be gone.
            entries.push(
                entry
                    .with_breach(breach)
                    .filtered(0)
                    .with_message("violating rows already removed by earlier rules"),
            );
            continue;
        }

        sink.record_rejected(&rule.id, &rejected, rejected_count);
        engine.release(&rejected).await?;
        let kept = engine.select(&current, &in_bounds).await?;
        let kept_count = engine.count(&kept).await?;
        let removed = current_count.saturating_sub(kept_count);

        debug!(rule.id = %rule.id, rows.removed = removed, "Recoverable rule filtered rows");
        entries.push(entry.with_breach(breach).filtered(removed));
        if current != *dataset {
            engine.release(&current).await?;
        }
        current = kept;
        current_count = kept_count;
    }

    Ok(BoundsOutcome::Completed {
        dataset: current,
        row_count_after: current_count,
        entries,
    })
}
