//! Validation report types.

use super::PipelineState;
use crate::rules::{Breach, Severity};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What a rule did during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleOutcome {
    /// No violation
    Passed,
    /// Offending rows were removed
    Filtered,
    /// The run stopped on this rule
    Aborted,
}

/// The result of evaluating one rule (or one key stage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleReport {
    /// Rule id; `completeness` and `uniqueness` for the key stages
    pub rule_id: String,
    /// Column(s) the rule looked at
    pub columns: Vec<String>,
    /// Rule kind label
    pub kind: String,
    /// Severity of the rule
    pub severity: Severity,
    /// Rows in the dataset when the rule ran
    pub rows_examined: u64,
    /// Rows the rule removed
    pub rows_removed: u64,
    /// What happened
    pub outcome: RuleOutcome,
    /// The breached statistic, for violated bounds rules
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breach: Option<Breach>,
    /// Additional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RuleReport {
    /// Creates a passing entry.
    pub fn passed(
        rule_id: impl Into<String>,
        columns: Vec<String>,
        kind: impl Into<String>,
        severity: Severity,
        rows_examined: u64,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            columns,
            kind: kind.into(),
            severity,
            rows_examined,
            rows_removed: 0,
            outcome: RuleOutcome::Passed,
            breach: None,
            message: None,
        }
    }

    /// Marks the entry as filtered with `rows_removed` rows gone.
    pub fn filtered(mut self, rows_removed: u64) -> Self {
        self.outcome = RuleOutcome::Filtered;
        self.rows_removed = rows_removed;
        self
    }

    /// Marks the entry as the one that aborted the run.
    pub fn aborted(mut self) -> Self {
        self.outcome = RuleOutcome::Aborted;
        self.rows_removed = 0;
        self
    }

    pub fn with_breach(mut self, breach: Breach) -> Self {
        self.breach = Some(breach);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Row counts on either side of one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageBoundary {
    /// The state reached when the stage finished
    pub stage: PipelineState,
    pub row_count_before: u64,
    pub row_count_after: u64,
}

/// The outcome of one validation run.
///
/// Owned by the pipeline while the run is in progress and handed to the
/// caller once the run reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Process-unique id of the run
    pub run_id: u64,
    /// Start time (RFC 3339)
    pub started_at: String,
    /// Terminal state of the run
    pub final_state: PipelineState,
    /// Rows in the input dataset
    pub initial_row_count: u64,
    /// Rows in the returned dataset
    pub final_row_count: u64,
    /// Row counts at each stage boundary, in order
    pub stages: Vec<StageBoundary>,
    /// One entry per evaluated rule, in order
    pub entries: Vec<RuleReport>,
    /// Data-model inconsistencies found but not repaired
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inconsistencies: Vec<String>,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

impl ValidationReport {
    /// Returns true if the run reached `Completed`.
    ///
    /// An aborted report stops at the fatal rule and must not be read as a
    /// full account of the batch.
    pub fn is_complete(&self) -> bool {
        self.final_state == PipelineState::Completed
    }

    /// Returns true if the run stopped on a fatal rule.
    pub fn is_aborted(&self) -> bool {
        self.final_state == PipelineState::Aborted
    }

    /// Total rows removed across all entries.
    pub fn total_removed(&self) -> u64 {
        self.entries.iter().map(|e| e.rows_removed).sum()
    }

    /// Looks up the entry for a rule id.
    pub fn entry(&self, rule_id: &str) -> Option<&RuleReport> {
        self.entries.iter().find(|e| e.rule_id == rule_id)
    }

    /// Looks up the boundary recorded for a stage.
    pub fn stage(&self, stage: PipelineState) -> Option<&StageBoundary> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Entries with the given outcome.
    pub fn entries_with_outcome(&self, outcome: RuleOutcome) -> Vec<&RuleReport> {
        self.entries
            .iter()
            .filter(|e| e.outcome == outcome)
            .collect()
    }

    /// Returns true if any inconsistency was recorded.
    pub fn has_inconsistencies(&self) -> bool {
        !self.inconsistencies.is_empty()
    }
}

/// Accumulates a report while a run is in progress.
#[derive(Debug)]
pub(crate) struct ReportBuilder {
    run_id: u64,
    started_at: String,
    started: Instant,
    initial_row_count: u64,
    stages: Vec<StageBoundary>,
    entries: Vec<RuleReport>,
    inconsistencies: Vec<String>,
}

impl ReportBuilder {
    pub(crate) fn new(run_id: u64, initial_row_count: u64) -> Self {
        Self {
            run_id,
            started_at: chrono::Utc::now().to_rfc3339(),
            started: Instant::now(),
            initial_row_count,
            stages: Vec::new(),
            entries: Vec::new(),
            inconsistencies: Vec::new(),
        }
    }

    pub(crate) fn record_stage(&mut self, stage: PipelineState, before: u64, after: u64) {
        self.stages.push(StageBoundary {
            stage,
            row_count_before: before,
            row_count_after: after,
        });
    }

    pub(crate) fn record_entry(&mut self, entry: RuleReport) {
        self.entries.push(entry);
    }

    pub(crate) fn record_inconsistency(&mut self, message: String) {
        self.inconsistencies.push(message);
    }

    pub(crate) fn finish(self, final_state: PipelineState, final_row_count: u64) -> ValidationReport {
        ValidationReport {
            run_id: self.run_id,
            started_at: self.started_at,
            final_state,
            initial_row_count: self.initial_row_count,
            final_row_count,
            stages: self.stages,
            entries: self.entries,
            inconsistencies: self.inconsistencies,
            elapsed_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::StatisticKind;

    fn sample_report() -> ValidationReport {
        let mut builder = ReportBuilder::new(7, 10);
        builder.record_stage(PipelineState::CompletenessChecked, 10, 9);
        builder.record_entry(
            RuleReport::passed("completeness", vec!["id".into()], "completeness", Severity::Recoverable, 10)
                .filtered(1),
        );
        builder.record_entry(RuleReport::passed(
            "uniqueness",
            vec!["id".into()],
            "uniqueness",
            Severity::Recoverable,
            9,
        ));
        builder.finish(PipelineState::Completed, 9)
    }

    #[test]
    fn test_report_accessors() {
        let report = sample_report();
        assert!(report.is_complete());
        assert!(!report.is_aborted());
        assert_eq!(report.total_removed(), 1);
        assert_eq!(report.entry("completeness").map(|e| e.rows_removed), Some(1));
        assert_eq!(report.entries_with_outcome(RuleOutcome::Passed).len(), 1);
        assert_eq!(
            report.stage(PipelineState::CompletenessChecked).map(|s| s.row_count_after),
            Some(9)
        );
        assert!(!report.has_inconsistencies());
    }

    #[test]
    fn test_aborted_entry_clears_removed() {
        let entry = RuleReport::passed("r", vec![], "bounds", Severity::Fatal, 5)
            .with_breach(Breach {
                statistic: StatisticKind::MaxLength,
                observed: 30,
                bound: 24,
            })
            .aborted();
        assert_eq!(entry.outcome, RuleOutcome::Aborted);
        assert_eq!(entry.rows_removed, 0);
        assert!(entry.breach.is_some());
    }

    #[test]
    fn test_report_serde() {
        let report = sample_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["final_state"], "completed");
        assert_eq!(json["entries"][0]["outcome"], "filtered");
        assert!(json.get("inconsistencies").is_none());
        let decoded: ValidationReport = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, report);
    }
}
