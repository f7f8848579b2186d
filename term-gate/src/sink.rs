//! Destinations for report entries and rejected rows.
//!
//! The pipeline hands every entry, every rejected subset and the final report
//! to a [`ReportSink`] as the run progresses. The default [`TracingSink`] logs
//! them; [`MemorySink`] keeps them for inspection in tests and tools.

use crate::core::{RuleReport, ValidationReport};
use crate::engine::Dataset;
use std::sync::{Mutex, MutexGuard};
use tracing::{info, warn};

/// Receives run output as it is produced.
///
/// All methods have no-op defaults, so a sink only implements what it needs.
pub trait ReportSink: Send + Sync {
    /// Called once per rule entry, in evaluation order.
    fn record_entry(&self, _entry: &RuleReport) {}

    /// Called with the rows completeness or a recoverable bounds rule removes.
    ///
    /// `rows` is released as soon as this returns. A sink that wants the
    /// rejected rows must read them inside the callback; a stored handle
    /// is only good for its name.
    fn record_rejected(&self, _rule_id: &str, _rows: &Dataset, _count: u64) {}

    /// Called when a data-model inconsistency is detected.
    fn record_inconsistency(&self, _message: &str) {}

    /// Called once with the final report (complete or aborted).
    fn record_report(&self, _report: &ValidationReport) {}
}

/// Logs everything through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn record_entry(&self, entry: &RuleReport) {
        info!(
            rule.id = %entry.rule_id,
            rule.kind = %entry.kind,
            rule.severity = %entry.severity,
            rule.outcome = ?entry.outcome,
            rows.examined = entry.rows_examined,
            rows.removed = entry.rows_removed,
            "Rule evaluated"
        );
    }

    fn record_rejected(&self, rule_id: &str, rows: &Dataset, count: u64) {
        info!(
            rule.id = %rule_id,
            dataset = %rows,
            rows.rejected = count,
            "Rows rejected"
        );
    }

    fn record_inconsistency(&self, message: &str) {
        warn!(message = %message, "Data inconsistency detected");
    }

    fn record_report(&self, report: &ValidationReport) {
        info!(
            run.id = report.run_id,
            run.state = %report.final_state,
            rows.initial = report.initial_row_count,
            rows.remaining = report.final_row_count,
            rows.removed = report.total_removed(),
            elapsed_ms = report.elapsed_ms,
            "Validation run finished"
        );
    }
}

/// Something a [`MemorySink`] received.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Entry(RuleReport),
    Rejected {
        rule_id: String,
        dataset: Dataset,
        count: u64,
    },
    Inconsistency(String),
    Report(Box<ValidationReport>),
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SinkEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SinkEvent>> {
        // Events are only appended, so a poisoned lock still holds a valid Vec.
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: SinkEvent) {
        self.lock().push(event);
    }

    /// All events, in arrival order.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    /// Rule entries, in arrival order.
    pub fn entries(&self) -> Vec<RuleReport> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Entry(entry) => Some(entry.clone()),
                _ => None,
            })
            .collect()
    }

    /// Rejected subsets as `(rule_id, dataset, count)`.
    ///
    /// The handles were released when the run moved on; they identify the
    /// subset but can no longer be read.
    pub fn rejected(&self) -> Vec<(String, Dataset, u64)> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Rejected {
                    rule_id,
                    dataset,
                    count,
                } => Some((rule_id.clone(), dataset.clone(), *count)),
                _ => None,
            })
            .collect()
    }

    pub fn inconsistencies(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Inconsistency(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// The most recent final report, if any.
    pub fn last_report(&self) -> Option<ValidationReport> {
        self.lock().iter().rev().find_map(|e| match e {
            SinkEvent::Report(report) => Some(report.as_ref().clone()),
            _ => None,
        })
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ReportSink for MemorySink {
    fn record_entry(&self, entry: &RuleReport) {
        self.push(SinkEvent::Entry(entry.clone()));
    }

    fn record_rejected(&self, rule_id: &str, rows: &Dataset, count: u64) {
        self.push(SinkEvent::Rejected {
            rule_id: rule_id.to_string(),
            dataset: rows.clone(),
            count,
        });
    }

    fn record_inconsistency(&self, message: &str) {
        self.push(SinkEvent::Inconsistency(message.to_string()));
    }

    fn record_report(&self, report: &ValidationReport) {
        self.push(SinkEvent::Report(Box::new(report.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        let entry = RuleReport::passed("ind_length", vec!["ind".into()], "bounds", Severity::Recoverable, 4)
            .filtered(1);
        sink.record_entry(&entry);
        sink.record_rejected("ind_length", &Dataset::new("gate_view_3"), 1);
        sink.record_inconsistency("duplicates remain");

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.entries(), vec![entry]);
        assert_eq!(
            sink.rejected(),
            vec![("ind_length".to_string(), Dataset::new("gate_view_3"), 1)]
        );
        assert_eq!(sink.inconsistencies(), vec!["duplicates remain".to_string()]);
        assert!(sink.last_report().is_none());

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_default_methods_are_noops() {
        struct Silent;
        impl ReportSink for Silent {}

        let sink = Silent;
        sink.record_inconsistency("ignored");
        sink.record_rejected("r", &Dataset::new("d"), 0);
    }
}
