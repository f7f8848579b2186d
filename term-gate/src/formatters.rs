//! Report formatting.
//!
//! Turns a [`ValidationReport`] into JSON for machines or a plain-text summary
//! for terminals and logs.
//!
//! # Examples
//!
//! ```rust,no_run
//! use term_gate::formatters::{HumanFormatter, ReportFormatter};
//! # use term_gate::core::ValidationReport;
//! # fn show(report: &ValidationReport) -> term_gate::error::Result<()> {
//! let output = HumanFormatter::new().format(report)?;
//! println!("{output}");
//! # Ok(())
//! # }
//! ```

use crate::core::{RuleOutcome, RuleReport, ValidationReport};
use crate::error::{GateError, Result};
use std::fmt::Write;

/// Configuration options for formatting reports.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Include the per-stage row counts
    pub include_stages: bool,
    /// Include entries for rules that passed
    pub include_passed: bool,
    /// Maximum number of entries to display (`None` for all)
    pub max_entries: Option<usize>,
    /// Whether to use colorized output (for the human formatter)
    pub use_colors: bool,
    /// Whether to include the run start time
    pub include_timestamps: bool,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            include_stages: true,
            include_passed: true,
            max_entries: None,
            use_colors: true,
            include_timestamps: true,
        }
    }
}

impl FormatterConfig {
    /// Creates a minimal configuration showing only the summary and violations.
    pub fn minimal() -> Self {
        Self {
            include_stages: false,
            include_passed: false,
            max_entries: None,
            use_colors: false,
            include_timestamps: false,
        }
    }

    /// Creates a configuration suitable for CI/CD environments.
    pub fn ci() -> Self {
        Self {
            include_stages: true,
            include_passed: false,
            max_entries: Some(50),
            use_colors: false,
            include_timestamps: true,
        }
    }

    pub fn with_stages(mut self, include: bool) -> Self {
        self.include_stages = include;
        self
    }

    pub fn with_passed(mut self, include: bool) -> Self {
        self.include_passed = include;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    pub fn with_colors(mut self, use_colors: bool) -> Self {
        self.use_colors = use_colors;
        self
    }

    fn selected<'a>(&self, report: &'a ValidationReport) -> (Vec<&'a RuleReport>, usize) {
        let candidates: Vec<&RuleReport> = report
            .entries
            .iter()
            .filter(|e| self.include_passed || e.outcome != RuleOutcome::Passed)
            .collect();
        let total = candidates.len();
        let shown = match self.max_entries {
            Some(max) => candidates.into_iter().take(max).collect(),
            None => candidates,
        };
        (shown, total)
    }
}

/// Formats a validation report into a string.
pub trait ReportFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String>;

    /// Formats with explicit options. The default ignores them.
    fn format_with_config(
        &self,
        report: &ValidationReport,
        _config: &FormatterConfig,
    ) -> Result<String> {
        self.format(report)
    }
}

/// Formats reports as JSON.
///
/// Entries are filtered according to the configuration; everything else is
/// the report's own serde representation.
#[derive(Debug, Clone)]
pub struct JsonFormatter {
    config: FormatterConfig,
    pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
            pretty: true,
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self {
            config,
            pretty: true,
        }
    }

    /// Sets whether to use pretty-printed JSON.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for JsonFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let (entries, _) = config.selected(report);
        let mut filtered = report.clone();
        filtered.entries = entries.into_iter().cloned().collect();
        if !config.include_stages {
            filtered.stages.clear();
        }

        let json = if self.pretty {
            serde_json::to_string_pretty(&filtered)
        } else {
            serde_json::to_string(&filtered)
        };
        json.map_err(|e| GateError::Serialization(format!("Failed to serialize report: {e}")))
    }
}

/// Formats reports as human-readable text for console output.
#[derive(Debug, Clone)]
pub struct HumanFormatter {
    config: FormatterConfig,
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self {
            config: FormatterConfig::default(),
        }
    }

    pub fn with_config(config: FormatterConfig) -> Self {
        Self { config }
    }

    fn paint(config: &FormatterConfig, color: &str, text: &str) -> String {
        if config.use_colors {
            format!("\x1b[{color}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn render(
        &self,
        out: &mut String,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> std::fmt::Result {
        writeln!(out)?;
        let status = if report.is_complete() {
            Self::paint(config, "32", "Validation COMPLETED")
        } else {
            Self::paint(config, "31", "Validation ABORTED")
        };
        writeln!(out, "{status}")?;
        writeln!(out)?;
        writeln!(out, "Run: {}", report.run_id)?;
        if config.include_timestamps {
            writeln!(out, "Started: {}", report.started_at)?;
        }
        writeln!(out, "Rows in: {}", report.initial_row_count)?;
        writeln!(out, "Rows out: {}", report.final_row_count)?;
        writeln!(out, "Rows removed: {}", report.total_removed())?;
        writeln!(out, "Execution Time: {}ms", report.elapsed_ms)?;

        if config.include_stages && !report.stages.is_empty() {
            writeln!(out)?;
            writeln!(out, "Stages:")?;
            for stage in &report.stages {
                writeln!(
                    out,
                    "   {:<22} {} -> {}",
                    stage.stage.as_str(),
                    stage.row_count_before,
                    stage.row_count_after
                )?;
            }
        }

        let (entries, total) = config.selected(report);
        if !entries.is_empty() {
            writeln!(out)?;
            writeln!(out, "Rules:")?;
            for entry in &entries {
                let marker = match entry.outcome {
                    RuleOutcome::Passed => Self::paint(config, "32", "PASS"),
                    RuleOutcome::Filtered => Self::paint(config, "33", "FILT"),
                    RuleOutcome::Aborted => Self::paint(config, "31", "FAIL"),
                };
                writeln!(
                    out,
                    "   [{marker}] {} ({}, {}) on {}",
                    entry.rule_id,
                    entry.kind,
                    entry.severity,
                    entry.columns.join(", ")
                )?;
                if entry.rows_removed > 0 {
                    writeln!(
                        out,
                        "          removed {} of {} rows",
                        entry.rows_removed, entry.rows_examined
                    )?;
                }
                if let Some(breach) = &entry.breach {
                    writeln!(
                        out,
                        "          {} = {}, bound {}",
                        breach.statistic, breach.observed, breach.bound
                    )?;
                }
                if let Some(message) = &entry.message {
                    writeln!(out, "          {message}")?;
                }
            }
            if total > entries.len() {
                writeln!(out, "   ... and {} more entries", total - entries.len())?;
            }
        }

        if !report.inconsistencies.is_empty() {
            writeln!(out)?;
            writeln!(out, "{}", Self::paint(config, "33", "Inconsistencies:"))?;
            for message in &report.inconsistencies {
                writeln!(out, "   {message}")?;
            }
        }

        writeln!(out)
    }
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFormatter for HumanFormatter {
    fn format(&self, report: &ValidationReport) -> Result<String> {
        self.format_with_config(report, &self.config)
    }

    fn format_with_config(
        &self,
        report: &ValidationReport,
        config: &FormatterConfig,
    ) -> Result<String> {
        let mut output = String::new();
        self.render(&mut output, report, config)
            .map_err(|e| GateError::Internal(format!("Failed to format report: {e}")))?;
        Ok(output)
    }
}
