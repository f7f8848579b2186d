//! Validation rules and their severities.
//!
//! Completeness and uniqueness are driven by the [`KeyDefinition`](crate::schema::KeyDefinition)
//! and reported under the reserved ids [`COMPLETENESS_RULE_ID`] and
//! [`UNIQUENESS_RULE_ID`]. Everything else is a bounds rule: a check over an
//! aggregate statistic of one column, evaluated in declaration order.

use crate::engine::{ColumnStats, Measure};
use crate::error::SchemaError;
use crate::schema::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Report id of the completeness stage.
pub const COMPLETENESS_RULE_ID: &str = "completeness";

/// Report id of the uniqueness stage.
pub const UNIQUENESS_RULE_ID: &str = "uniqueness";

/// What happens when a rule is violated.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Offending rows are removed and the run continues
    #[default]
    Recoverable,
    /// The run stops; nothing is filtered
    Fatal,
}

impl Severity {
    /// Returns the string representation of the severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Recoverable => "recoverable",
            Severity::Fatal => "fatal",
        }
    }

    /// Returns true for [`Severity::Fatal`].
    pub fn is_fatal(&self) -> bool {
        matches!(self, Severity::Fatal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An aggregate statistic a bounds check compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatisticKind {
    Min,
    Max,
    MinLength,
    MaxLength,
}

impl StatisticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatisticKind::Min => "min",
            StatisticKind::Max => "max",
            StatisticKind::MinLength => "min_length",
            StatisticKind::MaxLength => "max_length",
        }
    }
}

impl fmt::Display for StatisticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A statistic that fell outside its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breach {
    pub statistic: StatisticKind,
    pub observed: i64,
    pub bound: i64,
}

/// A conformance check over aggregate statistics.
///
/// Bounds are inclusive. A missing bound is not checked.
///
/// # Examples
///
/// ```rust
/// use term_gate::rules::BoundCheck;
///
/// let int_range = BoundCheck::value_range(0, i64::from(i32::MAX));
/// let code = BoundCheck::exact_length(8);
/// let varchar = BoundCheck::max_length(24);
/// assert_eq!(code.to_string(), "length between 8 and 8");
/// # let _ = (int_range, varchar);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundCheck {
    /// Numeric value within `[min, max]`
    ValueRange { min: Option<i64>, max: Option<i64> },
    /// Text length within `[min, max]`
    LengthRange {
        min: Option<usize>,
        max: Option<usize>,
    },
}

impl BoundCheck {
    /// Value between `min` and `max`, inclusive.
    pub fn value_range(min: i64, max: i64) -> Self {
        BoundCheck::ValueRange {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Length of exactly `length` characters.
    pub fn exact_length(length: usize) -> Self {
        BoundCheck::LengthRange {
            min: Some(length),
            max: Some(length),
        }
    }

    /// Length of at most `max` characters.
    pub fn max_length(max: usize) -> Self {
        BoundCheck::LengthRange {
            min: None,
            max: Some(max),
        }
    }

    /// The per-row measure this check is expressed over.
    pub fn measure(&self) -> Measure {
        match self {
            BoundCheck::ValueRange { .. } => Measure::IntegerValue,
            BoundCheck::LengthRange { .. } => Measure::Length,
        }
    }

    /// Lower and upper bounds as signed integers.
    pub fn limits(&self) -> (Option<i64>, Option<i64>) {
        match *self {
            BoundCheck::ValueRange { min, max } => (min, max),
            BoundCheck::LengthRange { min, max } => (min.map(to_i64), max.map(to_i64)),
        }
    }

    /// Evaluates the check against collected statistics.
    ///
    /// Missing statistics (empty dataset, all-null column) never breach.
    /// The lower bound is checked first.
    pub fn evaluate(&self, stats: &ColumnStats) -> Option<Breach> {
        let (low_stat, high_stat, low_kind, high_kind) = match self {
            BoundCheck::ValueRange { .. } => {
                (stats.min, stats.max, StatisticKind::Min, StatisticKind::Max)
            }
            BoundCheck::LengthRange { .. } => (
                stats.min_length,
                stats.max_length,
                StatisticKind::MinLength,
                StatisticKind::MaxLength,
            ),
        };
        let (min, max) = self.limits();

        if let (Some(observed), Some(bound)) = (low_stat, min) {
            if observed < bound {
                return Some(Breach {
                    statistic: low_kind,
                    observed,
                    bound,
                });
            }
        }
        if let (Some(observed), Some(bound)) = (high_stat, max) {
            if observed > bound {
                return Some(Breach {
                    statistic: high_kind,
                    observed,
                    bound,
                });
            }
        }
        None
    }

    /// SQL condition that is true for rows outside the bounds.
    ///
    /// `measure_sql` is the already rendered per-row measure expression.
    pub fn violation_sql(&self, measure_sql: &str) -> String {
        let (min, max) = self.limits();
        let mut parts = Vec::with_capacity(2);
        if let Some(min) = min {
            parts.push(format!("{measure_sql} < {min}"));
        }
        if let Some(max) = max {
            parts.push(format!("{measure_sql} > {max}"));
        }
        if parts.is_empty() {
            "FALSE".to_string()
        } else {
            parts.join(" OR ")
        }
    }

    fn validate(&self, rule_id: &str) -> Result<(), SchemaError> {
        match self.limits() {
            (None, None) => Err(SchemaError::InvalidBound {
                rule_id: rule_id.to_string(),
                message: "at least one of min or max is required".to_string(),
            }),
            (Some(min), Some(max)) if min > max => Err(SchemaError::InvalidBound {
                rule_id: rule_id.to_string(),
                message: format!("min {min} is greater than max {max}"),
            }),
            _ => Ok(()),
        }
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl fmt::Display for BoundCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subject = match self {
            BoundCheck::ValueRange { .. } => "value",
            BoundCheck::LengthRange { .. } => "length",
        };
        match self.limits() {
            (Some(min), Some(max)) => write!(f, "{subject} between {min} and {max}"),
            (Some(min), None) => write!(f, "{subject} at least {min}"),
            (None, Some(max)) => write!(f, "{subject} at most {max}"),
            (None, None) => write!(f, "{subject} unbounded"),
        }
    }
}

/// The class of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    Completeness,
    Uniqueness,
    Bounds { check: BoundCheck },
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Completeness => "completeness",
            RuleKind::Uniqueness => "uniqueness",
            RuleKind::Bounds { .. } => "bounds",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A declared validation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule id, used in reports
    pub id: String,
    /// Column the rule targets
    pub column: String,
    /// What the rule checks
    pub kind: RuleKind,
    /// What happens on violation
    #[serde(default)]
    pub severity: Severity,
}

impl Rule {
    /// Creates a bounds rule.
    pub fn bounds(
        id: impl Into<String>,
        column: impl Into<String>,
        check: BoundCheck,
        severity: Severity,
    ) -> Self {
        Self {
            id: id.into(),
            column: column.into(),
            kind: RuleKind::Bounds { check },
            severity,
        }
    }

    /// Creates a bounds rule that aborts the run on violation.
    pub fn fatal(id: impl Into<String>, column: impl Into<String>, check: BoundCheck) -> Self {
        Self::bounds(id, column, check, Severity::Fatal)
    }

    /// Creates a bounds rule that filters offending rows on violation.
    pub fn recoverable(
        id: impl Into<String>,
        column: impl Into<String>,
        check: BoundCheck,
    ) -> Self {
        Self::bounds(id, column, check, Severity::Recoverable)
    }

    /// Returns the bounds check of a bounds rule.
    pub fn bound_check(&self) -> Option<&BoundCheck> {
        match &self.kind {
            RuleKind::Bounds { check } => Some(check),
            _ => None,
        }
    }
}

/// An ordered, immutable list of bounds rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: impl IntoIterator<Item = Rule>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// Rules in declaration order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Distinct target columns, in first-reference order.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.rules
            .iter()
            .map(|r| r.column.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Validates every rule against the schema.
    ///
    /// Rejects duplicate ids (including the reserved stage ids), unknown
    /// columns, non-bounds rules, checks that do not fit the column's
    /// semantic type, and malformed bounds.
    pub fn validate(&self, schema: &SchemaDescriptor) -> Result<(), SchemaError> {
        let mut ids: HashSet<&str> = [COMPLETENESS_RULE_ID, UNIQUENESS_RULE_ID].into();

        for rule in &self.rules {
            if !ids.insert(rule.id.as_str()) {
                return Err(SchemaError::DuplicateRuleId(rule.id.clone()));
            }

            let column = schema
                .column(&rule.column)
                .ok_or_else(|| SchemaError::UnknownColumn {
                    context: format!("Rule '{}'", rule.id),
                    column: rule.column.clone(),
                })?;

            let check = match &rule.kind {
                RuleKind::Bounds { check } => check,
                other => {
                    return Err(SchemaError::MisplacedRule {
                        rule_id: rule.id.clone(),
                        kind: other.to_string(),
                    })
                }
            };

            if check.measure() != column.semantic_type.measure() {
                return Err(SchemaError::IncompatibleRule {
                    rule_id: rule.id.clone(),
                    column: rule.column.clone(),
                    semantic_type: column.semantic_type.to_string(),
                    check: check.to_string(),
                });
            }

            check.validate(&rule.id)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
