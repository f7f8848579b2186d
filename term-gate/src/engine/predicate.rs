//! Typed row predicates and per-row measures, rendered to SQL.

use crate::error::Result;
use crate::rules::BoundCheck;
use crate::security::SqlSecurity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a completeness-key column is coerced before the null check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Coercion {
    /// The value must cast to a 64-bit integer
    #[default]
    Integer,
    /// The value must simply be non-null
    NotNull,
}

impl Coercion {
    /// SQL condition that holds when `column` survives the coercion.
    pub fn valid_sql(&self, column: &str) -> String {
        match self {
            Coercion::Integer => format!("TRY_CAST({column} AS BIGINT) IS NOT NULL"),
            Coercion::NotNull => format!("{column} IS NOT NULL"),
        }
    }
}

/// The per-row quantity a statistic is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Measure {
    /// The value itself, cast to a 64-bit integer
    IntegerValue,
    /// The character length of the value's text representation
    Length,
}

impl Measure {
    /// SQL expression computing the measure of `column`.
    pub fn sql(&self, column: &str) -> String {
        match self {
            Measure::IntegerValue => format!("TRY_CAST({column} AS BIGINT)"),
            Measure::Length => format!("LENGTH(CAST({column} AS VARCHAR))"),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::IntegerValue => write!(f, "value"),
            Measure::Length => write!(f, "length"),
        }
    }
}

/// A row-level predicate used by `select`.
///
/// Every variant renders to a condition that is never NULL, so negation
/// partitions a dataset exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Every listed column survives the coercion.
    Coercible {
        columns: Vec<String>,
        coercion: Coercion,
    },
    /// The column's measure satisfies the check. NULL measures pass.
    InBounds {
        column: String,
        measure: Measure,
        check: BoundCheck,
    },
    /// Logical negation.
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn coercible(columns: &[String], coercion: Coercion) -> Self {
        Predicate::Coercible {
            columns: columns.to_vec(),
            coercion,
        }
    }

    pub fn in_bounds(column: impl Into<String>, check: BoundCheck) -> Self {
        Predicate::InBounds {
            column: column.into(),
            measure: check.measure(),
            check,
        }
    }

    /// Returns the negated predicate.
    pub fn negate(self) -> Self {
        match self {
            Predicate::Not(inner) => *inner,
            other => Predicate::Not(Box::new(other)),
        }
    }

    /// Renders the predicate as a SQL condition with escaped identifiers.
    pub fn to_sql(&self) -> Result<String> {
        match self {
            Predicate::Coercible { columns, coercion } => {
                if columns.is_empty() {
                    return Ok("TRUE".to_string());
                }
                let parts = columns
                    .iter()
                    .map(|c| Ok(coercion.valid_sql(&SqlSecurity::escape_identifier(c)?)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(parts.join(" AND "))
            }
            Predicate::InBounds {
                column,
                measure,
                check,
            } => {
                let measure_sql = measure.sql(&SqlSecurity::escape_identifier(column)?);
                let violation = check.violation_sql(&measure_sql);
                Ok(format!("COALESCE(NOT ({violation}), TRUE)"))
            }
            Predicate::Not(inner) => Ok(format!("NOT ({})", inner.to_sql()?)),
        }
    }
}
