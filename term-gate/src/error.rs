//! Error types for the term-gate validation engine.
//!
//! Errors are split by when they can happen:
//!
//! - [`SchemaError`] is raised while validating configuration, before any run starts.
//! - [`FatalViolation`] is raised when a fatal bounds rule is breached mid-run.
//! - [`GateError`] wraps both, plus failures of the underlying dataset engine.

use crate::core::ValidationReport;
use crate::engine::Dataset;
use crate::rules::StatisticKind;
use thiserror::Error;

/// Configuration-time errors for schemas, key definitions and rule sets.
///
/// A run never starts when one of these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// The schema declares no columns.
    #[error("Schema must declare at least one column")]
    EmptySchema,

    /// Two columns share the same name.
    #[error("Column '{0}' is declared more than once")]
    DuplicateColumn(String),

    /// A key or rule references a column the schema does not declare.
    #[error("{context} references unknown column '{column}'")]
    UnknownColumn { context: String, column: String },

    /// A key definition has no columns.
    #[error("The {0} key must contain at least one column")]
    EmptyKey(&'static str),

    /// Two rules share the same id.
    #[error("Rule id '{0}' is declared more than once")]
    DuplicateRuleId(String),

    /// A bounds check cannot be evaluated against the column's semantic type.
    #[error("Rule '{rule_id}' applies {check} to column '{column}' of type {semantic_type}")]
    IncompatibleRule {
        rule_id: String,
        column: String,
        semantic_type: String,
        check: String,
    },

    /// A bound is malformed (no limits, or min above max).
    #[error("Rule '{rule_id}' has an invalid bound: {message}")]
    InvalidBound { rule_id: String, message: String },

    /// A completeness or uniqueness rule was passed as a bounds rule.
    #[error("Rule '{rule_id}' is a {kind} rule; declare it through the key definition")]
    MisplacedRule { rule_id: String, kind: String },

    /// A column name cannot be used safely in a query.
    #[error("Invalid identifier '{identifier}': {message}")]
    InvalidIdentifier { identifier: String, message: String },
}

/// A fatal bounds violation that aborted a run.
///
/// The dataset carried here is the input to the bounds stage, untouched by any
/// filter. The report is marked as aborted and must not be treated as complete.
#[derive(Error, Debug, Clone)]
#[error(
    "Fatal violation of rule '{rule_id}' on column '{column}': {statistic} = {observed}, bound {bound}"
)]
pub struct FatalViolation {
    /// Id of the rule that aborted the run
    pub rule_id: String,
    /// Column the rule targets
    pub column: String,
    /// Statistic that breached its bound
    pub statistic: StatisticKind,
    /// Observed value of the statistic
    pub observed: i64,
    /// The bound that was breached
    pub bound: i64,
    /// Dataset as it entered the bounds stage
    pub dataset: Dataset,
    /// Report up to and including the aborting rule
    pub report: ValidationReport,
}

/// The main error type for term-gate.
#[derive(Error, Debug)]
pub enum GateError {
    /// Malformed schema or rule configuration.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A fatal bounds rule was violated; the batch is rejected.
    #[error("{0}")]
    FatalViolation(Box<FatalViolation>),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// The dataset engine returned something the gate cannot interpret.
    #[error("Engine operation '{operation}' failed: {message}")]
    Engine {
        /// The engine operation (count, select, aggregate, ...)
        operation: String,
        /// Detailed error message
        message: String,
    },

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error related to configuration loading.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Error from serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Security-related error.
    #[error("Security error: {0}")]
    SecurityError(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, GateError>`.
pub type Result<T> = std::result::Result<T, GateError>;

impl GateError {
    /// Creates a new engine error.
    pub fn engine(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns the fatal violation if this error aborted a run.
    pub fn as_fatal(&self) -> Option<&FatalViolation> {
        match self {
            GateError::FatalViolation(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the schema error if configuration was rejected.
    pub fn as_schema(&self) -> Option<&SchemaError> {
        match self {
            GateError::Schema(e) => Some(e),
            _ => None,
        }
    }
}

impl From<FatalViolation> for GateError {
    fn from(violation: FatalViolation) -> Self {
        GateError::FatalViolation(Box::new(violation))
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::Serialization(err.to_string())
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<GateError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| match e.into() {
            GateError::Internal(inner) => GateError::Internal(format!("{msg}: {inner}")),
            other => GateError::Internal(format!("{msg}: {other}")),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let msg = f();
            match e.into() {
                GateError::Internal(inner) => GateError::Internal(format!("{msg}: {inner}")),
                other => GateError::Internal(format!("{msg}: {other}")),
            }
        })
    }
}
