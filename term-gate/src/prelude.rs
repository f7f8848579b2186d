//! Prelude for commonly used types and traits in term-gate.

pub use crate::config::{EngineConfig, ValidationConfig};
pub use crate::core::{
    PipelineState, RuleOutcome, RuleReport, ValidationPipeline, ValidationReport,
};
pub use crate::engine::{DataFusionEngine, Dataset, DatasetEngine};
pub use crate::error::{ErrorContext, FatalViolation, GateError, Result, SchemaError};
pub use crate::formatters::{FormatterConfig, HumanFormatter, JsonFormatter, ReportFormatter};
pub use crate::logging::LogConfig;
pub use crate::rules::{BoundCheck, Rule, RuleSet, Severity};
pub use crate::schema::{ColumnSpec, KeyDefinition, SchemaDescriptor, SemanticType};
pub use crate::sink::{MemorySink, ReportSink, TracingSink};
