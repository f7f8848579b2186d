//! Configuration: the validation declaration and the engine settings.
//!
//! A [`ValidationConfig`] is loaded once, validated, and then shared read-only
//! by every run. It is plain serde data, so it can come from a JSON file:
//!
//! ```json
//! {
//!   "schema": [
//!     {"name": "id", "type": {"kind": "integer"}},
//!     {"name": "day_cd", "type": {"kind": "fixed_length_code", "length": 8}}
//!   ],
//!   "keys": {"completeness_key": ["id", "day_cd"], "uniqueness_key": ["id", "day_cd"]},
//!   "rules": [
//!     {
//!       "id": "day_cd_length",
//!       "column": "day_cd",
//!       "kind": {"type": "bounds", "check": {"length_range": {"min": 8, "max": 8}}},
//!       "severity": "recoverable"
//!     }
//!   ]
//! }
//! ```

use crate::error::{GateError, Result};
use crate::rules::{BoundCheck, Rule, RuleSet};
use crate::schema::{validate_schema, ColumnSpec, KeyDefinition, SchemaDescriptor};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::instrument;

/// Upper bound of the source system's 32-bit integer ids.
const INT32_MAX: i64 = 2_147_483_647;

/// Schema, keys and rules of one dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    pub schema: SchemaDescriptor,
    pub keys: KeyDefinition,
    #[serde(default)]
    pub rules: RuleSet,
}

impl ValidationConfig {
    pub fn new(schema: SchemaDescriptor, keys: KeyDefinition, rules: RuleSet) -> Self {
        Self {
            schema,
            keys,
            rules,
        }
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| GateError::Configuration(format!("invalid validation config: {e}")))
    }

    /// Reads and parses a JSON configuration file.
    #[instrument]
    pub fn from_path(path: impl AsRef<Path> + std::fmt::Debug) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// Serializes the configuration as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates schema, keys and rules, in that order.
    pub fn validate(&self) -> Result<()> {
        validate_schema(&self.schema)?;
        self.keys.validate(&self.schema)?;
        self.rules.validate(&self.schema)?;
        Ok(())
    }

    /// The purchase-record configuration the gate was first built for.
    ///
    /// Columns `(id, day_cd, category, type, ind, purchase_amt)`; `id` and
    /// `day_cd` must be integers; `(id, day_cd, category, type)` is unique.
    pub fn purchases() -> Self {
        let schema = SchemaDescriptor::new([
            ColumnSpec::integer("id"),
            ColumnSpec::code("day_cd", 8),
            ColumnSpec::varchar("category", 24),
            ColumnSpec::varchar("type", 10),
            ColumnSpec::varchar("ind", 1),
            ColumnSpec::decimal("purchase_amt", 18, 6),
        ]);
        let keys = KeyDefinition::new(["id", "day_cd"], ["id", "day_cd", "category", "type"]);
        let rules = RuleSet::new([
            Rule::fatal("id_range", "id", BoundCheck::value_range(0, INT32_MAX)),
            Rule::recoverable("day_cd_length", "day_cd", BoundCheck::exact_length(8)),
            Rule::fatal("category_length", "category", BoundCheck::max_length(24)),
            Rule::fatal("type_length", "type", BoundCheck::max_length(10)),
            // Empty flags are dropped; NULL flags cannot be measured and stay.
            Rule::recoverable("ind_length", "ind", BoundCheck::exact_length(1)),
            // Text length stands in for precision/scale; see DESIGN.md.
            Rule::fatal("purchase_amt_length", "purchase_amt", BoundCheck::max_length(24)),
        ]);
        Self::new(schema, keys, rules)
    }
}

/// Settings for the DataFusion engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Batch size for query execution
    pub batch_size: usize,
    /// Target number of partitions for parallel execution
    pub target_partitions: usize,
    /// Maximum memory for query execution (in bytes)
    pub max_memory: usize,
    /// Fraction of `max_memory` usable before spilling (0.0 to 1.0)
    pub memory_fraction: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 8192,
            target_partitions: num_cpus::get(),
            max_memory: 2 * 1024 * 1024 * 1024, // 2GB
            memory_fraction: 0.9,
        }
    }
}

impl EngineConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_target_partitions(mut self, partitions: usize) -> Self {
        self.target_partitions = partitions;
        self
    }

    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory = bytes;
        self
    }
}
