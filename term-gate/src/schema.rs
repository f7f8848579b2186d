//! Schema model: column declarations and key definitions.
//!
//! A [`SchemaDescriptor`] is declared once, validated at startup with
//! [`validate_schema`], and then shared read-only by every run.

use crate::engine::{Coercion, Measure};
use crate::error::SchemaError;
use crate::security::SqlSecurity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The semantic type of a column, which decides how it is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SemanticType {
    /// Whole numbers; measured by value
    Integer,
    /// A code that must have exactly `length` characters
    FixedLengthCode { length: usize },
    /// A string of at most `max_length` characters
    VarString { max_length: usize },
    /// A fixed-point decimal; measured by the length of its text representation
    Decimal { precision: u8, scale: u8 },
}

impl SemanticType {
    /// Returns the per-row measure bounds rules on this type are evaluated against.
    pub fn measure(&self) -> Measure {
        match self {
            SemanticType::Integer => Measure::IntegerValue,
            SemanticType::FixedLengthCode { .. }
            | SemanticType::VarString { .. }
            | SemanticType::Decimal { .. } => Measure::Length,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SemanticType::Integer => write!(f, "integer"),
            SemanticType::FixedLengthCode { length } => write!(f, "code({length})"),
            SemanticType::VarString { max_length } => write!(f, "varchar({max_length})"),
            SemanticType::Decimal { precision, scale } => {
                write!(f, "decimal({precision}, {scale})")
            }
        }
    }
}

/// A single column declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name as it appears in the dataset
    pub name: String,
    /// Semantic type of the column
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
}

impl ColumnSpec {
    /// Creates a column declaration.
    pub fn new(name: impl Into<String>, semantic_type: SemanticType) -> Self {
        Self {
            name: name.into(),
            semantic_type,
        }
    }

    /// Declares an integer column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, SemanticType::Integer)
    }

    /// Declares a fixed-length code column.
    pub fn code(name: impl Into<String>, length: usize) -> Self {
        Self::new(name, SemanticType::FixedLengthCode { length })
    }

    /// Declares a bounded string column.
    pub fn varchar(name: impl Into<String>, max_length: usize) -> Self {
        Self::new(name, SemanticType::VarString { max_length })
    }

    /// Declares a decimal column.
    pub fn decimal(name: impl Into<String>, precision: u8, scale: u8) -> Self {
        Self::new(name, SemanticType::Decimal { precision, scale })
    }
}

/// An ordered set of uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaDescriptor {
    columns: Vec<ColumnSpec>,
}

impl SchemaDescriptor {
    /// Creates a descriptor from column declarations in order.
    ///
    /// The descriptor is not validated here; call [`validate_schema`].
    pub fn new(columns: impl IntoIterator<Item = ColumnSpec>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// Returns the columns in declaration order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Returns true if the schema declares the named column.
    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Returns the number of declared columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no column is declared.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Validates a schema descriptor.
///
/// Fails with [`SchemaError::EmptySchema`] when no column is declared and with
/// [`SchemaError::DuplicateColumn`] on the first repeated name. Pure; meant to
/// run once at startup.
pub fn validate_schema(descriptor: &SchemaDescriptor) -> Result<(), SchemaError> {
    if descriptor.is_empty() {
        return Err(SchemaError::EmptySchema);
    }

    let mut seen = HashSet::with_capacity(descriptor.len());
    for column in descriptor.columns() {
        SqlSecurity::validate_config_identifier(&column.name)?;
        if !seen.insert(column.name.as_str()) {
            return Err(SchemaError::DuplicateColumn(column.name.clone()));
        }
    }
    Ok(())
}

/// The completeness and uniqueness keys of a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    /// Columns that must be non-null after `coercion`
    pub completeness_key: Vec<String>,
    /// Columns whose combined value must be unique
    pub uniqueness_key: Vec<String>,
    /// Coercion applied to completeness-key columns
    #[serde(default)]
    pub coercion: Coercion,
}

impl KeyDefinition {
    /// Creates a key definition with the default integer coercion.
    pub fn new<I, J, S, T>(completeness_key: I, uniqueness_key: J) -> Self
    where
        I: IntoIterator<Item = S>,
        J: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            completeness_key: completeness_key.into_iter().map(Into::into).collect(),
            uniqueness_key: uniqueness_key.into_iter().map(Into::into).collect(),
            coercion: Coercion::default(),
        }
    }

    /// Sets the coercion used by the completeness check.
    pub fn with_coercion(mut self, coercion: Coercion) -> Self {
        self.coercion = coercion;
        self
    }

    /// Checks that both keys are non-empty and reference declared columns.
    pub fn validate(&self, schema: &SchemaDescriptor) -> Result<(), SchemaError> {
        for (label, key) in [
            ("completeness", &self.completeness_key),
            ("uniqueness", &self.uniqueness_key),
        ] {
            if key.is_empty() {
                return Err(SchemaError::EmptyKey(label));
            }
            for column in key {
                if !schema.contains(column) {
                    return Err(SchemaError::UnknownColumn {
                        context: format!("The {label} key"),
                        column: column.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
