//! SQL identifier validation and quoting.
//!
//! Every column and dataset name ends up inside SQL text sent to the engine, so
//! names are validated against a strict format and always emitted quoted.

use crate::error::{GateError, Result, SchemaError};
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest identifier accepted.
const MAX_IDENTIFIER_LENGTH: usize = 128;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    // Letters, digits and underscores; must start with a letter or underscore.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Hard-coded regex pattern should be valid")
});

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and quotes a SQL identifier (table name, column name).
    ///
    /// # Examples
    /// ```rust
    /// use term_gate::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("day_cd").unwrap(), "\"day_cd\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE users--").is_err());
    /// assert!(SqlSecurity::escape_identifier(&"very_long_name_".repeat(100)).is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        Ok(Self::quote(identifier))
    }

    /// Validates a SQL identifier without quoting it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        Self::check(identifier).map_err(GateError::SecurityError)
    }

    /// Validates an identifier coming from configuration.
    ///
    /// Same checks as [`SqlSecurity::validate_identifier`], reported as a
    /// [`SchemaError`] so that bad names are rejected before a run starts.
    pub fn validate_config_identifier(identifier: &str) -> std::result::Result<(), SchemaError> {
        Self::check(identifier).map_err(|message| SchemaError::InvalidIdentifier {
            identifier: identifier.to_string(),
            message,
        })
    }

    /// Quotes a list of identifiers and joins them with commas.
    pub fn escape_identifier_list<S: AsRef<str>>(identifiers: &[S]) -> Result<String> {
        let escaped = identifiers
            .iter()
            .map(|id| Self::escape_identifier(id.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(escaped.join(", "))
    }

    /// Quotes a column name read back from the engine's own schema.
    ///
    /// These names are not user input and may use any characters, so they are
    /// quoted with embedded quotes doubled instead of being validated.
    pub fn quote_column_name(name: &str) -> String {
        Self::quote(&name.replace('"', "\"\""))
    }

    fn quote(identifier: &str) -> String {
        format!("\"{identifier}\"")
    }

    fn check(identifier: &str) -> std::result::Result<(), String> {
        if identifier.trim().is_empty() {
            return Err("SQL identifier cannot be empty or whitespace-only".to_string());
        }

        if identifier.len() > MAX_IDENTIFIER_LENGTH {
            return Err(format!(
                "SQL identifier too long (max {MAX_IDENTIFIER_LENGTH} characters)"
            ));
        }

        if identifier.contains('\0') {
            return Err("SQL identifier cannot contain null bytes".to_string());
        }

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers and underscores"
            ));
        }

        Ok(())
    }
}
