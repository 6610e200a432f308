//! Input hardening for identifiers and thresholds.
//!
//! Table and column names end up inside SQL text sent to DataFusion, and
//! thresholds arrive from user-supplied JSON. Both are checked here before
//! they reach an engine.

use crate::error::{MineError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// SQL identifier validation and escaping utilities.
pub struct SqlSecurity;

impl SqlSecurity {
    /// Validates and escapes a SQL identifier (table name, column name).
    ///
    /// The identifier is wrapped in double quotes so that mixed-case names
    /// survive DataFusion's identifier normalization.
    ///
    /// # Examples
    /// ```rust
    /// use term_mine::security::SqlSecurity;
    ///
    /// assert_eq!(SqlSecurity::escape_identifier("PULocationID").unwrap(), "\"PULocationID\"");
    /// assert!(SqlSecurity::escape_identifier("id; DROP TABLE trip--").is_err());
    /// ```
    pub fn escape_identifier(identifier: &str) -> Result<String> {
        Self::validate_identifier(identifier)?;
        Ok(format!("\"{identifier}\""))
    }

    /// Validates a SQL identifier without escaping it.
    pub fn validate_identifier(identifier: &str) -> Result<()> {
        if identifier.trim().is_empty() {
            return Err(MineError::SecurityError(
                "SQL identifier cannot be empty or whitespace-only".to_string(),
            ));
        }

        if identifier.len() > 128 {
            return Err(MineError::SecurityError(
                "SQL identifier too long (max 128 characters)".to_string(),
            ));
        }

        static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
            // Hard-coded pattern, known to be valid
            #[allow(clippy::expect_used)]
            Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("Hard-coded regex pattern should be valid")
        });

        if !IDENTIFIER_REGEX.is_match(identifier) {
            return Err(MineError::SecurityError(format!(
                "Invalid SQL identifier format: '{identifier}'. Identifiers must start with a letter or underscore and contain only letters, numbers, and underscores"
            )));
        }

        Ok(())
    }
}

/// Input validation utilities for numeric configuration values.
pub struct InputValidator;

impl InputValidator {
    /// Validates that a threshold is finite.
    pub fn validate_threshold(value: f64, name: &str) -> Result<()> {
        if !value.is_finite() {
            return Err(MineError::Configuration(format!(
                "Invalid {name} value: must be finite (not NaN or infinite)"
            )));
        }
        Ok(())
    }

    /// Validates a fraction in `0.0..=1.0`.
    pub fn validate_fraction(value: f64, name: &str) -> Result<()> {
        Self::validate_threshold(value, name)?;

        if !(0.0..=1.0).contains(&value) {
            return Err(MineError::Configuration(format!(
                "Invalid {name} value: must be between 0.0 and 1.0, got {value}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_sql_identifiers() {
        assert!(SqlSecurity::validate_identifier("customer_id").is_ok());
        assert!(SqlSecurity::validate_identifier("table1").is_ok());
        assert!(SqlSecurity::validate_identifier("_private_col").is_ok());
    }

    #[test]
    fn test_invalid_sql_identifiers() {
        assert!(SqlSecurity::validate_identifier("").is_err());
        assert!(SqlSecurity::validate_identifier("   ").is_err());
        assert!(SqlSecurity::validate_identifier("1abc").is_err());
        assert!(SqlSecurity::validate_identifier("a\"b").is_err());
        assert!(SqlSecurity::validate_identifier("id; DROP TABLE x").is_err());
        assert!(SqlSecurity::validate_identifier(&"x".repeat(129)).is_err());
    }

    #[test]
    fn test_escape_identifier() {
        assert_eq!(
            SqlSecurity::escape_identifier("tripdistance").unwrap(),
            "\"tripdistance\""
        );
    }

    #[test]
    fn test_fraction_validation() {
        assert!(InputValidator::validate_fraction(0.0, "min_confidence").is_ok());
        assert!(InputValidator::validate_fraction(1.0, "min_confidence").is_ok());
        assert!(InputValidator::validate_fraction(1.5, "min_confidence").is_err());
        assert!(InputValidator::validate_fraction(f64::NAN, "min_confidence").is_err());
        assert!(InputValidator::validate_threshold(f64::INFINITY, "x").is_err());
    }
}
