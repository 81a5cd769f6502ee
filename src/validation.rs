//! Identifier validation for synthesized SQL.
//!
//! The cascade UPDATE statement interpolates the destination table and column
//! names supplied at trigger definition time. Those names come from DDL, not
//! from row data, but a malformed one must still surface as a configuration
//! error instead of reaching the SQL layer.

use crate::error::{CascadeError, CascadeResult};

/// Validate a `PostgreSQL` identifier (table, column names)
///
/// Allows: alphanumeric + underscore (`PostgreSQL` identifier rules)
/// Rejects: quotes, semicolons, dashes, spaces, special chars
///
/// # Arguments
///
/// * `identifier` - String to validate
/// * `parameter` - Parameter name for error messages
pub fn validate_identifier(identifier: &str, parameter: &str) -> CascadeResult<()> {
    if identifier.is_empty() {
        return Err(CascadeError::InvalidIdentifier {
            parameter: parameter.to_string(),
            value: identifier.to_string(),
            reason: "identifier cannot be empty".to_string(),
        });
    }

    if !identifier.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(CascadeError::InvalidIdentifier {
            parameter: parameter.to_string(),
            value: identifier.to_string(),
            reason: "identifier must contain only alphanumeric characters and underscores"
                .to_string(),
        });
    }

    // PostgreSQL identifiers can't start with a digit (unless quoted)
    if identifier.chars().next().is_some_and(char::is_numeric) {
        return Err(CascadeError::InvalidIdentifier {
            parameter: parameter.to_string(),
            value: identifier.to_string(),
            reason: "identifier cannot start with a digit".to_string(),
        });
    }

    // PostgreSQL max identifier length is 63
    if identifier.len() > 63 {
        return Err(CascadeError::InvalidIdentifier {
            parameter: parameter.to_string(),
            value: format!("{}... ({} chars)", &identifier[..20], identifier.len()),
            reason: "identifier too long (max 63 characters)".to_string(),
        });
    }

    Ok(())
}

/// Validate a destination table reference
///
/// The destination may be schema-qualified with a single dot
/// (`billing.invoice`); each part must be a valid identifier on its own.
pub fn validate_table_reference(reference: &str, parameter: &str) -> CascadeResult<()> {
    let mut parts = reference.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(table), None, None) => validate_identifier(table, parameter),
        (Some(schema), Some(table), None) => {
            validate_identifier(schema, parameter)?;
            validate_identifier(table, parameter)
        }
        _ => Err(CascadeError::InvalidIdentifier {
            parameter: parameter.to_string(),
            value: reference.to_string(),
            reason: "at most one schema qualifier is allowed".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::testing::assert_error_sqlstate;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("topic", "destination_table").is_ok());
        assert!(validate_identifier("updated_at", "destination_column").is_ok());
        assert!(validate_identifier("topic_id", "source_key").is_ok());
        assert!(validate_identifier("_private", "destination_column").is_ok());
    }

    #[test]
    fn test_injection_attempts_rejected() {
        assert_error_sqlstate(
            validate_identifier("topic; DROP TABLE topic", "destination_table"),
            "42602",
        );
        assert_error_sqlstate(validate_identifier("updated_at = NULL --", "column"), "42602");
        assert_error_sqlstate(validate_identifier("\"quoted\"", "column"), "42602");
    }

    #[test]
    fn test_empty_and_numeric_leading_rejected() {
        assert!(validate_identifier("", "column").is_err());
        assert!(validate_identifier("1st_column", "column").is_err());
    }

    #[test]
    fn test_length_limit() {
        let long = "a".repeat(64);
        assert!(validate_identifier(&long, "column").is_err());
        let max = "a".repeat(63);
        assert!(validate_identifier(&max, "column").is_ok());
    }

    #[test]
    fn test_table_reference_schema_qualification() {
        assert!(validate_table_reference("topic", "destination_table").is_ok());
        assert!(validate_table_reference("public.topic", "destination_table").is_ok());
        assert!(validate_table_reference("a.b.c", "destination_table").is_err());
        assert!(validate_table_reference("public.", "destination_table").is_err());
    }
}
