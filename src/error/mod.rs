
use std::fmt;

use pgrx::{ereport, PgLogLevel, PgSqlErrorCode};

pub mod testing;

/// Main error type for the pg_cascade_touch extension
///
/// Every variant is fatal: a cascade either fully executes (or is cleanly
/// skipped) or the enclosing transaction aborts with one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CascadeError {
    // ============ Configuration Errors (39xxx / 22xxx / 42xxx) ============
    /// Trigger fired at the wrong time (must be AFTER)
    WrongTiming {
        found: String,
    },

    /// Trigger fired at the wrong granularity (must be FOR EACH ROW)
    WrongLevel {
        found: String,
    },

    /// Too few trigger arguments for the variant
    NotEnoughArguments {
        required: usize,
        got: usize,
    },

    /// Trailing predicate arguments not supplied in column/value pairs
    UnpairedGuardArguments {
        got: usize,
    },

    /// A trigger argument is not usable as an SQL identifier
    InvalidIdentifier {
        parameter: String,
        value: String,
        reason: String,
    },

    // ============ Schema Errors (42xxx) ============
    /// A referenced column does not exist on the triggering relation
    UnknownAttribute {
        relation: String,
        attribute: String,
    },

    // ============ Execution Errors (08xxx / XX000) ============
    /// An SPI session could not be established
    Connection {
        detail: String,
    },

    /// Statement preparation or persistence failed
    Planning {
        query: String,
        detail: String,
    },

    /// Statement execution reported a failure status
    Execution {
        query: String,
        detail: String,
    },

    // ============ Host Bridge Errors (39xxx) ============
    /// The trigger context handed over by the server was malformed
    Trigger {
        detail: String,
    },
}

impl CascadeError {
    /// Get PostgreSQL SQLSTATE code for this error
    pub fn sqlstate(&self) -> &'static str {
        use CascadeError::*;
        match self {
            WrongTiming { .. } => "39P01",        // Trigger protocol violated
            WrongLevel { .. } => "39P01",         // Trigger protocol violated
            NotEnoughArguments { .. } => "22023", // Invalid parameter value
            UnpairedGuardArguments { .. } => "22023",
            InvalidIdentifier { .. } => "42602",  // Invalid name

            UnknownAttribute { .. } => "42703",   // Undefined column

            Connection { .. } => "08003",         // Connection does not exist
            Planning { .. } => "XX000",           // Internal error
            Execution { .. } => "XX000",

            Trigger { .. } => "39P01",
        }
    }

    /// PostgreSQL error code matching [`CascadeError::sqlstate`]
    pub fn errcode(&self) -> PgSqlErrorCode {
        use CascadeError::*;
        match self {
            WrongTiming { .. } | WrongLevel { .. } | Trigger { .. } => {
                PgSqlErrorCode::ERRCODE_TRIGGER_PROTOCOL_VIOLATED
            }
            NotEnoughArguments { .. } | UnpairedGuardArguments { .. } => {
                PgSqlErrorCode::ERRCODE_INVALID_PARAMETER_VALUE
            }
            InvalidIdentifier { .. } => PgSqlErrorCode::ERRCODE_INVALID_NAME,
            UnknownAttribute { .. } => PgSqlErrorCode::ERRCODE_UNDEFINED_COLUMN,
            Connection { .. } => PgSqlErrorCode::ERRCODE_CONNECTION_DOES_NOT_EXIST,
            Planning { .. } | Execution { .. } => PgSqlErrorCode::ERRCODE_INTERNAL_ERROR,
        }
    }

    /// Raise this error as a PostgreSQL ERROR carrying its SQLSTATE.
    ///
    /// Aborts the enclosing transaction; nothing downstream of a raise runs.
    pub fn raise(self) -> ! {
        ereport!(PgLogLevel::ERROR, self.errcode(), self.to_string());
        unreachable!("ereport(ERROR) returned");
    }

    /// Classify an SPI failure raised while preparing `query`
    pub fn planning(query: &str, error: &pgrx::spi::Error) -> Self {
        if is_connection_failure(error) {
            CascadeError::Connection { detail: error.to_string() }
        } else {
            CascadeError::Planning { query: query.to_string(), detail: error.to_string() }
        }
    }

    /// Classify an SPI failure raised while executing `query`
    pub fn execution(query: &str, error: &pgrx::spi::Error) -> Self {
        if is_connection_failure(error) {
            CascadeError::Connection { detail: error.to_string() }
        } else {
            CascadeError::Execution { query: query.to_string(), detail: error.to_string() }
        }
    }
}

fn is_connection_failure(error: &pgrx::spi::Error) -> bool {
    matches!(
        error,
        pgrx::spi::Error::SpiError(
            pgrx::spi::SpiErrorCodes::Connect | pgrx::spi::SpiErrorCodes::Unconnected
        )
    )
}

impl fmt::Display for CascadeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CascadeError::*;
        match self {
            WrongTiming { found } => {
                write!(f, "cascade trigger must fire AFTER the event, fired {}", found)
            }
            WrongLevel { found } => {
                write!(f, "cascade trigger must fire FOR EACH ROW, fired {}", found)
            }
            NotEnoughArguments { required, got } => {
                write!(
                    f,
                    "expected at least {} trigger arguments (destination table, \
                     timestamp column, key columns), got {}",
                    required, got
                )
            }
            UnpairedGuardArguments { got } => {
                write!(
                    f,
                    "predicate guards must be supplied as column/value pairs, \
                     got {} trailing arguments",
                    got
                )
            }
            InvalidIdentifier { parameter, value, reason } => {
                write!(f, "invalid identifier for '{}': {} (value: {})", parameter, reason, value)
            }
            UnknownAttribute { relation, attribute } => {
                write!(f, "\"{}\" has no attribute \"{}\"", relation, attribute)
            }
            Connection { detail } => {
                write!(f, "could not establish an SPI session: {}", detail)
            }
            Planning { query, detail } => {
                write!(f, "failed to prepare cascade statement: {}\nStatement: {}", detail,
                       if query.len() > 100 { &query[..100] } else { query })
            }
            Execution { query, detail } => {
                write!(f, "cascade statement execution failed: {}\nStatement: {}", detail,
                       if query.len() > 100 { &query[..100] } else { query })
            }
            Trigger { detail } => {
                write!(f, "trigger context unavailable: {}", detail)
            }
        }
    }
}

impl std::error::Error for CascadeError {}

/// Result type for cascade operations
pub type CascadeResult<T> = Result<T, CascadeError>;

/// Convert trigger-context failures reported by the host bridge
impl From<pgrx::PgTriggerError> for CascadeError {
    fn from(e: pgrx::PgTriggerError) -> Self {
        CascadeError::Trigger { detail: e.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_attribute_message() {
        let err = CascadeError::UnknownAttribute {
            relation: "post".to_string(),
            attribute: "topic_id".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("post"));
        assert!(msg.contains("topic_id"));
        assert_eq!(err.sqlstate(), "42703");
    }

    #[test]
    fn test_not_enough_arguments_message() {
        let err = CascadeError::NotEnoughArguments { required: 4, got: 2 };

        let msg = err.to_string();
        assert!(msg.contains("at least 4"));
        assert!(msg.contains("got 2"));
        assert_eq!(err.sqlstate(), "22023");
    }

    #[test]
    fn test_planning_truncates_long_statements() {
        let err = CascadeError::Planning {
            query: "UPDATE ".repeat(50),
            detail: "syntax error".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("syntax error"));
        assert!(msg.len() < 300);
    }

    #[test]
    fn test_configuration_errors_share_trigger_protocol_state() {
        let timing = CascadeError::WrongTiming { found: "BEFORE".to_string() };
        let level = CascadeError::WrongLevel { found: "STATEMENT".to_string() };

        assert_eq!(timing.sqlstate(), "39P01");
        assert_eq!(level.sqlstate(), "39P01");
    }
}
