//! Argument Resolver: trigger-definition arguments into one canonical spec.
//!
//! Two positional layouts are accepted:
//!
//! - explicit key: `destination_table, destination_timestamp_column,
//!   destination_key_column, source_key_column, [predicate_column,
//!   predicate_value]*`
//! - implicit key: `destination_table, destination_column, source_key_column,
//!   [predicate_column, predicate_value]*` — the destination key is the
//!   literal `id` column.
//!
//! Both trigger variants resolve through here, so the downstream pipeline
//! only ever sees a `CascadeSpec`.

use crate::config;
use crate::error::{CascadeError, CascadeResult};
use crate::validation::{validate_identifier, validate_table_reference};

/// Which positional layout the firing trigger variant declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentLayout {
    /// Four leading roles; the destination key column is named explicitly
    ExplicitKey,
    /// Three leading roles; the destination key column is literally `id`
    ImplicitKey,
}

impl ArgumentLayout {
    fn min_args(self) -> usize {
        match self {
            ArgumentLayout::ExplicitKey => 4,
            ArgumentLayout::ImplicitKey => 3,
        }
    }
}

/// The destination row is matched on this column
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyColumn {
    Named(String),
    /// The literal identifier column assumed by the simplified variant
    Identifier,
}

impl KeyColumn {
    pub fn as_sql(&self) -> &str {
        match self {
            KeyColumn::Named(name) => name,
            KeyColumn::Identifier => config::IMPLICIT_KEY_COLUMN,
        }
    }
}

/// One equality condition the triggering row must satisfy for the cascade
/// to fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardPair {
    pub column: String,
    pub expected: String,
}

/// Resolved trigger configuration, identical for both variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeSpec {
    pub destination_table: String,
    pub destination_column: String,
    pub destination_key: KeyColumn,
    pub source_key: String,
    pub guards: Vec<GuardPair>,
}

impl CascadeSpec {
    /// Resolve the raw positional arguments for `layout`.
    pub fn resolve(args: &[String], layout: ArgumentLayout) -> CascadeResult<Self> {
        let min = layout.min_args();
        if args.len() < min {
            return Err(CascadeError::NotEnoughArguments { required: min, got: args.len() });
        }

        let trailing = &args[min..];
        if trailing.len() % 2 != 0 {
            return Err(CascadeError::UnpairedGuardArguments { got: trailing.len() });
        }

        let (destination_key, source_key) = match layout {
            ArgumentLayout::ExplicitKey => {
                validate_identifier(&args[2], "destination_key_column")?;
                (KeyColumn::Named(args[2].clone()), args[3].clone())
            }
            ArgumentLayout::ImplicitKey => (KeyColumn::Identifier, args[2].clone()),
        };

        validate_table_reference(&args[0], "destination_table")?;
        validate_identifier(&args[1], "destination_column")?;
        validate_identifier(&source_key, "source_key_column")?;

        let mut guards = Vec::with_capacity(trailing.len() / 2);
        for pair in trailing.chunks_exact(2) {
            validate_identifier(&pair[0], "predicate_column")?;
            // the expected value is compared as data, never interpolated
            guards.push(GuardPair { column: pair[0].clone(), expected: pair[1].clone() });
        }

        Ok(CascadeSpec {
            destination_table: args[0].clone(),
            destination_column: args[1].clone(),
            destination_key,
            source_key,
            guards,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::testing::assert_error_sqlstate;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_explicit_layout_roles() {
        let spec = CascadeSpec::resolve(
            &strings(&["topic", "updated_at", "id", "topic_id"]),
            ArgumentLayout::ExplicitKey,
        )
        .unwrap();

        assert_eq!(spec.destination_table, "topic");
        assert_eq!(spec.destination_column, "updated_at");
        assert_eq!(spec.destination_key, KeyColumn::Named("id".to_string()));
        assert_eq!(spec.source_key, "topic_id");
        assert!(spec.guards.is_empty());
    }

    #[test]
    fn test_implicit_layout_hardcodes_identifier_key() {
        let spec = CascadeSpec::resolve(
            &strings(&["topic", "updated_at", "topic_id"]),
            ArgumentLayout::ImplicitKey,
        )
        .unwrap();

        assert_eq!(spec.destination_key, KeyColumn::Identifier);
        assert_eq!(spec.destination_key.as_sql(), "id");
        assert_eq!(spec.source_key, "topic_id");
    }

    #[test]
    fn test_arity_floor_per_layout() {
        assert_error_sqlstate(
            CascadeSpec::resolve(
                &strings(&["topic", "updated_at", "id"]),
                ArgumentLayout::ExplicitKey,
            ),
            "22023",
        );
        assert_error_sqlstate(
            CascadeSpec::resolve(&strings(&["topic", "updated_at"]), ArgumentLayout::ImplicitKey),
            "22023",
        );
    }

    #[test]
    fn test_odd_trailing_arguments_rejected() {
        assert_error_sqlstate(
            CascadeSpec::resolve(
                &strings(&["topic", "updated_at", "id", "topic_id", "is_deleted"]),
                ArgumentLayout::ExplicitKey,
            ),
            "22023",
        );
    }

    #[test]
    fn test_guard_pairs_preserve_order() {
        let spec = CascadeSpec::resolve(
            &strings(&["topic", "updated_at", "topic_id", "is_deleted", "f", "status", "1"]),
            ArgumentLayout::ImplicitKey,
        )
        .unwrap();

        assert_eq!(
            spec.guards,
            vec![
                GuardPair { column: "is_deleted".to_string(), expected: "f".to_string() },
                GuardPair { column: "status".to_string(), expected: "1".to_string() },
            ]
        );
    }

    #[test]
    fn test_malformed_identifiers_rejected() {
        assert_error_sqlstate(
            CascadeSpec::resolve(
                &strings(&["topic; DROP TABLE topic", "updated_at", "id", "topic_id"]),
                ArgumentLayout::ExplicitKey,
            ),
            "42602",
        );
        assert_error_sqlstate(
            CascadeSpec::resolve(
                &strings(&["topic", "updated_at", "topic_id", "bad column", "x"]),
                ArgumentLayout::ImplicitKey,
            ),
            "42602",
        );
    }

    #[test]
    fn test_schema_qualified_destination_accepted() {
        let spec = CascadeSpec::resolve(
            &strings(&["public.topic", "updated_at", "topic_id"]),
            ArgumentLayout::ImplicitKey,
        )
        .unwrap();

        assert_eq!(spec.destination_table, "public.topic");
    }

    #[test]
    fn test_predicate_values_are_not_validated_as_identifiers() {
        // expected values are data; anything goes
        let spec = CascadeSpec::resolve(
            &strings(&["topic", "updated_at", "topic_id", "state", "in review; maybe"]),
            ArgumentLayout::ImplicitKey,
        )
        .unwrap();

        assert_eq!(spec.guards[0].expected, "in review; maybe");
    }
}
