//! Predicate Guard: optional equality conditions on the triggering row.
//!
//! A declarative "only cascade while column X equals Y" filter. Equality
//! only; values are compared as the text their output function renders
//! (a boolean guard therefore expects `t` or `f`).

use crate::args::GuardPair;
use crate::error::{CascadeError, CascadeResult};
use crate::row::RowImage;

/// Evaluate the guard pairs against the row, short-circuiting on the first
/// mismatch.
///
/// A NULL column value never vetoes the cascade. An unknown column name is a
/// fatal error, reported against `relation`.
pub fn passes(row: &RowImage, relation: &str, guards: &[GuardPair]) -> CascadeResult<bool> {
    for guard in guards {
        let attribute =
            row.attribute_number(&guard.column).ok_or_else(|| CascadeError::UnknownAttribute {
                relation: relation.to_string(),
                attribute: guard.column.clone(),
            })?;

        if let Some(actual) = row.text_value(attribute) {
            if actual != guard.expected {
                return Ok(false);
            }
        }
    }

    Ok(true)
}
