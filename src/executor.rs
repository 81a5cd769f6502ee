//! Update Executor: build, cache, and run the single-parameter cascade UPDATE.
//!
//! The statement is synthesized once per `(trigger, relation)` pair, prepared
//! with the source key's declared type, kept for the life of the backend, and
//! from then on every firing costs one execution of an already-planned
//! statement.

use std::rc::Rc;

use pgrx::datum::DatumWithOid;
use pgrx::prelude::*;
use pgrx::spi::{OwnedPreparedStatement, PreparedStatement};

use crate::args::CascadeSpec;
use crate::config;
use crate::error::{CascadeError, CascadeResult};
use crate::plan_cache;

/// The source key's current value and declared type, as read off the
/// triggering row
pub struct SourceKey {
    /// `None` means SQL NULL: the child row has no parent link
    pub datum: Option<pg_sys::Datum>,
    pub type_oid: PgOid,
}

/// Synthesize the cascade statement for a resolved spec.
///
/// Exactly one parameter: the destination key value.
pub fn touch_statement(spec: &CascadeSpec) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {} = $1",
        spec.destination_table,
        spec.destination_column,
        config::TOUCH_TIMESTAMP_EXPR,
        spec.destination_key.as_sql(),
    )
}

/// Perform the cascade for one invocation.
///
/// Returns whether a statement was executed: a NULL source key skips
/// silently, since a child row may legitimately lack a parent link.
pub fn run(spec: &CascadeSpec, ident: &str, key: &SourceKey) -> CascadeResult<bool> {
    let Some(datum) = key.datum else {
        if config::TRACE_CASCADES {
            log!("cascade {}: source key is NULL, skipping", ident);
        }
        return Ok(false);
    };

    let plan = plan_cache::with(|cache| -> CascadeResult<Rc<OwnedPreparedStatement>> {
        let entry = cache.lookup_or_create(ident);
        if let Some(plan) = entry.plan() {
            return Ok(plan);
        }

        let sql = touch_statement(spec);
        let statement =
            Spi::connect(|client| {
                client.prepare(sql.as_str(), &[key.type_oid]).map(PreparedStatement::keep)
            })
            .map_err(|e| CascadeError::planning(&sql, &e))?;

        if config::TRACE_CASCADES {
            log!("cascade {}: planned \"{}\"", ident, sql);
        }
        Ok(entry.fill(statement))
    })?;
    // cache borrow released: the UPDATE below may fire further cascade
    // triggers that re-enter the cache

    let arguments = [unsafe { DatumWithOid::new(datum, key.type_oid.value()) }];
    Spi::connect_mut(|client| client.update(&*plan, None, &arguments).map(|_| ()))
        .map_err(|e| CascadeError::execution(&touch_statement(spec), &e))?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::{ArgumentLayout, CascadeSpec};

    fn resolve(args: &[&str], layout: ArgumentLayout) -> CascadeSpec {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        CascadeSpec::resolve(&args, layout).unwrap()
    }

    #[test]
    fn test_statement_with_explicit_key() {
        let spec = resolve(&["topic", "updated_at", "id", "topic_id"], ArgumentLayout::ExplicitKey);
        assert_eq!(touch_statement(&spec), "UPDATE topic SET updated_at = NOW() WHERE id = $1");
    }

    #[test]
    fn test_statement_with_implicit_key() {
        let spec = resolve(&["topic", "updated_at", "topic_id"], ArgumentLayout::ImplicitKey);
        assert_eq!(touch_statement(&spec), "UPDATE topic SET updated_at = NOW() WHERE id = $1");
    }

    #[test]
    fn test_statement_with_schema_qualified_destination() {
        let spec = resolve(
            &["forum.topic", "touched_at", "topic_pk", "topic_id"],
            ArgumentLayout::ExplicitKey,
        );
        assert_eq!(
            touch_statement(&spec),
            "UPDATE forum.topic SET touched_at = NOW() WHERE topic_pk = $1"
        );
    }

    #[test]
    fn test_guards_do_not_leak_into_statement() {
        let spec = resolve(
            &["topic", "updated_at", "topic_id", "is_deleted", "f"],
            ArgumentLayout::ImplicitKey,
        );
        assert!(!touch_statement(&spec).contains("is_deleted"));
    }
}
