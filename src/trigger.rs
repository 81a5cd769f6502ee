use pgrx::prelude::*;
/// Trigger Handlers: the cascade invocation pipeline
///
/// Two SQL-visible trigger functions share one pipeline:
/// - `cascade_timestamp` — explicit destination key column (4+ arguments)
/// - `cascade_touch` — destination key is the literal `id` column
///   (3+ arguments)
///
/// ## Invocation Flow
///
/// 1. Validate timing (AFTER) and granularity (FOR EACH ROW)
/// 2. Resolve the positional arguments into a `CascadeSpec`
/// 3. Classify the row change (no-op rewrites never cascade)
/// 4. Evaluate the predicate guard on the freshest row image
/// 5. Look up or build the cached plan, execute the touch
/// 6. Hand the triggering row back unchanged
///
/// The returned tuple is always the one the server passed in; this pipeline
/// only ever writes to the destination relation. Every error aborts the
/// enclosing transaction.
use crate::args::{ArgumentLayout, CascadeSpec};
use crate::change;
use crate::config;
use crate::error::{CascadeError, CascadeResult};
use crate::executor::{self, SourceKey};
use crate::guard;
use crate::plan_cache;
use crate::row::RowImage;

/// Touch a related row's timestamp column when this row changes.
///
/// Arguments: destination_table, destination_timestamp_column,
/// destination_key_column, source_key_column, then optional
/// (predicate_column, predicate_value) pairs.
#[pg_trigger]
fn cascade_timestamp<'a>(
    trigger: &'a PgTrigger<'a>,
) -> Result<Option<PgHeapTuple<'a, AllocatedByPostgres>>, CascadeError> {
    match fire(trigger, ArgumentLayout::ExplicitKey) {
        Ok(tuple) => Ok(tuple),
        Err(e) => e.raise(),
    }
}

/// Simplified variant: the destination key column is literally `id`.
///
/// Arguments: destination_table, destination_column, source_key_column, then
/// optional (predicate_column, predicate_value) pairs.
#[pg_trigger]
fn cascade_touch<'a>(
    trigger: &'a PgTrigger<'a>,
) -> Result<Option<PgHeapTuple<'a, AllocatedByPostgres>>, CascadeError> {
    match fire(trigger, ArgumentLayout::ImplicitKey) {
        Ok(tuple) => Ok(tuple),
        Err(e) => e.raise(),
    }
}

fn fire<'a>(
    trigger: &'a PgTrigger<'a>,
    layout: ArgumentLayout,
) -> Result<Option<PgHeapTuple<'a, AllocatedByPostgres>>, CascadeError> {
    match trigger.when()? {
        PgTriggerWhen::After => {}
        other => return Err(CascadeError::WrongTiming { found: other.to_string() }),
    }
    match trigger.level() {
        PgTriggerLevel::Row => {}
        other => return Err(CascadeError::WrongLevel { found: other.to_string() }),
    }

    let operation = trigger.op()?;
    let spec = CascadeSpec::resolve(&trigger.extra_args()?, layout)?;

    let relation = trigger.relation()?;
    let data = trigger.trigger_data();
    let tupdesc = unsafe { (*data.tg_relation).rd_att };

    // the row handed back to the server on every successful exit
    let triggering_row = match operation {
        PgTriggerOperation::Insert => trigger.new(),
        _ => trigger.old(),
    };

    let changed = match operation {
        PgTriggerOperation::Insert | PgTriggerOperation::Delete => true,
        PgTriggerOperation::Update => {
            let old = unsafe { RowImage::from_trigger(data.tg_trigtuple, tupdesc) };
            let new = unsafe { RowImage::from_trigger(data.tg_newtuple, tupdesc) };
            change::row_changed(&old, &new, &relation.tuple_desc())
        }
        PgTriggerOperation::Truncate => {
            return Err(CascadeError::WrongLevel { found: PgTriggerLevel::Statement.to_string() })
        }
    };
    if !changed {
        if config::TRACE_CASCADES {
            log!("cascade on {}: rewrite without changes, skipping", relation.name());
        }
        return Ok(triggering_row);
    }

    // guard and key read the freshest image: NEW when present, otherwise the
    // single row of the insert/delete
    let row = unsafe {
        RowImage::from_trigger(
            if data.tg_newtuple.is_null() { data.tg_trigtuple } else { data.tg_newtuple },
            tupdesc,
        )
    };

    if !guard::passes(&row, relation.name(), &spec.guards)? {
        if config::TRACE_CASCADES {
            log!("cascade on {}: predicate guard vetoed, skipping", relation.name());
        }
        return Ok(triggering_row);
    }

    let key = source_key(&row, relation.name(), &spec)?;
    let ident = plan_cache::plan_ident(trigger.name()?, relation.oid());
    executor::run(&spec, &ident, &key)?;

    Ok(triggering_row)
}

fn source_key(row: &RowImage, relation: &str, spec: &CascadeSpec) -> CascadeResult<SourceKey> {
    let attribute =
        row.attribute_number(&spec.source_key).ok_or_else(|| CascadeError::UnknownAttribute {
            relation: relation.to_string(),
            attribute: spec.source_key.clone(),
        })?;

    let (datum, is_null) = row.binary_value(attribute);
    Ok(SourceKey { datum: (!is_null).then_some(datum), type_oid: row.type_oid(attribute) })
}
