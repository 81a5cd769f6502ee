//! Row Change Classifier: did an UPDATE actually change anything?
//!
//! ORMs routinely re-save rows with identical content; stamping the parent on
//! every such write would defeat the point of the cascade. Inserts and deletes
//! always count as changes; updates are compared field by field over the
//! relation's attribute schema.

use pgrx::pg_sys;
use pgrx::PgTupleDesc;

use crate::row::RowImage;

/// Compare the old and new images of an updated row.
///
/// Dropped columns are skipped. For each live attribute the null flags must
/// agree and non-null values must be datum-equal. Any disagreement counts as
/// a change; a value the comparison cannot see through (e.g. one side stored
/// out of line) also counts as a change, which errs toward cascading.
pub fn row_changed(old: &RowImage, new: &RowImage, attributes: &PgTupleDesc) -> bool {
    for attribute in attributes.iter() {
        if attribute.attisdropped {
            continue;
        }
        let attno = i32::from(attribute.attnum);

        let (old_datum, old_null) = old.binary_value(attno);
        let (new_datum, new_null) = new.binary_value(attno);

        if old_null != new_null {
            return true;
        }
        if old_null {
            continue;
        }

        let equal = unsafe {
            pg_sys::datumIsEqual(
                old_datum,
                new_datum,
                attribute.attbyval,
                i32::from(attribute.attlen),
            )
        };
        if !equal {
            return true;
        }
    }

    false
}
