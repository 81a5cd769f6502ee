//! Read-only access to one tuple of the triggering relation.
//!
//! Wraps the server's tuple-inspection primitives behind a borrow of the
//! trigger-provided heap tuple. Nothing here writes to the tuple; the
//! triggering row goes back to the executor exactly as it arrived.

use std::ffi::{CStr, CString};

use pgrx::pg_sys;
use pgrx::PgOid;

/// One row of the triggering relation at a point in time.
///
/// Values are only ever read out for comparison and parameter binding.
pub struct RowImage {
    tuple: pg_sys::HeapTuple,
    tupdesc: pg_sys::TupleDesc,
}

impl RowImage {
    /// Wrap a heap tuple handed over by the trigger machinery.
    ///
    /// # Safety
    ///
    /// `tuple` and `tupdesc` must be the non-null pointers provided by the
    /// server for the current trigger invocation; they stay valid for the
    /// whole invocation, which bounds every use of the returned image.
    pub unsafe fn from_trigger(tuple: pg_sys::HeapTuple, tupdesc: pg_sys::TupleDesc) -> Self {
        RowImage { tuple, tupdesc }
    }

    /// Resolve a column name to its attribute number.
    ///
    /// Returns `None` for unknown names and for system columns; callers turn
    /// that into an `UnknownAttribute` error with the relation name attached.
    pub fn attribute_number(&self, name: &str) -> Option<i32> {
        let cname = CString::new(name).ok()?;
        let fnumber = unsafe { pg_sys::SPI_fnumber(self.tupdesc, cname.as_ptr()) };
        (fnumber > 0).then_some(fnumber)
    }

    /// Render a column's current value with its type's output function.
    ///
    /// `None` means SQL NULL.
    pub fn text_value(&self, attribute: i32) -> Option<String> {
        let raw = unsafe { pg_sys::SPI_getvalue(self.tuple, self.tupdesc, attribute) };
        if raw.is_null() {
            return None;
        }
        let value = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        unsafe { pg_sys::pfree(raw.cast()) };
        Some(value)
    }

    /// Fetch a column's value in binary form, plus its null flag.
    ///
    /// The datum borrows the tuple's storage and must not outlive the
    /// invocation.
    pub fn binary_value(&self, attribute: i32) -> (pg_sys::Datum, bool) {
        let mut is_null = false;
        let datum =
            unsafe { pg_sys::SPI_getbinval(self.tuple, self.tupdesc, attribute, &mut is_null) };
        (datum, is_null)
    }

    /// Declared type of a column.
    pub fn type_oid(&self, attribute: i32) -> PgOid {
        PgOid::from(unsafe { pg_sys::SPI_gettypeid(self.tupdesc, attribute) })
    }
}
