//! The `to_date` intrinsic (§6.4, §4.9): parses a string into a
//! `timestamp-in-millis` value using a precompiled [`DateHolder`].
//! `NULL_INTERNAL` — the holder decides whether a parse failure is
//! reported through the execution context (suppress-errors literal arg).

use std::slice;
use std::str;
use vectorize_core::{DateHolder, ExecutionContext};

/// # Safety
/// `ptr` must point to at least `len` valid UTF-8 bytes; `holder` and `ctx`
/// must point to live values for the call's duration.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_to_date(
    ptr: *const u8,
    len: i64,
    holder: *const DateHolder,
    ctx: *mut ExecutionContext,
) -> i64 {
    let bytes = unsafe { slice::from_raw_parts(ptr, len as usize) };
    let Ok(value) = str::from_utf8(bytes) else {
        unsafe {
            (*ctx).set_error("invalid utf8 passed to to_date");
            (*ctx).mark_internal_invalid();
        }
        return 0;
    };
    let holder = unsafe { &*holder };
    match holder.parse(value, unsafe { &mut *ctx }) {
        Some(millis) => millis,
        None => {
            unsafe { (*ctx).mark_internal_invalid() };
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_through_raw_pointers() {
        let holder = DateHolder::make("YYYY-MM-DD", false);
        let mut ctx = ExecutionContext::new();
        let value = "2016-01-01";
        let millis = unsafe { vz_to_date(value.as_ptr(), value.len() as i64, &holder, &mut ctx) };
        assert_eq!(millis, 1451606400000);
        assert!(!ctx.has_error());
    }

    #[test]
    fn reports_unparsable_input() {
        let holder = DateHolder::make("YYYY-MM-DD", false);
        let mut ctx = ExecutionContext::new();
        let value = "nope";
        let millis = unsafe { vz_to_date(value.as_ptr(), value.len() as i64, &holder, &mut ctx) };
        assert_eq!(millis, 0);
        assert!(ctx.has_error());
        assert!(!ctx.take_internal_validity());
    }

    #[test]
    fn suppressed_failure_marks_internal_invalid_without_an_error() {
        let holder = DateHolder::make("YYYY-MM-DD", true);
        let mut ctx = ExecutionContext::new();
        let value = "nope";
        let millis = unsafe { vz_to_date(value.as_ptr(), value.len() as i64, &holder, &mut ctx) };
        assert_eq!(millis, 0);
        assert!(!ctx.has_error());
        assert!(!ctx.take_internal_validity());
    }
}
