//! The `like` intrinsic (§6.4, §4.9): matches a string value against a
//! precompiled [`vectorize_core::PatternHolder`]. `NULL_IF_ANY_NULL`,
//! `needs_function_holder`.

use std::slice;
use std::str;
use vectorize_core::PatternHolder;

/// # Safety
/// `ptr` must point to at least `len` valid UTF-8 bytes; `holder` must
/// point to a live `PatternHolder` for the lifetime of the compiled
/// module (§9 Pointer graphs).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_like(ptr: *const u8, len: i64, holder: *const PatternHolder) -> u8 {
    let bytes = unsafe { slice::from_raw_parts(ptr, len as usize) };
    let Ok(value) = str::from_utf8(bytes) else {
        return 0;
    };
    let holder = unsafe { &*holder };
    holder.is_match(value) as u8
}
