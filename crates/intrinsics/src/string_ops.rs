//! UTF-8 string intrinsics (§6.4): character/byte length and prefix/suffix
//! predicates. Inputs are `(ptr, len)` pairs into the batch's variable-width
//! data buffer, matching the teacher's own convention of never copying
//! string data across the FFI boundary.
//!
//! `char_length` needs the execution context: invalid UTF-8 in the backing
//! buffer is a runtime failure (§7), not a panic — the core never permits
//! an emitted/linked function to unwind.

use std::slice;
use std::str;
use vectorize_core::ExecutionContext;

unsafe fn as_str<'a>(ptr: *const u8, len: i32) -> Result<&'a str, str::Utf8Error> {
    let bytes = unsafe { slice::from_raw_parts(ptr, len as usize) };
    str::from_utf8(bytes)
}

/// # Safety
/// `ptr` must point to at least `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_char_length(
    ptr: *const u8,
    len: i32,
    ctx: *mut ExecutionContext,
) -> i32 {
    match unsafe { as_str(ptr, len) } {
        Ok(s) => s.chars().count() as i32,
        Err(e) => {
            unsafe { (*ctx).set_error(format!("invalid utf8 encountered: {e}")) };
            0
        }
    }
}

/// # Safety
/// `ptr` must point to at least `len` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_byte_length(_ptr: *const u8, len: i32) -> i32 {
    len
}

/// # Safety
/// Both pointer/length pairs must point to readable byte ranges.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_starts_with(
    ptr: *const u8,
    len: i32,
    prefix_ptr: *const u8,
    prefix_len: i32,
) -> u8 {
    let haystack = unsafe { slice::from_raw_parts(ptr, len as usize) };
    let prefix = unsafe { slice::from_raw_parts(prefix_ptr, prefix_len as usize) };
    haystack.starts_with(prefix) as u8
}

/// # Safety
/// Both pointer/length pairs must point to readable byte ranges.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_ends_with(
    ptr: *const u8,
    len: i32,
    suffix_ptr: *const u8,
    suffix_len: i32,
) -> u8 {
    let haystack = unsafe { slice::from_raw_parts(ptr, len as usize) };
    let suffix = unsafe { slice::from_raw_parts(suffix_ptr, suffix_len as usize) };
    haystack.ends_with(suffix) as u8
}
