//! Runtime support intrinsics (§4.5, §6.1, §6.2): the small accessor
//! functions every emitted leaf routine calls to index into the
//! `%EvalArgs` buffer/bitmap/holder arrays, read and write validity bits,
//! and address variable-width data. These are declared unconditionally
//! by the emitter (`emit_runtime_support_declarations`) rather than
//! looked up through the registry, since every leaf routine needs them
//! regardless of which intrinsics it calls.

use std::slice;
use vectorize_core::buffer::{get_bit, set_bit};
use vectorize_core::ExecutionContext;

/// Indexes the flat buffer-pointer array the caller supplies per batch
/// (§6.1/§6.2).
///
/// # Safety
/// `buffers` must point to at least `slot + 1` readable pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_slot_ptr(buffers: *const *mut u8, slot: i64) -> *mut u8 {
    unsafe { *buffers.add(slot as usize) }
}

/// Indexes the local-bitmap pointer array (`NULL_INTERNAL` scratch
/// bitmaps and if/boolean result bitmaps, §4.4).
///
/// # Safety
/// `local_bitmaps` must point to at least `index + 1` readable pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_local_bitmap_ptr(local_bitmaps: *const *mut u8, index: i64) -> *mut u8 {
    unsafe { *local_bitmaps.add(index as usize) }
}

/// Indexes the function-holder pointer array (§4.9); the returned
/// pointer is opaque to generated code and passed straight through to
/// the intrinsic that owns the holder's concrete type.
///
/// # Safety
/// `holders` must point to at least `index + 1` readable pointers.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_holder_ptr(holders: *const *const u8, index: i64) -> *const u8 {
    unsafe { *holders.add(index as usize) }
}

/// # Safety
/// `bitmap` must have at least `row / 8 + 1` readable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_get_bit(bitmap: *const u8, row: i64) -> bool {
    unsafe { get_bit(bitmap, row as usize) }
}

/// # Safety
/// `bitmap` must have at least `row / 8 + 1` writable bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_set_bit(bitmap: *mut u8, row: i64, value: i8) {
    unsafe { set_bit(bitmap, row as usize, value != 0) }
}

/// Addresses the start of row `row`'s variable-width data (§3 "Reading a
/// value"): `[start, end)` comes out of the offsets buffer, one `int32`
/// per row plus a terminator (§6.1).
///
/// # Safety
/// `offsets` must have at least `row + 1` readable `i32`s; `data` must be
/// readable from `offsets[row]` to `offsets[row + 1]`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_varwidth_ptr(data: *mut u8, offsets: *const i32, row: i64) -> *mut u8 {
    let start = unsafe { *offsets.add(row as usize) };
    unsafe { data.add(start as usize) }
}

/// # Safety
/// `offsets` must have at least `row + 2` readable `i32`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_varwidth_len(offsets: *const i32, row: i64) -> i64 {
    let row = row as usize;
    let start = unsafe { *offsets.add(row) };
    let end = unsafe { *offsets.add(row + 1) };
    (end - start) as i64
}

/// # Safety
/// `ctx` must point to a live [`ExecutionContext`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_context_has_error(ctx: *const ExecutionContext) -> i32 {
    unsafe { (*ctx).has_error() as i32 }
}

/// # Safety
/// `ctx` must point to a live [`ExecutionContext`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_take_internal_validity(ctx: *mut ExecutionContext) -> bool {
    unsafe { (*ctx).take_internal_validity() }
}
