//! Arithmetic intrinsics (§6.4): add, subtract, multiply, divide, modulo
//! over the signed-integer and float kinds.
//!
//! These functions are exported with the C ABI so the back-end can link
//! them directly into a JIT-compiled module (§4.6). The registry binds
//! each one with `NULL_IF_ANY_NULL`: the emitter only calls them on rows
//! whose inputs are already known valid, and the emitter computes output
//! validity itself from the child validities — these functions read only
//! value arguments, matching §4.1.
//!
//! Divide and modulo additionally set `needs_execution_context`: on a
//! zero divisor they report through the execution context rather than
//! trapping (§4.5 Tie-breaks, §7 Runtime failure) and return a sentinel
//! value whose row is then surfaced as an `ExecutionError` for the whole
//! batch.

use vectorize_core::ExecutionContext;

// The int/float entry points below are written out by hand rather than
// generated through a macro: this keeps the generated-code contract
// (the exact symbol names the emitter links against) visible at the
// call site instead of hidden behind macro expansion.

// --- int8 -------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_int8(a: i8, b: i8) -> i8 {
    a.wrapping_add(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_int8(a: i8, b: i8) -> i8 {
    a.wrapping_sub(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_int8(a: i8, b: i8) -> i8 {
    a.wrapping_mul(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_int8(a: i8, b: i8, ctx: *mut ExecutionContext) -> i8 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_div(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_modulo_int8(a: i8, b: i8, ctx: *mut ExecutionContext) -> i8 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_rem(b)
}

// --- int16 ------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_int16(a: i16, b: i16) -> i16 {
    a.wrapping_add(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_int16(a: i16, b: i16) -> i16 {
    a.wrapping_sub(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_int16(a: i16, b: i16) -> i16 {
    a.wrapping_mul(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_int16(a: i16, b: i16, ctx: *mut ExecutionContext) -> i16 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_div(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_modulo_int16(a: i16, b: i16, ctx: *mut ExecutionContext) -> i16 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_rem(b)
}

// --- int32 ------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_int32(a: i32, b: i32) -> i32 {
    a.wrapping_add(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_int32(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_int32(a: i32, b: i32) -> i32 {
    a.wrapping_mul(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_int32(a: i32, b: i32, ctx: *mut ExecutionContext) -> i32 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_div(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_modulo_int32(a: i32, b: i32, ctx: *mut ExecutionContext) -> i32 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_rem(b)
}

// --- int64 ------------------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_int64(a: i64, b: i64) -> i64 {
    a.wrapping_add(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_int64(a: i64, b: i64) -> i64 {
    a.wrapping_sub(b)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_int64(a: i64, b: i64) -> i64 {
    a.wrapping_mul(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_int64(a: i64, b: i64, ctx: *mut ExecutionContext) -> i64 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_div(b)
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_modulo_int64(a: i64, b: i64, ctx: *mut ExecutionContext) -> i64 {
    if b == 0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0;
    }
    a.wrapping_rem(b)
}

// --- float32/float64 ----------------------------------------------------

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_float32(a: f32, b: f32) -> f32 {
    a + b
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_float32(a: f32, b: f32) -> f32 {
    a - b
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_float32(a: f32, b: f32) -> f32 {
    a * b
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_float32(a: f32, b: f32, ctx: *mut ExecutionContext) -> f32 {
    if b == 0.0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0.0;
    }
    a / b
}

#[unsafe(no_mangle)]
pub extern "C" fn vz_add_float64(a: f64, b: f64) -> f64 {
    a + b
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_subtract_float64(a: f64, b: f64) -> f64 {
    a - b
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_multiply_float64(a: f64, b: f64) -> f64 {
    a * b
}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_divide_float64(a: f64, b: f64, ctx: *mut ExecutionContext) -> f64 {
    if b == 0.0 {
        unsafe { (*ctx).set_error("divide by zero error") };
        return 0.0;
    }
    a / b
}
