//! `hash32`/`hash64` (§6.4): `NULL_NEVER` — validity arrives as an
//! auto-injected trailing argument (the registry's `needs_validity_arg`,
//! distinct from `is_null`'s user-visible validity argument) and a null
//! input hashes to 0 rather than being routed through the emitter's usual
//! null-propagation path. The seed is the second declared argument, so two
//! calls with different seed literals compile to distinct leaf routines
//! and therefore distinct cache entries (§6.4 "seed-perturbable").
//!
//! Every numeric kind canonicalises to its `f64` bit pattern before
//! hashing, so `hash(x: int32) == hash(x: int64) == hash(x: float64)`
//! whenever the values are numerically equal, matching the catalogue
//! requirement that hashing be insensitive to which numeric kind produced
//! a value.

use std::hash::Hasher;
use std::slice;
use twox_hash::{XxHash32, XxHash64};

fn hash64_bytes(bytes: &[u8], seed: u64) -> u64 {
    let mut hasher = XxHash64::with_seed(seed);
    hasher.write(bytes);
    hasher.finish()
}

fn hash32_bytes(bytes: &[u8], seed: u32) -> u32 {
    let mut hasher = XxHash32::with_seed(seed);
    hasher.write(bytes);
    hasher.finish() as u32
}

macro_rules! define_numeric_hash {
    ($ty:ty, $h64:ident, $h32:ident) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn $h64(value: $ty, seed: i64, validity: u8) -> u64 {
            if validity == 0 {
                return 0;
            }
            hash64_bytes(&(value as f64).to_bits().to_le_bytes(), seed as u64)
        }
        #[unsafe(no_mangle)]
        pub extern "C" fn $h32(value: $ty, seed: i64, validity: u8) -> u32 {
            if validity == 0 {
                return 0;
            }
            hash32_bytes(&(value as f64).to_bits().to_le_bytes(), seed as u32)
        }
    };
}

define_numeric_hash!(i8, vz_hash64_int8, vz_hash32_int8);
define_numeric_hash!(i16, vz_hash64_int16, vz_hash32_int16);
define_numeric_hash!(i32, vz_hash64_int32, vz_hash32_int32);
define_numeric_hash!(i64, vz_hash64_int64, vz_hash32_int64);
define_numeric_hash!(f32, vz_hash64_float32, vz_hash32_float32);

#[unsafe(no_mangle)]
pub extern "C" fn vz_hash64_float64(value: f64, seed: i64, validity: u8) -> u64 {
    if validity == 0 {
        return 0;
    }
    hash64_bytes(&value.to_bits().to_le_bytes(), seed as u64)
}
#[unsafe(no_mangle)]
pub extern "C" fn vz_hash32_float64(value: f64, seed: i64, validity: u8) -> u32 {
    if validity == 0 {
        return 0;
    }
    hash32_bytes(&value.to_bits().to_le_bytes(), seed as u32)
}

/// # Safety
/// `ptr` must point to at least `len` readable bytes when `validity != 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_hash64_utf8(
    ptr: *const u8,
    len: i64,
    seed: i64,
    validity: u8,
) -> u64 {
    if validity == 0 {
        return 0;
    }
    let bytes = unsafe { slice::from_raw_parts(ptr, len as usize) };
    hash64_bytes(bytes, seed as u64)
}

/// # Safety
/// `ptr` must point to at least `len` readable bytes when `validity != 0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn vz_hash32_utf8(
    ptr: *const u8,
    len: i64,
    seed: i64,
    validity: u8,
) -> u32 {
    if validity == 0 {
        return 0;
    }
    let bytes = unsafe { slice::from_raw_parts(ptr, len as usize) };
    hash32_bytes(bytes, seed as u32)
}
