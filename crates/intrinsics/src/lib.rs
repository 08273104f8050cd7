//! Vectorize Intrinsics: the precompiled native implementations of the
//! intrinsic function catalogue (§6.4).
//!
//! Every public function here is a leaf routine (§3 Lifecycle) exported
//! with the C ABI, callable both directly from Rust (tests, and the
//! engine's own sanity checks) and from JIT-compiled code linked against
//! this crate's `staticlib`/`cdylib` artifact (§4.6). None of them
//! allocate, panic, or unwind: failures are reported through an
//! [`vectorize_core::ExecutionContext`] hidden argument where the
//! registry (§4.1) marks a signature `needs_execution_context`.
//!
//! The registry in `crates/compiler` is the single source of truth for
//! which of these symbols a given function name and kind signature maps
//! to, their null-behaviour tag, and whether they need the execution
//! context or a function holder; this crate only supplies the
//! implementations.

pub mod arithmetic;
pub mod cast;
pub mod comparison;
pub mod datetime;
pub mod hash;
pub mod like;
pub mod logical;
pub mod runtime_support;
pub mod string_ops;
pub mod to_date;
