//! Per-call execution context (§3 Lifecycle, §4.5 Status return, §9).
//!
//! Emitted leaf routines and `NULL_INTERNAL`/error-reporting intrinsics
//! cannot unwind across the FFI boundary they're called through, so
//! runtime failures are reported by writing a message into this struct
//! instead of panicking. This mirrors the teacher's `error.rs` pattern
//! (`set_runtime_error` / `take_runtime_error` / `has_runtime_error`) but
//! threads the state through an explicit, per-call struct rather than a
//! thread-local, since one context belongs to exactly one `evaluate` call
//! and is passed as a hidden pointer argument to generated code.

/// A `#[repr(C)]` handle emitted code receives as a hidden first argument
/// whenever a registry entry's `needs_execution_context` flag is set.
#[repr(C)]
#[derive(Debug, Default)]
pub struct ExecutionContext {
    error: Option<String>,
    internal_invalid: bool,
}

impl ExecutionContext {
    pub fn new() -> Self {
        ExecutionContext {
            error: None,
            internal_invalid: false,
        }
    }

    /// Called by a `NULL_INTERNAL` intrinsic (e.g. `to_date` on an
    /// unparsable, suppressed input) to report that this row's output is
    /// null even though the call itself didn't error.
    pub fn mark_internal_invalid(&mut self) {
        self.internal_invalid = true;
    }

    /// Reads back whether the most recent `NULL_INTERNAL` call considered
    /// its output valid, resetting the flag for the next call.
    pub fn take_internal_validity(&mut self) -> bool {
        let was_invalid = self.internal_invalid;
        self.internal_invalid = false;
        !was_invalid
    }

    /// Record a runtime error. Called by intrinsics (through the hidden
    /// context pointer) on conditions such as integer division by zero or
    /// an unparsable `to_date` input.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    /// Reset between batches (§3 Lifecycle: "the execution context is
    /// reset (error cleared) between batches").
    pub fn reset(&mut self) {
        self.error = None;
        self.internal_invalid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_clears_error() {
        let mut ctx = ExecutionContext::new();
        assert!(!ctx.has_error());
        ctx.set_error("divide by zero");
        assert!(ctx.has_error());
        assert_eq!(ctx.take_error().as_deref(), Some("divide by zero"));
        assert!(!ctx.has_error());
    }

    #[test]
    fn reset_clears_a_pending_error() {
        let mut ctx = ExecutionContext::new();
        ctx.set_error("boom");
        ctx.reset();
        assert!(!ctx.has_error());
    }

    #[test]
    fn internal_validity_defaults_true_and_resets_after_one_read() {
        let mut ctx = ExecutionContext::new();
        assert!(ctx.take_internal_validity());
        ctx.mark_internal_invalid();
        assert!(!ctx.take_internal_validity());
        assert!(ctx.take_internal_validity());
    }
}
