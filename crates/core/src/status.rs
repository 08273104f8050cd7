//! The structured status/error surface (§4.11, §7).
//!
//! Four non-OK categories, never exceptions: [`StatusCode::Invalid`] for
//! caller misuse, [`StatusCode::ExpressionValidationError`] for §4.2
//! failures, [`StatusCode::CodeGenError`] for back-end refusals, and
//! [`StatusCode::ExecutionError`] for runtime failures surfaced through the
//! execution context. Every non-OK status carries a human-readable message.
//!
//! Following the teacher's convention (`codegen/error.rs`), this is a
//! hand-rolled enum with a manual `Display`/`Error` impl rather than a
//! `thiserror` derive.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Invalid,
    ExpressionValidationError,
    CodeGenError,
    ExecutionError,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusCode::Ok => "OK",
            StatusCode::Invalid => "Invalid",
            StatusCode::ExpressionValidationError => "ExpressionValidationError",
            StatusCode::CodeGenError => "CodeGenError",
            StatusCode::ExecutionError => "ExecutionError",
        };
        write!(f, "{s}")
    }
}

/// A status result: an error code plus a human-readable message.
///
/// `make` returns `Invalid | ExpressionValidationError | CodeGenError`.
/// `evaluate` returns `Invalid | ExecutionError`. There is no `Ok` variant
/// of this type by construction — success is `Result::Ok(T)`; `Status` only
/// ever appears as `Result::Err(Status)`. [`Status::ok`] exists for the rare
/// case an API wants to hand back a status value rather than a `Result`.
#[derive(Debug, Clone)]
pub struct Status {
    code: StatusCode,
    message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Status {
            code,
            message: message.into(),
        }
    }

    pub fn ok() -> Self {
        Status::new(StatusCode::Ok, "")
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Status::new(StatusCode::Invalid, message)
    }

    pub fn expression_validation_error(message: impl Into<String>) -> Self {
        Status::new(StatusCode::ExpressionValidationError, message)
    }

    pub fn code_gen_error(message: impl Into<String>) -> Self {
        Status::new(StatusCode::CodeGenError, message)
    }

    pub fn execution_error(message: impl Into<String>) -> Self {
        Status::new(StatusCode::ExecutionError, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for Status {}

impl From<fmt::Error> for Status {
    fn from(e: fmt::Error) -> Self {
        Status::code_gen_error(format!("IR generation error: {e}"))
    }
}

/// Convenience alias used throughout the pipeline.
pub type VResult<T> = Result<T, Status>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_code_and_message() {
        let s = Status::invalid("batch is empty");
        assert_eq!(s.to_string(), "Invalid: batch is empty");
    }

    #[test]
    fn fmt_error_becomes_code_gen_error() {
        let err = fmt::Error;
        let status: Status = err.into();
        assert_eq!(status.code(), StatusCode::CodeGenError);
    }
}
