//! Markers for aborts that have already been logged
//!
//! `Logger::panic` unwinds with an [`ExpectedPanic`] payload; recovery code
//! checks for it with [`is_expected_panic`] and skips re-reporting.
//! `Logger::abort` is the non-unwinding form and returns [`Reported`].

use std::any::Any;
use thiserror::Error;

/// Unwind payload of an intentional, already-logged panic
///
/// Only this crate can construct it, so a payload of this type always
/// originates from `Logger::panic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedPanic {
    _private: (),
}

impl ExpectedPanic {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// The payload `Logger::panic` unwinds with
pub const EXPECTED_PANIC: ExpectedPanic = ExpectedPanic::new();

/// True when an unwind payload is the expected-panic marker
pub fn is_expected_panic(payload: &(dyn Any + Send)) -> bool {
    payload.is::<ExpectedPanic>()
}

/// Error returned by `Logger::abort`: the failure is already in the log
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Reported {
    message: String,
}

impl Reported {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Best-effort text of an arbitrary panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if is_expected_panic(payload) {
        "expected panic".to_string()
    } else {
        "unknown panic payload".to_string()
    }
}
