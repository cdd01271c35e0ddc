//! Leveled logging API used by request handlers
//!
//! Every call reads the trace id from the caller's context, builds a record
//! and enqueues it without blocking. Nothing here performs I/O.

use super::level::Level;
use super::record::{Fields, LogRecord, STACKTRACE_KEY};
use super::sentinel::{Reported, EXPECTED_PANIC};
use super::stream::StreamHandle;
use super::trace::{trace_id_from, TraceSource};
use std::backtrace::Backtrace;
use std::sync::Arc;

struct Inner {
    app: StreamHandle,
    access: StreamHandle,
}

/// Handle to the application and access streams
///
/// Cheap to clone; share it through application state.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl Logger {
    pub fn new(app: StreamHandle, access: StreamHandle) -> Self {
        Self {
            inner: Arc::new(Inner { app, access }),
        }
    }

    /// Whether a record at `level` would reach the application sink
    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        self.inner.app.allows(level)
    }

    pub fn debug(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        self.log(Level::Debug, ctx, msg, fields);
    }

    pub fn info(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        self.log(Level::Info, ctx, msg, fields);
    }

    pub fn warn(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        self.log(Level::Warn, ctx, msg, fields);
    }

    pub fn error(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        self.log(Level::Error, ctx, msg, fields);
    }

    /// Emit regardless of threshold. Terminating the process is up to the caller.
    pub fn fatal(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        self.emit(Level::Fatal, trace_id_from(ctx), msg, fields);
    }

    /// Emit regardless of threshold, then unwind with the expected-panic marker
    pub fn panic(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) -> ! {
        self.emit(Level::Panic, trace_id_from(ctx), msg, fields);
        std::panic::panic_any(EXPECTED_PANIC)
    }

    /// Emit at panic level and return an already-reported error instead of unwinding
    pub fn abort(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) -> Reported {
        self.emit(Level::Panic, trace_id_from(ctx), msg, fields);
        Reported::new(msg)
    }

    /// Info record with a `stacktrace` field of the current call stack
    pub fn stack(&self, ctx: &(impl TraceSource + ?Sized), msg: &str, mut fields: Fields) {
        if !self.enabled(Level::Info) {
            return;
        }
        fields.insert(STACKTRACE_KEY, Backtrace::force_capture().to_string());
        self.emit(Level::Info, trace_id_from(ctx), msg, fields);
    }

    /// One audit line on the access stream, unfiltered
    pub fn access(&self, ctx: &(impl TraceSource + ?Sized), fields: Fields) {
        if self.inner.access.is_disabled() {
            return;
        }
        let record = LogRecord::access(trace_id_from(ctx), fields);
        self.inner.access.write(&record);
    }

    /// Bind a trace id once for repeated calls
    pub fn with_trace(&self, ctx: &(impl TraceSource + ?Sized)) -> ScopedLogger {
        ScopedLogger {
            logger: self.clone(),
            trace_id: trace_id_from(ctx),
        }
    }

    pub fn app_stream(&self) -> &StreamHandle {
        &self.inner.app
    }

    pub fn access_stream(&self) -> &StreamHandle {
        &self.inner.access
    }

    #[inline]
    fn log(&self, level: Level, ctx: &(impl TraceSource + ?Sized), msg: &str, fields: Fields) {
        if !self.enabled(level) {
            return;
        }
        self.emit(level, trace_id_from(ctx), msg, fields);
    }

    fn emit(&self, level: Level, trace_id: String, msg: &str, fields: Fields) {
        let record = LogRecord::application(level, trace_id, msg, fields);
        self.inner.app.write(&record);
    }
}

/// Logger bound to a single trace id
#[derive(Clone)]
pub struct ScopedLogger {
    logger: Logger,
    trace_id: String,
}

impl ScopedLogger {
    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn debug(&self, msg: &str, fields: Fields) {
        self.log(Level::Debug, msg, fields);
    }

    pub fn info(&self, msg: &str, fields: Fields) {
        self.log(Level::Info, msg, fields);
    }

    pub fn warn(&self, msg: &str, fields: Fields) {
        self.log(Level::Warn, msg, fields);
    }

    pub fn error(&self, msg: &str, fields: Fields) {
        self.log(Level::Error, msg, fields);
    }

    fn log(&self, level: Level, msg: &str, fields: Fields) {
        if self.logger.enabled(level) {
            self.logger.emit(level, self.trace_id.clone(), msg, fields);
        }
    }
}
