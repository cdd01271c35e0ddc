//! Asynchronous structured logging
//!
//! Two independent streams, each a file fed by its own bounded writer:
//! - **application**: leveled records (`debug` .. `panic`, `stack`)
//! - **access**: one unfiltered line per completed request
//!
//! ## Architecture
//!
//! ```text
//! request handlers ──► Logger (filter, trace id, encode)
//!                          │  enqueue, never blocks
//!                          ▼
//!                  bounded buffer (drop newest when full)
//!                          │  drained every flush interval
//!                          ▼
//!                  flush thread ──► sink file
//! ```
//!
//! Dropped records are counted and reported as a `log_miss` record on the
//! application stream.

pub mod error;
pub mod facade;
pub mod level;
pub mod record;
pub mod sentinel;
pub mod stream;
pub mod trace;
pub mod writer;

// Re-export public types
pub use error::LogError;
pub use facade::{Logger, ScopedLogger};
pub use level::{Level, Threshold};
pub use record::{FieldValue, Fields, LogRecord};
pub use sentinel::{is_expected_panic, ExpectedPanic, Reported, EXPECTED_PANIC};
pub use stream::{LoggingConfig, LoggingSystem, StreamConfig, StreamHandle, StreamKind};
pub use trace::{trace_id_from, TraceContext, TraceSource};
pub use writer::{AsyncWriter, MissedRoute, WriterConfig, WriterHandle, WriterState, WriterStats};
