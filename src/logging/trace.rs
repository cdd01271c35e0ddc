//! Trace id propagation
//!
//! The request layer attaches a [`TraceContext`] to each request; the logger
//! only ever reads it back to stamp records.

use axum::http::{request::Parts, Extensions};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

tokio::task_local! {
    static CURRENT: TraceContext;
}

/// Trace id written when a context carries none
pub const DEFAULT_TRACE_ID: &str = "";

/// Correlation id for one logical request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    trace_id: Option<Arc<str>>,
}

impl TraceContext {
    pub fn new(trace_id: impl Into<Arc<str>>) -> Self {
        let trace_id: Arc<str> = trace_id.into();
        if trace_id.is_empty() {
            return Self::default();
        }
        Self {
            trace_id: Some(trace_id),
        }
    }

    /// Fresh context with a random id (hyphen-less UUID v4)
    pub fn generate() -> Self {
        Self::new(Uuid::new_v4().simple().to_string())
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Run `fut` with this context as the task's current trace
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT.scope(self, fut).await
    }

    /// Context of the enclosing [`TraceContext::scope`], if any
    pub fn current() -> Option<TraceContext> {
        CURRENT.try_with(Clone::clone).ok()
    }
}

/// Anything a trace id can be read from
pub trait TraceSource {
    fn trace_id(&self) -> Option<&str>;
}

impl TraceSource for TraceContext {
    fn trace_id(&self) -> Option<&str> {
        TraceContext::trace_id(self)
    }
}

impl TraceSource for Extensions {
    fn trace_id(&self) -> Option<&str> {
        self.get::<TraceContext>().and_then(TraceContext::trace_id)
    }
}

impl TraceSource for Parts {
    fn trace_id(&self) -> Option<&str> {
        self.extensions.trace_id()
    }
}

/// No request in scope (startup, background tasks)
impl TraceSource for () {
    fn trace_id(&self) -> Option<&str> {
        None
    }
}

impl<T: TraceSource> TraceSource for Option<T> {
    fn trace_id(&self) -> Option<&str> {
        self.as_ref().and_then(TraceSource::trace_id)
    }
}

impl<T: TraceSource + ?Sized> TraceSource for &T {
    fn trace_id(&self) -> Option<&str> {
        (**self).trace_id()
    }
}

/// Read the trace id carried by `ctx`, or [`DEFAULT_TRACE_ID`]
pub fn trace_id_from<C: TraceSource + ?Sized>(ctx: &C) -> String {
    ctx.trace_id().unwrap_or(DEFAULT_TRACE_ID).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_context_same_trace_id() {
        let ctx = TraceContext::new("abc123");
        let copy = ctx.clone();

        assert_eq!(trace_id_from(&ctx), "abc123");
        assert_eq!(trace_id_from(&ctx), trace_id_from(&copy));
    }

    #[test]
    fn test_missing_context_yields_default() {
        assert_eq!(trace_id_from(&()), DEFAULT_TRACE_ID);
        assert_eq!(trace_id_from(&TraceContext::default()), DEFAULT_TRACE_ID);
        assert_eq!(trace_id_from(&None::<TraceContext>), DEFAULT_TRACE_ID);
        assert_eq!(trace_id_from(&TraceContext::new("")), DEFAULT_TRACE_ID);
    }

    #[test]
    fn test_lookup_through_extensions() {
        let mut extensions = Extensions::new();
        assert_eq!(trace_id_from(&extensions), DEFAULT_TRACE_ID);

        extensions.insert(TraceContext::new("req-9"));
        assert_eq!(trace_id_from(&extensions), "req-9");
    }

    #[tokio::test]
    async fn test_current_inside_scope() {
        assert!(TraceContext::current().is_none());

        let seen = TraceContext::new("scoped-1")
            .scope(async { trace_id_from(&TraceContext::current()) })
            .await;

        assert_eq!(seen, "scoped-1");
        assert!(TraceContext::current().is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = TraceContext::generate();
        let b = TraceContext::generate();

        assert_eq!(a.trace_id().unwrap().len(), 32);
        assert_ne!(a, b);
    }
}
