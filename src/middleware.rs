//! Request-scoped logging middleware
//!
//! Layer order, outermost first:
//! 1. [`trace_id_middleware`] attaches a [`TraceContext`]
//! 2. [`access_log_middleware`] writes the access line and logs unreported errors
//! 3. `TimeoutLayer` turns slow requests into 408s
//! 4. [`panic_response`] (via `CatchPanicLayer`) turns panics into 500s

use crate::{
    error::{AppError, UnloggedError},
    logging::{
        is_expected_panic, record::STACKTRACE_KEY, sentinel::panic_message, Fields, Logger,
        TraceContext,
    },
    metrics,
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::backtrace::Backtrace;
use std::net::SocketAddr;
use std::time::Instant;

/// Header carrying the correlation id in and out
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Fallback inbound header set by proxies
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_TRACE_ID_LEN: usize = 128;

/// Attach a trace context to the request and echo it in the response
pub async fn trace_id_middleware(mut req: Request, next: Next) -> Response {
    let ctx = req
        .headers()
        .get(TRACE_ID_HEADER)
        .or_else(|| req.headers().get(REQUEST_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_TRACE_ID_LEN)
        .map(TraceContext::new)
        .unwrap_or_else(TraceContext::generate);

    req.extensions_mut().insert(ctx.clone());

    let trace_id = ctx.trace_id().and_then(|id| HeaderValue::from_str(id).ok());
    let mut response = ctx.scope(next.run(req)).await;

    if let Some(value) = trace_id {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

/// Write one access line per request
///
/// Also the boundary for errors: an [`AppError::InternalError`] that reached
/// the response unlogged is written to the application stream here.
/// Already-reported failures pass through silently.
pub async fn access_log_middleware(
    State(logger): State<Logger>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let ctx = req
        .extensions()
        .get::<TraceContext>()
        .cloned()
        .unwrap_or_default();
    let client_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    if let Some(UnloggedError(message)) = response.extensions().get::<UnloggedError>() {
        logger.error(
            &ctx,
            "request failed",
            Fields::new()
                .with("method", method.as_str())
                .with("path", path.as_str())
                .with("status", status)
                .with_error("error", message.as_str()),
        );
    }

    let mut fields = Fields::new()
        .with("method", method.as_str())
        .with("path", path)
        .with("status", status)
        .with("latency_ms", latency_ms);
    if let Some(ip) = client_ip {
        fields.insert("client_ip", ip);
    }
    logger.access(&ctx, fields);

    metrics::record_request(&method, status);

    response
}

/// Build the `CatchPanicLayer` handler
///
/// Expected panics were logged by `Logger::panic` and only get a generic 500.
/// Anything else is logged at error level with a stack trace first.
pub fn panic_response(logger: Logger) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone {
    move |payload: Box<dyn Any + Send + 'static>| {
        if !is_expected_panic(payload.as_ref()) {
            let ctx = TraceContext::current();
            logger.error(
                &ctx,
                "unexpected panic",
                Fields::new()
                    .with("panic", panic_message(payload.as_ref()))
                    .with(STACKTRACE_KEY, Backtrace::force_capture().to_string()),
            );
        }

        AppError::Reported(crate::logging::Reported::new("handler panicked")).into_response()
    }
}
