use anyhow::Result;
use axum::{extract::DefaultBodyLimit, routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::{
    config::{Config, ServerConfig},
    handlers::{self, AppState},
    logging::{Fields, Logger},
    metrics, middleware,
    signals::setup_signal_handlers,
};

/// Start the HTTP server
///
/// This function:
/// 1. Initializes metrics
/// 2. Sets up signal handlers for graceful shutdown
/// 3. Creates the Axum application
/// 4. Serves requests until a shutdown signal arrives
///
/// The caller owns the logging streams and drains them after this returns.
pub async fn start_server(config: Config, logger: Logger) -> Result<()> {
    info!("Initializing Prometheus metrics...");
    let metrics_handle = Arc::new(metrics::init_metrics()?);

    let (shutdown_tx, signal_handle) = setup_signal_handlers();
    let mut shutdown_rx = shutdown_tx.subscribe();

    let state = AppState {
        logger: logger.clone(),
        metrics: metrics_handle,
    };
    let app = create_router(state, &config.server);

    let addr = SocketAddr::from((
        config.server.host.parse::<std::net::IpAddr>()?,
        config.server.port,
    ));

    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Starting readbook on {}", addr);
    logger.info(
        &(),
        "server started",
        Fields::new()
            .with("addr", addr.to_string())
            .with("version", env!("CARGO_PKG_VERSION")),
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
        info!("Shutdown signal received, draining connections...");
    })
    .await?;

    signal_handle.abort();
    logger.info(&(), "server stopped", Fields::new());
    info!("Server stopped gracefully");

    Ok(())
}

/// Create the Axum router with all routes and middleware
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let logger = state.logger.clone();

    let routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/metrics", get(handlers::metrics_handler::metrics))
        .fallback(handlers::not_found)
        .with_state(state);

    apply_request_layers(routes, logger, server)
}

/// Wrap routes with the request logging stack
///
/// Outermost first: HTTP tracing, body limit, trace id, access log, timeout,
/// panic recovery. Timeouts and recovered panics become responses before the
/// access log sees them, so every request gets its access line.
pub fn apply_request_layers(routes: Router, logger: Logger, server: &ServerConfig) -> Router {
    routes
        .layer(CatchPanicLayer::custom(middleware::panic_response(
            logger.clone(),
        )))
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.read_timeout_seconds,
        )))
        .layer(axum::middleware::from_fn_with_state(
            logger,
            middleware::access_log_middleware,
        ))
        .layer(axum::middleware::from_fn(middleware::trace_id_middleware))
        .layer(DefaultBodyLimit::max(server.max_body_bytes))
        .layer(TraceLayer::new_for_http())
}
