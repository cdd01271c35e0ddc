/// Integration tests for the request logging middleware stack
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Extension, Router,
};
use readbook::{
    config::ServerConfig,
    error::AppError,
    handlers::AppState,
    logging::{
        Fields, Logger, LoggingConfig, LoggingSystem, StreamConfig, Threshold, TraceContext,
        WriterConfig,
    },
    middleware::TRACE_ID_HEADER,
    server::{apply_request_layers, create_router},
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestEnv {
    _dir: TempDir,
    app_path: PathBuf,
    access_path: PathBuf,
    system: LoggingSystem,
}

impl TestEnv {
    fn new(app_level: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let app_path = dir.path().join("app.log");
        let access_path = dir.path().join("access.log");
        let system = LoggingSystem::init(&LoggingConfig {
            app: StreamConfig {
                path: app_path.clone(),
                threshold: Threshold::parse(app_level),
            },
            access: StreamConfig {
                path: access_path.clone(),
                threshold: Threshold::parse("info"),
            },
            writer: WriterConfig {
                capacity: 1024,
                flush_interval: Duration::from_secs(3600),
            },
        })
        .unwrap();

        Self {
            _dir: dir,
            app_path,
            access_path,
            system,
        }
    }

    fn logger(&self) -> Logger {
        self.system.logger()
    }

    /// Stop the streams and return (application, access) records
    async fn finish(self) -> (Vec<Value>, Vec<Value>) {
        let TestEnv {
            _dir,
            app_path,
            access_path,
            system,
        } = self;
        tokio::task::spawn_blocking(move || system.shutdown())
            .await
            .unwrap();

        (read_lines(&app_path), read_lines(&access_path))
    }
}

fn read_lines(path: &Path) -> Vec<Value> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

fn server_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        read_timeout_seconds: 1,
        max_body_bytes: 1 << 20,
    }
}

async fn boom() -> &'static str {
    panic!("kaboom")
}

async fn expected(State(logger): State<Logger>, Extension(ctx): Extension<TraceContext>) -> &'static str {
    logger.panic(&ctx, "giving up", Fields::new().with("reason", "test"))
}

async fn reported(
    State(logger): State<Logger>,
    Extension(ctx): Extension<TraceContext>,
) -> Result<&'static str, AppError> {
    Err(logger.abort(&ctx, "db down", Fields::new()).into())
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "too late"
}

async fn failing() -> Result<&'static str, AppError> {
    Err(anyhow::anyhow!("cache miss storm").into())
}

fn failure_router(logger: Logger) -> Router {
    let routes = Router::new()
        .route("/boom", get(boom))
        .route("/expected", get(expected))
        .route("/reported", get(reported))
        .route("/failing", get(failing))
        .route("/slow", get(slow))
        .with_state(logger.clone());
    apply_request_layers(routes, logger, &server_config())
}

async fn call(app: &Router, path: &str, trace_id: Option<&str>) -> axum::response::Response {
    let mut builder = Request::builder().uri(path);
    if let Some(id) = trace_id {
        builder = builder.header(TRACE_ID_HEADER, id);
    }
    app.clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

fn messages(records: &[Value]) -> Vec<&str> {
    records.iter().filter_map(|r| r["message"].as_str()).collect()
}

#[tokio::test]
async fn test_unexpected_panic_is_logged_with_trace_id() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let response = call(&app, "/boom", Some("t-boom")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()[TRACE_ID_HEADER], "t-boom");

    let (app_log, access_log) = env.finish().await;
    assert_eq!(messages(&app_log), vec!["unexpected panic"]);
    assert_eq!(app_log[0]["level"], "error");
    assert_eq!(app_log[0]["trace_id"], "t-boom");
    assert_eq!(app_log[0]["context"]["panic"], "kaboom");
    assert!(app_log[0]["context"]["stacktrace"].is_string());

    assert_eq!(access_log.len(), 1);
    assert_eq!(access_log[0]["status"], 500);
    assert_eq!(access_log[0]["path"], "/boom");
    assert_eq!(access_log[0]["trace_id"], "t-boom");
}

#[tokio::test]
async fn test_expected_panic_is_not_logged_twice() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let response = call(&app, "/expected", Some("t-exp")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (app_log, access_log) = env.finish().await;
    assert_eq!(messages(&app_log), vec!["giving up"]);
    assert_eq!(app_log[0]["level"], "panic");
    assert_eq!(app_log[0]["trace_id"], "t-exp");
    assert_eq!(access_log[0]["status"], 500);
}

#[tokio::test]
async fn test_reported_error_is_not_logged_twice() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let response = call(&app, "/reported", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (app_log, _) = env.finish().await;
    assert_eq!(messages(&app_log), vec!["db down"]);
}

#[tokio::test]
async fn test_unlogged_internal_error_is_logged_at_boundary() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let response = call(&app, "/failing", Some("t-fail")).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let (app_log, _) = env.finish().await;
    assert_eq!(messages(&app_log), vec!["request failed"]);
    assert_eq!(app_log[0]["context"]["error"], "cache miss storm");
    assert_eq!(app_log[0]["context"]["path"], "/failing");
    assert_eq!(app_log[0]["trace_id"], "t-fail");
}

#[tokio::test]
async fn test_generated_trace_id_matches_access_line() {
    let env = TestEnv::new("info");
    let metrics = metrics_exporter_prometheus::PrometheusBuilder::new()
        .build_recorder()
        .handle();
    let app = create_router(
        AppState {
            logger: env.logger(),
            metrics: Arc::new(metrics),
        },
        &server_config(),
    );

    let response = call(&app, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let trace_id = response.headers()[TRACE_ID_HEADER].to_str().unwrap().to_string();
    assert_eq!(trace_id.len(), 32);

    let response = call(&app, "/no/such/route", Some("t-404")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = call(&app, "/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (app_log, access_log) = env.finish().await;
    assert!(app_log.is_empty());

    assert_eq!(access_log.len(), 3);
    assert_eq!(access_log[0]["trace_id"], trace_id.as_str());
    assert_eq!(access_log[0]["method"], "GET");
    assert_eq!(access_log[0]["status"], 200);
    assert!(access_log[0]["latency_ms"].is_number());
    assert_eq!(access_log[1]["trace_id"], "t-404");
    assert_eq!(access_log[1]["status"], 404);
}

#[tokio::test]
async fn test_request_id_header_is_accepted() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let request = Request::builder()
        .uri("/failing")
        .header("x-request-id", "from-proxy")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()[TRACE_ID_HEADER], "from-proxy");

    let (app_log, access_log) = env.finish().await;
    assert_eq!(app_log[0]["trace_id"], "from-proxy");
    assert_eq!(access_log[0]["trace_id"], "from-proxy");
}

#[tokio::test]
async fn test_timed_out_request_still_gets_access_line() {
    let env = TestEnv::new("info");
    let app = failure_router(env.logger());

    let response = call(&app, "/slow", Some("t-slow")).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.headers()[TRACE_ID_HEADER], "t-slow");

    let (app_log, access_log) = env.finish().await;
    assert!(app_log.is_empty());
    assert_eq!(access_log.len(), 1);
    assert_eq!(access_log[0]["status"], 408);
    assert_eq!(access_log[0]["path"], "/slow");
    assert_eq!(access_log[0]["trace_id"], "t-slow");
}
