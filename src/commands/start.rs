use anyhow::{Context, Result};
use colored::Colorize;
use readbook::{config, logging::{Fields, LoggingSystem}, server};
use std::path::Path;
use tracing::info;

/// Execute the start command
///
/// This will:
/// 1. Load configuration
/// 2. Open the application and access log streams (fatal on failure)
/// 3. Serve until SIGINT/SIGTERM
/// 4. Drain and close both log streams
pub async fn execute(config_path: &Path) -> Result<()> {
    println!("{}", "Starting readbook in foreground mode...".green());

    let cfg = config::load_config_from(config_path)?;

    let logging = LoggingSystem::init(&cfg.logging_config())
        .context("failed to initialize log streams")?;
    let logger = logging.logger();

    let result = server::start_server(cfg, logger.clone()).await;

    if let Err(e) = &result {
        logger.fatal(
            &(),
            "server exited with error",
            Fields::new().with("error", format!("{:#}", e)),
        );
    }

    // Final drain blocks on the flush threads
    tokio::task::spawn_blocking(move || logging.shutdown()).await?;
    info!("Log streams flushed");

    result
}
