use crate::logging::writer::MAX_CAPACITY;
use crate::logging::{LoggingConfig, StreamConfig, Threshold, WriterConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppLogConfig,
    pub access: AccessLogConfig,
    #[serde(default)]
    pub logging: LoggingTuning,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

/// Application log stream
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppLogConfig {
    pub log_path: PathBuf,
    #[serde(default = "default_level")]
    pub level: String,
}

/// Access log stream
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccessLogConfig {
    pub file_path: PathBuf,
    /// Only the disabling values (`NO`, `DISCARD`, ...) have an effect
    #[serde(default = "default_level")]
    pub level: String,
}

/// Buffer sizing shared by both streams
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingTuning {
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for LoggingTuning {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

fn default_read_timeout() -> u64 {
    60
}

fn default_max_body_bytes() -> usize {
    1 << 20
}

fn default_level() -> String {
    "info".to_string()
}

fn default_buffer_capacity() -> usize {
    crate::logging::writer::DEFAULT_CAPACITY
}

fn default_flush_interval_ms() -> u64 {
    crate::logging::writer::DEFAULT_FLUSH_INTERVAL.as_millis() as u64
}

impl Config {
    /// Resolve the settings the logging streams are built from
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            app: StreamConfig {
                path: self.app.log_path.clone(),
                threshold: Threshold::parse(&self.app.level),
            },
            access: StreamConfig {
                path: self.access.file_path.clone(),
                threshold: Threshold::parse(&self.access.level),
            },
            writer: WriterConfig {
                capacity: self.logging.buffer_capacity,
                flush_interval: Duration::from_millis(self.logging.flush_interval_ms),
            },
        }
    }
}

/// Load `config.toml` (or the given path) with `READBOOK__*` env overrides
pub fn load_config_from(path: &Path) -> anyhow::Result<Config> {
    let config = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .add_source(config::Environment::with_prefix("READBOOK").separator("__"))
        .build()?;

    let cfg: Config = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.app.log_path.as_os_str().is_empty() {
        anyhow::bail!("app.log_path cannot be empty");
    }

    if cfg.access.file_path.as_os_str().is_empty() {
        anyhow::bail!("access.file_path cannot be empty");
    }

    if cfg.app.log_path == cfg.access.file_path {
        anyhow::bail!(
            "app.log_path and access.file_path must differ: {}",
            cfg.app.log_path.display()
        );
    }

    if cfg.logging.buffer_capacity == 0 {
        anyhow::bail!("logging.buffer_capacity must be greater than 0");
    }

    if cfg.logging.buffer_capacity > MAX_CAPACITY {
        anyhow::bail!(
            "logging.buffer_capacity must be at most {}, got {}",
            MAX_CAPACITY,
            cfg.logging.buffer_capacity
        );
    }

    if cfg.logging.flush_interval_ms == 0 {
        anyhow::bail!("logging.flush_interval_ms must be greater than 0");
    }

    Ok(())
}
