//! Application and access log streams
//!
//! Each stream owns one sink and one [`AsyncWriter`]. Streams are built once
//! at startup by [`LoggingSystem::init`] and stopped by
//! [`LoggingSystem::shutdown`].

use super::error::LogError;
use super::facade::Logger;
use super::level::{Level, Threshold};
use super::record::LogRecord;
use super::writer::{AsyncWriter, MissedRoute, WriterConfig, WriterHandle, WriterStats};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Application,
    Access,
}

impl StreamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Access => "access",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved settings for one stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub path: PathBuf,
    pub threshold: Threshold,
}

/// Resolved settings for both streams
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub app: StreamConfig,
    pub access: StreamConfig,
    pub writer: WriterConfig,
}

/// Producer-side view of a stream, held by [`Logger`]
#[derive(Clone)]
pub struct StreamHandle {
    kind: StreamKind,
    threshold: Threshold,
    writer: WriterHandle,
}

impl StreamHandle {
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    #[inline]
    pub fn allows(&self, level: Level) -> bool {
        self.threshold.allows(level)
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.threshold.is_disabled()
    }

    pub fn is_accepting(&self) -> bool {
        self.writer.is_accepting()
    }

    /// Encode and enqueue a record, ignoring the threshold
    pub fn write(&self, record: &LogRecord) {
        if self.is_disabled() {
            return;
        }
        match record.encode() {
            Ok(line) => self.writer.enqueue(line),
            Err(e) => {
                tracing::warn!(stream = %self.kind, error = %e, "Failed to encode log record");
            }
        }
    }

    pub fn stats(&self) -> WriterStats {
        self.writer.stats()
    }
}

/// One configured log destination
pub struct Stream {
    kind: StreamKind,
    path: Option<PathBuf>,
    threshold: Threshold,
    writer: AsyncWriter,
}

impl Stream {
    fn spawn<W>(
        kind: StreamKind,
        path: Option<PathBuf>,
        threshold: Threshold,
        sink: W,
        config: WriterConfig,
        route: MissedRoute,
    ) -> Result<Self, LogError>
    where
        W: Write + Send + 'static,
    {
        let writer = AsyncWriter::spawn(kind.as_str(), sink, config, route).map_err(|source| {
            LogError::SpawnConsumer {
                stream: kind.as_str(),
                source,
            }
        })?;

        Ok(Self {
            kind,
            path,
            threshold,
            writer,
        })
    }

    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn writer(&self) -> &AsyncWriter {
        &self.writer
    }

    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            kind: self.kind,
            threshold: self.threshold,
            writer: self.writer.handle().clone(),
        }
    }
}

/// Owner of the application and access streams
///
/// Construct once after configuration is loaded and hand out [`Logger`]
/// clones to request handlers.
pub struct LoggingSystem {
    app: Stream,
    access: Stream,
    logger: Logger,
}

impl LoggingSystem {
    /// Create log directories, open both sink files and start their writers.
    ///
    /// Both files are opened before any writer starts, so a failure leaves
    /// nothing running.
    pub fn init(config: &LoggingConfig) -> Result<Self, LogError> {
        let app_file = open_sink(&config.app.path)?;
        let access_file = open_sink(&config.access.path)?;

        let system = Self::build(
            (Some(config.app.path.clone()), config.app.threshold, app_file),
            (Some(config.access.path.clone()), config.access.threshold, access_file),
            config.writer,
        )?;

        info!(
            app_log = %config.app.path.display(),
            app_level = %config.app.threshold,
            access_log = %config.access.path.display(),
            access_level = %config.access.threshold,
            capacity = config.writer.capacity,
            flush_interval_ms = config.writer.flush_interval.as_millis() as u64,
            "Logging streams initialized"
        );

        Ok(system)
    }

    /// Build streams over arbitrary sinks (in-memory buffers in tests)
    pub fn with_sinks<A, B>(
        app: (Threshold, A),
        access: (Threshold, B),
        writer: WriterConfig,
    ) -> Result<Self, LogError>
    where
        A: Write + Send + 'static,
        B: Write + Send + 'static,
    {
        Self::build((None, app.0, app.1), (None, access.0, access.1), writer)
    }

    fn build<A, B>(
        app: (Option<PathBuf>, Threshold, A),
        access: (Option<PathBuf>, Threshold, B),
        writer: WriterConfig,
    ) -> Result<Self, LogError>
    where
        A: Write + Send + 'static,
        B: Write + Send + 'static,
    {
        let (app_path, app_threshold, app_sink) = app;
        let (access_path, access_threshold, access_sink) = access;

        let app_route = if app_threshold.is_disabled() {
            MissedRoute::Discard
        } else {
            MissedRoute::Inline
        };
        let app = Stream::spawn(
            StreamKind::Application,
            app_path,
            app_threshold,
            app_sink,
            writer,
            app_route,
        )?;

        // Access drops are reported on the application stream, never on itself
        let access_route = if app_threshold.is_disabled() {
            MissedRoute::Discard
        } else {
            MissedRoute::Forward(app.writer.handle().clone())
        };
        let access = Stream::spawn(
            StreamKind::Access,
            access_path,
            access_threshold.access_mode(),
            access_sink,
            writer,
            access_route,
        )?;

        let logger = Logger::new(app.handle(), access.handle());

        Ok(Self {
            app,
            access,
            logger,
        })
    }

    pub fn logger(&self) -> Logger {
        self.logger.clone()
    }

    pub fn stream(&self, kind: StreamKind) -> &Stream {
        match kind {
            StreamKind::Application => &self.app,
            StreamKind::Access => &self.access,
        }
    }

    /// Drain and stop both streams.
    ///
    /// Access stops first so its final miss report can still reach the
    /// application stream.
    pub fn shutdown(self) {
        self.stop_streams();

        let app = self.app.writer.stats();
        let access = self.access.writer.stats();
        info!(
            app_flushed = app.flushed,
            app_dropped = app.dropped,
            access_flushed = access.flushed,
            access_dropped = access.dropped,
            "Logging streams stopped"
        );
    }

    fn stop_streams(&self) {
        self.access.writer.stop();
        self.app.writer.stop();
    }
}

/// Dropping without `shutdown` (early return, unwinding) still drains in order
impl Drop for LoggingSystem {
    fn drop(&mut self) {
        self.stop_streams();
    }
}

impl Threshold {
    /// Access lines are unfiltered: the only meaningful setting is off
    fn access_mode(self) -> Self {
        match self {
            Self::Disabled => Self::Disabled,
            Self::Min(_) => Self::Min(Level::Debug),
        }
    }
}

fn open_sink(path: &Path) -> Result<File, LogError> {
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|source| LogError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::OpenFile {
            path: path.to_path_buf(),
            source,
        })
}
