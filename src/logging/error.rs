use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring up a log stream. Fatal at startup.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("create log dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("start {stream} log writer: {source}")]
    SpawnConsumer {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
}
