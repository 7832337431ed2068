//! Error types for the download engine.
//!
//! Setup and assembly failures are fatal and surface as [`DownloadError`].
//! Failures while streaming a single chunk never abort the task; they are
//! carried inside the chunk's outcome as a [`FetchError`].
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Invalid download configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),
    #[error("chunk count must be at least 1, got {0}")]
    InvalidChunkCount(i64),
    #[error("read size must be greater than zero")]
    ZeroReadSize,
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Fatal errors that stop a download before or after the fetch phase.
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("size probe failed: {0}")]
    Probe(#[source] reqwest::Error),
    #[error("size probe returned status {0}")]
    ProbeStatus(StatusCode),
    #[error("Content-Length not found in response header")]
    MissingContentLength,
    #[error("Content-Length header is not a valid size: {0}")]
    InvalidContentLength(String),
    #[error("failed to create output file {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write output file: {0}")]
    Write(#[source] std::io::Error),
    #[error("download task has already run")]
    AlreadyRun,
    #[error("chunk {index} task did not finish: {source}")]
    Join {
        index: usize,
        #[source]
        source: tokio::task::JoinError,
    },
}

/// Why a chunk stopped before receiving its full range.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned status {0}")]
    Status(StatusCode),
    #[error("server ignored the Range header and sent the whole resource")]
    RangeIgnored,
    #[error("stream ended after {received} of {expected} bytes")]
    ShortBody { expected: u64, received: u64 },
    #[error("chunk timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("cancelled")]
    Cancelled,
}
