//! Validated settings for a single download.
use crate::args::Args;
use crate::error::ConfigError;
use crate::utils;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Timeout applied to the HEAD request that discovers the file size.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);
/// Largest slice appended to a chunk buffer per progress update.
pub const READ_SIZE: usize = 32 * 1024;
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_CHUNKS: usize = 5;

const USER_AGENT: &str = concat!("chunked-downloader/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub url: Url,
    /// Requested number of chunks; the partition may produce fewer.
    pub chunks: usize,
    pub output: PathBuf,
    pub probe_timeout: Duration,
    pub read_size: usize,
    /// Per-chunk limit. `None` lets a stalled chunk block indefinitely.
    pub chunk_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl DownloadConfig {
    /// Builds a configuration with default timings.
    ///
    /// When `output` is `None` the file is named after the URL's last path
    /// segment.
    pub fn new(url: &str, chunks: i64, output: Option<PathBuf>) -> Result<Self, ConfigError> {
        let url = parse_url(url)?;
        let chunks = match usize::try_from(chunks) {
            Ok(n) if n > 0 => n,
            _ => return Err(ConfigError::InvalidChunkCount(chunks)),
        };
        let output = output.unwrap_or_else(|| PathBuf::from(utils::filename_from_url(&url)));

        Ok(Self {
            url,
            chunks,
            output,
            probe_timeout: PROBE_TIMEOUT,
            read_size: READ_SIZE,
            chunk_timeout: None,
            poll_interval: POLL_INTERVAL,
        })
    }

    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        Self::new(&args.url, args.threads, args.output.as_ref().map(PathBuf::from))?
            .with_chunk_timeout(args.chunk_timeout.map(Duration::from_secs))
            .with_poll_interval(Duration::from_millis(args.poll_interval_ms))
    }

    pub fn with_chunk_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.poll_interval = interval;
        Ok(self)
    }

    pub fn with_read_size(mut self, read_size: usize) -> Result<Self, ConfigError> {
        if read_size == 0 {
            return Err(ConfigError::ZeroReadSize);
        }
        self.read_size = read_size;
        Ok(self)
    }

    /// HTTP client shared by the probe and every chunk fetcher.
    ///
    /// Carries no overall request timeout; the probe sets its own per request.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(ConfigError::Client)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
