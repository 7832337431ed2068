//! # chunked_downloader
//!
//! A parallel, chunked HTTP downloader. A download:
//! - learns the resource size with a HEAD request,
//! - splits `[0, size)` into contiguous byte ranges,
//! - fetches every range concurrently with ranged GET requests,
//! - reports aggregate progress and throughput while chunks are in flight,
//! - writes the chunks to the output file in their original order.
//!
//! ## Example Usage
//!
//! ```no_run
//! use chunked_downloader::{ConsoleObserver, DownloadConfig, DownloadTask};
//!
//! # async fn demo() -> Result<(), chunked_downloader::DownloadError> {
//! let config = DownloadConfig::new("https://example.com/archive.zip", 5, None)?;
//! let mut task = DownloadTask::setup(config).await?;
//! let summary = task.run(&ConsoleObserver).await?;
//! assert!(summary.is_clean());
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod config;
pub mod downloader;
pub mod error;
pub mod observer;
pub mod progress;
pub mod state;
pub mod utils;
pub mod worker;

pub use args::Args;
pub use config::DownloadConfig;
pub use downloader::{DownloadSummary, DownloadTask, TaskState};
pub use error::{ConfigError, DownloadError, FetchError};
pub use observer::{BarObserver, ConsoleObserver, ProgressObserver};
pub use state::{ByteRange, Chunk, ChunkOutcome};
pub use worker::ChunkFetcher;
