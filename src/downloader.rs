//! The download task: probe, partition, concurrent fetch, ordered assembly.
use crate::config::DownloadConfig;
use crate::error::DownloadError;
use crate::observer::ProgressObserver;
use crate::progress::{self, ProgressMonitor};
use crate::state::{ByteRange, Chunk, ChunkOutcome};
use crate::utils;
use crate::worker::ChunkFetcher;
use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of a [`DownloadTask`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Chunks are set up or in flight.
    Pending,
    /// Every chunk fetcher has finished.
    Complete,
    /// Chunks written and the output file closed.
    Assembled,
}

/// A chunk whose fetch did not deliver its whole range.
#[derive(Debug, Clone)]
pub struct TruncatedChunk {
    pub index: usize,
    pub range: ByteRange,
    pub received: u64,
    pub cause: String,
}

/// Result of a finished download.
#[derive(Debug, Clone)]
pub struct DownloadSummary {
    pub total_size: u64,
    pub bytes_written: u64,
    pub elapsed: Duration,
    pub average_speed_kbps: f64,
    pub truncated: Vec<TruncatedChunk>,
}

impl DownloadSummary {
    /// True when every chunk arrived whole.
    pub fn is_clean(&self) -> bool {
        self.truncated.is_empty() && self.bytes_written == self.total_size
    }
}

pub struct DownloadTask {
    config: DownloadConfig,
    client: reqwest::Client,
    total_size: u64,
    chunks: Vec<Chunk>,
    output: Option<File>,
    cancel: CancellationToken,
    state: TaskState,
}

impl DownloadTask {
    /// Probes the resource size, partitions it and creates the output file.
    ///
    /// Any failure here is fatal: no chunk fetch is started.
    pub async fn setup(config: DownloadConfig) -> Result<Self, DownloadError> {
        let client = config.http_client()?;
        let total_size = utils::probe_size(&client, &config.url, config.probe_timeout).await?;
        info!(url = %config.url, total_size, "resource size discovered");
        Self::with_size(config, client, total_size).await
    }

    /// Builds a task for a resource whose size is already known.
    ///
    /// Creates (or truncates) the output file.
    pub async fn with_size(
        config: DownloadConfig,
        client: reqwest::Client,
        total_size: u64,
    ) -> Result<Self, DownloadError> {
        let chunks: Vec<Chunk> = utils::partition(total_size, config.chunks)?
            .into_iter()
            .enumerate()
            .map(|(index, range)| Chunk::new(index, range))
            .collect();
        debug!(requested = config.chunks, realized = chunks.len(), "partitioned download");

        let output = File::create(&config.output)
            .await
            .map_err(|source| DownloadError::CreateOutput {
                path: config.output.clone(),
                source,
            })?;

        Ok(Self {
            config,
            client,
            total_size,
            chunks,
            output: Some(output),
            cancel: CancellationToken::new(),
            state: TaskState::Pending,
        })
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// True once every chunk reports completion.
    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(Chunk::is_complete)
    }

    /// Token that stops all in-flight chunk fetches when cancelled.
    ///
    /// Cancelled chunks keep what they received; the task still assembles.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetches every chunk concurrently, then writes them out in order.
    ///
    /// Progress is sampled every `poll_interval` while chunks are in flight.
    /// Chunks that stop early are written as far as they got and listed in
    /// the returned summary.
    pub async fn run(
        &mut self,
        observer: &dyn ProgressObserver,
    ) -> Result<DownloadSummary, DownloadError> {
        if self.state != TaskState::Pending {
            return Err(DownloadError::AlreadyRun);
        }

        let started = Instant::now();
        let fetcher = Arc::new(
            ChunkFetcher::new(self.client.clone(), self.config.url.clone(), self.config.read_size)
                .with_timeout(self.config.chunk_timeout)
                .with_cancellation(self.cancel.clone()),
        );

        let mut in_flight = FuturesUnordered::new();
        for chunk in &self.chunks {
            observer.on_launch(chunk.index, chunk.range);
            let fetcher = Arc::clone(&fetcher);
            let range = chunk.range;
            let progress = chunk.progress();
            let index = chunk.index;
            let handle = tokio::spawn(async move { fetcher.fetch(range, progress).await });
            in_flight.push(async move { (index, handle.await) });
        }

        let mut monitor = ProgressMonitor::new(self.total_size, started);
        let poll = self.config.poll_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + poll, poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Chunks are reported in completion order, stored by index.
        loop {
            tokio::select! {
                next = in_flight.next() => {
                    let Some((index, result)) = next else { break };
                    let fetched = result.map_err(|source| DownloadError::Join { index, source })?;
                    observer.on_chunk_finished(index, &fetched.outcome);
                    self.chunks[index].finish(fetched);
                }
                _ = ticker.tick() => observer.on_progress(&monitor.sample(&self.chunks)),
            }
        }
        self.state = TaskState::Complete;
        observer.on_progress(&monitor.sample(&self.chunks));

        let bytes_written = match self.output.take() {
            Some(mut file) => {
                let written = assemble(&mut file, &self.chunks).await?;
                file.shutdown().await.map_err(DownloadError::Write)?;
                written
            }
            None => 0,
        };
        self.state = TaskState::Assembled;

        let elapsed = started.elapsed();
        let summary = DownloadSummary {
            total_size: self.total_size,
            bytes_written,
            elapsed,
            average_speed_kbps: progress::speed_kbps(bytes_written, elapsed),
            truncated: self.truncated_chunks(),
        };

        if summary.is_clean() {
            info!(bytes = bytes_written, ?elapsed, "download assembled");
        } else {
            warn!(
                bytes = bytes_written,
                expected = self.total_size,
                truncated = summary.truncated.len(),
                "download assembled with incomplete chunks"
            );
        }
        observer.on_finished(&summary);
        Ok(summary)
    }

    fn truncated_chunks(&self) -> Vec<TruncatedChunk> {
        self.chunks
            .iter()
            .filter_map(|chunk| match chunk.outcome() {
                Some(ChunkOutcome::Failed { bytes, cause }) => Some(TruncatedChunk {
                    index: chunk.index,
                    range: chunk.range,
                    received: *bytes,
                    cause: cause.to_string(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// Writes chunk buffers to `out` in sequence order, one write per chunk.
///
/// Returns the number of bytes written.
pub async fn assemble<W>(out: &mut W, chunks: &[Chunk]) -> Result<u64, DownloadError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    for chunk in chunks {
        out.write_all(chunk.buffer())
            .await
            .map_err(DownloadError::Write)?;
        written += chunk.buffer().len() as u64;
    }
    out.flush().await.map_err(DownloadError::Write)?;
    Ok(written)
}
