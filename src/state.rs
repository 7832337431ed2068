//! Per-chunk download state.
//!
//! A [`Chunk`] is owned by the download task for its whole lifetime. The
//! counters a fetcher updates while streaming live in a shared
//! [`ChunkProgress`] cell so the progress monitor can read them without
//! blocking the writer.
use crate::error::FetchError;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A half-open byte range `[start, end)` of the remote resource.
///
/// `end - 1` is the last byte requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end, "range start {start} past end {end}");
        Self { start, end }
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Value for the HTTP `Range` header, which uses inclusive bounds.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end.saturating_sub(1))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Live counters for one chunk.
///
/// Written only by the chunk's fetcher, read by anyone holding the `Arc`.
#[derive(Debug, Default)]
pub struct ChunkProgress {
    received: AtomicU64,
    complete: AtomicBool,
}

impl ChunkProgress {
    pub(crate) fn add(&self, bytes: u64) {
        self.received.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
}

/// How a chunk fetch ended.
#[derive(Debug)]
pub enum ChunkOutcome {
    /// The stream ended cleanly after delivering the whole range.
    Complete { bytes: u64 },
    /// The stream stopped early; `bytes` is what arrived before it did.
    Failed { bytes: u64, cause: FetchError },
}

impl ChunkOutcome {
    pub fn bytes(&self) -> u64 {
        match self {
            ChunkOutcome::Complete { bytes } | ChunkOutcome::Failed { bytes, .. } => *bytes,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, ChunkOutcome::Complete { .. })
    }
}

/// Data and outcome handed back by a fetcher when it finishes.
#[derive(Debug)]
pub struct FetchedChunk {
    pub data: Vec<u8>,
    pub outcome: ChunkOutcome,
}

/// One partition of the download.
#[derive(Debug)]
pub struct Chunk {
    /// Position of the chunk in assembly order.
    pub index: usize,
    pub range: ByteRange,
    progress: Arc<ChunkProgress>,
    buffer: Vec<u8>,
    outcome: Option<ChunkOutcome>,
}

impl Chunk {
    pub fn new(index: usize, range: ByteRange) -> Self {
        Self {
            index,
            range,
            progress: Arc::new(ChunkProgress::default()),
            buffer: Vec::new(),
            outcome: None,
        }
    }

    /// Handle on the live counters, for the chunk's fetcher.
    pub fn progress(&self) -> Arc<ChunkProgress> {
        Arc::clone(&self.progress)
    }

    pub fn bytes_received(&self) -> u64 {
        self.progress.received()
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }

    /// Bytes fetched for this chunk. Empty until the fetcher has finished.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn outcome(&self) -> Option<&ChunkOutcome> {
        self.outcome.as_ref()
    }

    /// The error that stopped the fetch early, if any.
    pub fn last_error(&self) -> Option<&FetchError> {
        match &self.outcome {
            Some(ChunkOutcome::Failed { cause, .. }) => Some(cause),
            _ => None,
        }
    }

    /// Stores the fetcher's result. Called once, after the fetcher task ends.
    pub(crate) fn finish(&mut self, fetched: FetchedChunk) {
        debug_assert!(self.outcome.is_none(), "chunk {} finished twice", self.index);
        self.buffer = fetched.data;
        self.outcome = Some(fetched.outcome);
    }
}
