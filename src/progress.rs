//! Aggregate progress sampling across all chunks of a download.
use crate::state::Chunk;
use std::time::{Duration, Instant};

/// One sample of the overall transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Bytes accounted for across all chunks at sample time.
    pub bytes_now: u64,
    pub total_size: u64,
    /// Throughput since the previous sample, in KiB per second.
    pub speed_kbps: f64,
    /// Time since the download started.
    pub elapsed: Duration,
}

/// Samples chunk counters and turns them into [`ProgressSnapshot`]s.
#[derive(Debug)]
pub struct ProgressMonitor {
    total_size: u64,
    started: Instant,
    last_sample: Instant,
    bytes_so_far: u64,
}

impl ProgressMonitor {
    pub fn new(total_size: u64, started: Instant) -> Self {
        Self {
            total_size,
            started,
            last_sample: started,
            bytes_so_far: 0,
        }
    }

    pub fn bytes_so_far(&self) -> u64 {
        self.bytes_so_far
    }

    pub fn sample(&mut self, chunks: &[Chunk]) -> ProgressSnapshot {
        self.sample_at(chunks, Instant::now())
    }

    pub fn sample_at(&mut self, chunks: &[Chunk], now: Instant) -> ProgressSnapshot {
        let bytes_now = bytes_transferred(chunks);
        let interval = now.saturating_duration_since(self.last_sample);
        let speed_kbps = speed_kbps(bytes_now.saturating_sub(self.bytes_so_far), interval);

        self.bytes_so_far = bytes_now;
        self.last_sample = now;

        ProgressSnapshot {
            bytes_now,
            total_size: self.total_size,
            speed_kbps,
            elapsed: now.saturating_duration_since(self.started),
        }
    }
}

/// Sum over chunks: the full width once complete, otherwise bytes received.
pub fn bytes_transferred(chunks: &[Chunk]) -> u64 {
    chunks
        .iter()
        .map(|chunk| {
            if chunk.is_complete() {
                chunk.range.len()
            } else {
                chunk.bytes_received()
            }
        })
        .sum()
}

/// KiB per second for `bytes` moved over `interval`; 0 for an empty interval.
pub fn speed_kbps(bytes: u64, interval: Duration) -> f64 {
    let secs = interval.as_secs_f64();
    if secs > 0.0 {
        bytes as f64 / 1024.0 / secs
    } else {
        0.0
    }
}
