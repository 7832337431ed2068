//! Progress reporting hooks for a running download.
//!
//! The download task calls these from its own control loop, never from the
//! chunk fetchers, so implementations need no synchronization of their own
//! beyond being `Send + Sync`.
use crate::downloader::DownloadSummary;
use crate::progress::ProgressSnapshot;
use crate::state::{ByteRange, ChunkOutcome};
use indicatif::{ProgressBar, ProgressStyle};

pub trait ProgressObserver: Send + Sync {
    /// A chunk fetcher has been started.
    fn on_launch(&self, index: usize, range: ByteRange);

    /// Periodic sample while chunks are in flight, plus one final sample.
    fn on_progress(&self, snapshot: &ProgressSnapshot);

    /// A chunk fetcher has returned.
    fn on_chunk_finished(&self, index: usize, outcome: &ChunkOutcome);

    /// The output file has been written and closed.
    fn on_finished(&self, summary: &DownloadSummary);
}

/// Prints plain progress lines to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl ProgressObserver for ConsoleObserver {
    fn on_launch(&self, _index: usize, range: ByteRange) {
        println!("Launching Chunk-{}", range);
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        println!("{}", progress_line(snapshot));
    }

    fn on_chunk_finished(&self, index: usize, outcome: &ChunkOutcome) {
        if let ChunkOutcome::Failed { bytes, cause } = outcome {
            println!("Chunk {} stopped after {} bytes: {}", index, bytes, cause);
        }
    }

    fn on_finished(&self, summary: &DownloadSummary) {
        println!("{}\n", summary_line(summary));
        if !summary.is_clean() {
            println!(
                "Warning: {} chunk(s) incomplete, output is {} of {} bytes",
                summary.truncated.len(),
                summary.bytes_written,
                summary.total_size
            );
        }
    }
}

/// Renders progress with an `indicatif` bar instead of plain lines.
pub struct BarObserver {
    pb: ProgressBar,
}

impl BarObserver {
    pub fn new(total_size: u64) -> Self {
        Self::with_bar(ProgressBar::new(total_size))
    }

    pub fn with_bar(pb: ProgressBar) -> Self {
        if let Ok(style) = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes}",
        ) {
            pb.set_style(style.progress_chars("=>-"));
        }
        Self { pb }
    }
}

impl ProgressObserver for BarObserver {
    fn on_launch(&self, index: usize, range: ByteRange) {
        self.pb
            .println(format!("Launching Chunk-{} [Part {}]", range, index + 1));
    }

    fn on_progress(&self, snapshot: &ProgressSnapshot) {
        self.pb.set_position(snapshot.bytes_now);
        self.pb.set_message(format!("{:.0} KB/s", snapshot.speed_kbps));
    }

    fn on_chunk_finished(&self, index: usize, outcome: &ChunkOutcome) {
        if let ChunkOutcome::Failed { bytes, cause } = outcome {
            self.pb.println(format!(
                "Chunk {} stopped after {} bytes: {}",
                index, bytes, cause
            ));
        }
    }

    fn on_finished(&self, summary: &DownloadSummary) {
        self.pb.finish_with_message(summary_line(summary));
    }
}

pub fn progress_line(snapshot: &ProgressSnapshot) -> String {
    format!(
        "Download Speed: {:.0} KB/s | Downloaded: {} / {} (Total) | Time Elapsed: {} sec",
        snapshot.speed_kbps,
        snapshot.bytes_now,
        snapshot.total_size,
        snapshot.elapsed.as_secs()
    )
}

pub fn summary_line(summary: &DownloadSummary) -> String {
    format!(
        "Download Completed. Average Speed: {:.0} KB/s, Time Elapsed: {}s",
        summary.average_speed_kbps,
        summary.elapsed.as_secs()
    )
}
