use clap::Parser;

/// A parallel, chunked HTTP file downloader.
///
/// Learns the file size with a HEAD request, splits it into byte ranges and
/// fetches them concurrently with ranged GET requests before writing the
/// chunks out in order.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// URL to download.
    #[arg(short, long)]
    pub url: String,

    /// Number of download threads (segments).
    #[arg(short = 'n', long, default_value_t = 5, allow_negative_numbers = true)]
    pub threads: i64,

    /// Show progress as a bar instead of plain progress lines.
    #[arg(short, long)]
    pub progress: bool,

    /// Output file. Defaults to the last segment of the URL path.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Give up on a chunk after this many seconds. No limit by default.
    #[arg(long)]
    pub chunk_timeout: Option<u64>,

    /// Milliseconds between progress samples.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,
}
