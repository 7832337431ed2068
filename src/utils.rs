//! Utility helpers used across the crate.
//!
//! Size discovery over HTTP, byte-range partitioning and output filename
//! derivation.
use crate::error::{ConfigError, DownloadError};
use crate::state::ByteRange;
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_LENGTH;
use sanitize_filename::sanitize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Fallback name when the URL path has no usable final segment.
pub const DEFAULT_FILENAME: &str = "download.bin";

/// Fetches the Content-Length of a resource using a HEAD request.
///
/// # Errors
///
/// Returns an error if:
/// * The network request fails or exceeds `timeout`.
/// * The server returns a non-success status code.
/// * The server does not provide a parseable `Content-Length` header.
pub async fn probe_size(
    client: &reqwest::Client,
    url: &Url,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let response = client
        .head(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(DownloadError::Probe)?;

    if !response.status().is_success() {
        return Err(DownloadError::ProbeStatus(response.status()));
    }

    // Read the header directly: a HEAD body is always empty, so the body
    // size hint would report 0.
    let raw = response
        .headers()
        .get(CONTENT_LENGTH)
        .ok_or(DownloadError::MissingContentLength)?;
    let size = raw
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| {
            DownloadError::InvalidContentLength(String::from_utf8_lossy(raw.as_bytes()).into())
        })?;

    debug!(%url, size, "probed resource size");
    Ok(size)
}

/// Splits `[0, total_size)` into contiguous ranges for `parts` fetchers.
///
/// Every range is `total_size / parts + 1` bytes wide except the last, which
/// is clipped at `total_size`. Because of the extra byte the number of
/// ranges can be smaller than `parts`, never larger. A zero-sized resource
/// yields no ranges.
pub fn partition(total_size: u64, parts: usize) -> Result<Vec<ByteRange>, ConfigError> {
    if parts == 0 {
        return Err(ConfigError::InvalidChunkCount(0));
    }

    let chunk_size = (total_size / parts as u64).saturating_add(1);
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;

    while start < total_size {
        let end = start.saturating_add(chunk_size).min(total_size);
        ranges.push(ByteRange::new(start, end));
        start = end;
    }

    Ok(ranges)
}

/// Derives the output filename from the last segment of a URL path.
///
/// The segment is percent-decoded and sanitized for the local filesystem.
/// Falls back to [`DEFAULT_FILENAME`] when nothing usable remains.
pub fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
        .map(sanitize)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}
