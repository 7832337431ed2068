use crate::error::FetchError;
use crate::state::{ByteRange, ChunkOutcome, ChunkProgress, FetchedChunk};
use reqwest::StatusCode;
use reqwest::header::RANGE;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

/// Fetches byte ranges of one resource into memory.
///
/// Shared by all chunk tasks of a download; each call to [`fetch`] handles
/// exactly one range.
///
/// [`fetch`]: ChunkFetcher::fetch
#[derive(Debug, Clone)]
pub struct ChunkFetcher {
    client: reqwest::Client,
    url: Url,
    read_size: usize,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl ChunkFetcher {
    pub fn new(client: reqwest::Client, url: Url, read_size: usize) -> Self {
        Self {
            client,
            url,
            read_size: read_size.max(1),
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Downloads `range` with a single ranged GET.
    ///
    /// Never fails: whatever arrived before the stream stopped becomes the
    /// chunk's data, and the cause is recorded in the outcome. `progress` is
    /// marked complete on every exit path.
    pub async fn fetch(&self, range: ByteRange, progress: Arc<ChunkProgress>) -> FetchedChunk {
        // Grows as bytes arrive; the declared width comes from the server.
        let cap = usize::try_from(range.len())
            .map_or(self.read_size, |len| len.min(self.read_size));
        let mut data = Vec::with_capacity(cap);

        let result = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.stream_with_timeout(range, &progress, &mut data) => result,
        };

        let bytes = data.len() as u64;
        let outcome = match result {
            Ok(()) if bytes == range.len() => ChunkOutcome::Complete { bytes },
            Ok(()) => ChunkOutcome::Failed {
                bytes,
                cause: FetchError::ShortBody {
                    expected: range.len(),
                    received: bytes,
                },
            },
            Err(cause) => ChunkOutcome::Failed { bytes, cause },
        };

        match &outcome {
            ChunkOutcome::Complete { .. } => debug!(%range, bytes, "chunk finished"),
            ChunkOutcome::Failed { cause, .. } => {
                warn!(%range, bytes, expected = range.len(), error = %cause, "chunk stopped early")
            }
        }

        progress.mark_complete();
        FetchedChunk { data, outcome }
    }

    async fn stream_with_timeout(
        &self,
        range: ByteRange,
        progress: &ChunkProgress,
        data: &mut Vec<u8>,
    ) -> Result<(), FetchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.stream(range, progress, data))
                .await
                .unwrap_or(Err(FetchError::TimedOut(limit))),
            None => self.stream(range, progress, data).await,
        }
    }

    async fn stream(
        &self,
        range: ByteRange,
        progress: &ChunkProgress,
        data: &mut Vec<u8>,
    ) -> Result<(), FetchError> {
        let mut response = self
            .client
            .get(self.url.clone())
            .header(RANGE, range.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }
        // A plain 200 carries the resource from byte 0.
        if status != StatusCode::PARTIAL_CONTENT && range.start != 0 {
            return Err(FetchError::RangeIgnored);
        }

        let width = range.len();
        while let Some(bytes) = response.chunk().await? {
            for piece in bytes.chunks(self.read_size) {
                let room = usize::try_from(width - data.len() as u64).unwrap_or(usize::MAX);
                let take = piece.len().min(room);
                data.extend_from_slice(&piece[..take]);
                progress.add(take as u64);

                if data.len() as u64 == width {
                    if take < piece.len() {
                        debug!(%range, "discarding bytes past the end of the range");
                    }
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &[u8] = b"HelloWorld";

    async fn fetch(server_url: &str, range: ByteRange, read_size: usize) -> (FetchedChunk, u64) {
        let url = Url::parse(server_url).unwrap();
        let fetcher = ChunkFetcher::new(reqwest::Client::new(), url, read_size);
        let progress = Arc::new(ChunkProgress::default());
        let fetched = fetcher.fetch(range, progress.clone()).await;
        assert!(progress.is_complete());
        (fetched, progress.received())
    }

    #[tokio::test]
    async fn test_fetch_sends_range_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Range", "bytes=5-9"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(&BODY[5..]))
            .expect(1)
            .mount(&server)
            .await;

        let (fetched, received) = fetch(&server.uri(), ByteRange::new(5, 10), 2).await;

        assert_eq!(fetched.data, b"World");
        assert_eq!(received, 5);
        assert!(matches!(fetched.outcome, ChunkOutcome::Complete { bytes: 5 }));
    }

    #[tokio::test]
    async fn test_fetch_caps_surplus_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .mount(&server)
            .await;

        // A 200 is acceptable for a range starting at 0; the tail is dropped.
        let (fetched, received) = fetch(&server.uri(), ByteRange::new(0, 5), 32 * 1024).await;

        assert_eq!(fetched.data, b"Hello");
        assert_eq!(received, 5);
        assert!(fetched.outcome.is_complete());
    }

    #[tokio::test]
    async fn test_fetch_rejects_ignored_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(BODY))
            .mount(&server)
            .await;

        let (fetched, received) = fetch(&server.uri(), ByteRange::new(5, 10), 1024).await;

        assert!(fetched.data.is_empty());
        assert_eq!(received, 0);
        assert!(matches!(
            fetched.outcome,
            ChunkOutcome::Failed {
                bytes: 0,
                cause: FetchError::RangeIgnored
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_error_status_is_failed_chunk() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (fetched, _) = fetch(&server.uri(), ByteRange::new(0, 10), 1024).await;
        assert!(matches!(
            fetched.outcome,
            ChunkOutcome::Failed {
                cause: FetchError::Status(s),
                ..
            } if s.as_u16() == 500
        ));
    }

    #[tokio::test]
    async fn test_fetch_keeps_bytes_from_truncated_stream() {
        // Declares 10 bytes, sends 4, then hangs up.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
            socket
                .write_all(b"HTTP/1.1 206 Partial Content\r\nContent-Length: 10\r\n\r\nHell")
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let (fetched, received) =
            fetch(&format!("http://{addr}/file"), ByteRange::new(0, 10), 1024).await;

        assert!(fetched.data.len() < 10);
        assert!(BODY.starts_with(&fetched.data));
        assert_eq!(received, fetched.data.len() as u64);
        assert!(matches!(fetched.outcome, ChunkOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_huge_range_grows_buffer_on_demand() {
        // Claims a terabyte, delivers 4 bytes, hangs up.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = tokio::io::AsyncReadExt::read(&mut socket, &mut buf).await;
            socket
                .write_all(
                    b"HTTP/1.1 206 Partial Content\r\nContent-Length: 1099511627776\r\n\r\nHell",
                )
                .await
                .unwrap();
            socket.flush().await.unwrap();
        });

        let (fetched, received) =
            fetch(&format!("http://{addr}/file"), ByteRange::new(0, 1 << 40), 32 * 1024).await;

        assert!(fetched.data.capacity() <= 32 * 1024);
        assert!(BODY.starts_with(&fetched.data));
        assert_eq!(received, fetched.data.len() as u64);
        assert!(matches!(fetched.outcome, ChunkOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(206)
                    .set_body_bytes(BODY)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let fetcher = ChunkFetcher::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            1024,
        )
        .with_timeout(Some(Duration::from_millis(100)));
        let fetched = fetcher
            .fetch(ByteRange::new(0, 10), Arc::new(ChunkProgress::default()))
            .await;

        assert!(matches!(
            fetched.outcome,
            ChunkOutcome::Failed {
                bytes: 0,
                cause: FetchError::TimedOut(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_stops_on_cancellation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(206).set_delay(Duration::from_secs(30)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let fetcher = ChunkFetcher::new(
            reqwest::Client::new(),
            Url::parse(&server.uri()).unwrap(),
            1024,
        )
        .with_cancellation(cancel.clone());

        let progress = Arc::new(ChunkProgress::default());
        let task = tokio::spawn({
            let progress = progress.clone();
            async move { fetcher.fetch(ByteRange::new(0, 10), progress).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let fetched = task.await.unwrap();
        assert!(progress.is_complete());
        assert!(matches!(
            fetched.outcome,
            ChunkOutcome::Failed {
                cause: FetchError::Cancelled,
                ..
            }
        ));
    }
}
