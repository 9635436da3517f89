use crate::error::{Result, StreamError};
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sync HTTP client for Range requests
pub trait SyncHttpRangeClient {
    /// Send a GET range request
    fn get_range(&self, url: &str, range: &str) -> Result<Bytes>;
    /// Send a HEAD request and return response header value
    fn head_response_header(&self, url: &str, header: &str) -> Result<Option<String>>;
}

/// Byte range fetcher on top of a [`SyncHttpRangeClient`] (https://developer.mozilla.org/en-US/docs/Web/HTTP/Range_requests)
///
/// Shared by every stream of a [`StreamCache`](crate::StreamCache), so it only keeps atomic counters.
#[derive(Debug)]
pub struct RangeFetcher<T: SyncHttpRangeClient> {
    client: T,
    requests_ever_made: AtomicUsize,
    bytes_ever_requested: AtomicUsize,
}

impl<T: SyncHttpRangeClient> RangeFetcher<T> {
    pub fn new(client: T) -> Self {
        RangeFetcher {
            client,
            requests_ever_made: AtomicUsize::new(0),
            bytes_ever_requested: AtomicUsize::new(0),
        }
    }

    /// Total length of the resource, from the `Content-Length` of a HEAD response.
    pub fn head_length(&self, url: &str) -> Result<u64> {
        let value = self.client.head_response_header(url, "content-length")?;
        let length = value
            .as_deref()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .ok_or_else(|| StreamError::InvalidContentLength(url.to_string()))?;
        debug!("HEAD {}: content-length {}", url, length);
        Ok(length)
    }

    /// Get the bytes `[begin, end)`.
    ///
    /// The response must contain exactly `end - begin` bytes.
    pub fn get_range(&self, url: &str, begin: u64, end: u64) -> Result<Bytes> {
        if end <= begin {
            return Ok(Bytes::new());
        }
        let length = (end - begin) as usize;
        let requests = self.requests_ever_made.fetch_add(1, Ordering::Relaxed) + 1;
        let bytes_ever = self.bytes_ever_requested.fetch_add(length, Ordering::Relaxed) + length;
        let range = format!("bytes={}-{}", begin, end - 1);
        debug!(
            "request: #{}, bytes: (this_request: {}, ever: {}), Range: {}",
            requests, length, bytes_ever, range
        );
        let bytes = self.client.get_range(url, &range)?;
        if bytes.len() != length {
            return Err(StreamError::UnexpectedLength {
                expected: length,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    /// Number of range requests sent so far.
    pub fn requests_made(&self) -> usize {
        self.requests_ever_made.load(Ordering::Relaxed)
    }

    /// Number of bytes requested so far.
    pub fn bytes_requested(&self) -> usize {
        self.bytes_ever_requested.load(Ordering::Relaxed)
    }

    pub fn client(&self) -> &T {
        &self.client
    }
}
