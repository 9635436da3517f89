use crate::config::CacheOptions;
use crate::error::{Result, StreamError};
use crate::range_client::SyncHttpRangeClient;
use crate::{ChunkedStream, StreamCache};
use bytes::Bytes;
use reqwest::blocking::Client;

impl SyncHttpRangeClient for Client {
    fn get_range(&self, url: &str, range: &str) -> Result<Bytes> {
        let response = self
            .get(url)
            .header("Range", range)
            .send()
            .map_err(|e| StreamError::HttpError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StreamError::HttpStatus(response.status().as_u16()));
        }
        response
            .bytes()
            .map_err(|e| StreamError::HttpError(e.to_string()))
    }

    fn head_response_header(&self, url: &str, header: &str) -> Result<Option<String>> {
        let response = self
            .head(url)
            .send()
            .map_err(|e| StreamError::HttpError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(StreamError::HttpStatus(response.status().as_u16()));
        }
        Ok(response
            .headers()
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string))
    }
}

/// Chunk cache using a blocking reqwest client.
pub type HttpStreamCache = StreamCache<Client>;
/// Stream opened from a [`HttpStreamCache`].
pub type HttpChunkedStream = ChunkedStream<Client>;

impl HttpStreamCache {
    pub fn new() -> Result<Self> {
        Self::with_options(CacheOptions::default())
    }

    pub fn with_options(options: CacheOptions) -> Result<Self> {
        Self::with_client(Client::new(), options)
    }
}
