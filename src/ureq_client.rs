use crate::config::CacheOptions;
use crate::error::{Result, StreamError};
use crate::range_client::SyncHttpRangeClient;
use crate::{ChunkedStream, StreamCache};
use bytes::Bytes;
use std::io::Read;
use std::time::Duration;

/// Upper bound for a range response body.
const MAX_BODY_BYTES: u64 = 10_000_000;

fn read_body<R: Read>(reader: R, limit: u64) -> Result<Bytes> {
    let mut bytes: Vec<u8> = Vec::new();
    reader
        .take(limit)
        .read_to_end(&mut bytes)
        .map_err(|e| StreamError::HttpError(e.to_string()))?;
    Ok(Bytes::from(bytes))
}

impl SyncHttpRangeClient for ureq::Agent {
    fn get_range(&self, url: &str, range: &str) -> Result<Bytes> {
        let response = self.get(url).set("Range", range).call()?;
        if response.status() < 200 || response.status() > 299 {
            return Err(StreamError::HttpStatus(response.status()));
        }
        read_body(response.into_reader(), MAX_BODY_BYTES)
    }

    fn head_response_header(&self, url: &str, header: &str) -> Result<Option<String>> {
        let response = self.head(url).call()?;
        if response.status() < 200 || response.status() > 299 {
            return Err(StreamError::HttpStatus(response.status()));
        }
        Ok(response.header(header).map(str::to_string))
    }
}

/// Chunk cache using a ureq agent.
pub type UreqStreamCache = StreamCache<ureq::Agent>;
/// Stream opened from a [`UreqStreamCache`].
pub type UreqChunkedStream = ChunkedStream<ureq::Agent>;

impl UreqStreamCache {
    pub fn new() -> Result<Self> {
        Self::with_options(CacheOptions::default())
    }

    pub fn with_options(options: CacheOptions) -> Result<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout_read(Duration::from_secs(5))
            .timeout_write(Duration::from_secs(5))
            .build();
        Self::with_client(agent, options)
    }
}

impl From<ureq::Error> for StreamError {
    fn from(error: ureq::Error) -> Self {
        use ureq::Error::*;
        match error {
            Status(status, _resp) => StreamError::HttpStatus(status),
            Transport(e) => StreamError::HttpError(e.to_string()),
        }
    }
}
