use crate::error::{Result, StreamError};
use crate::range_client::SyncHttpRangeClient;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;

/// Serves a byte vector like a range capable HTTP server and records every `Range` header.
#[derive(Clone, Debug)]
pub(crate) struct MemoryClient {
    data: Bytes,
    report_length: bool,
    honor_range: bool,
    status: Option<u16>,
    fail_from: Option<u64>,
    last_modified: Option<String>,
    ranges: Arc<Mutex<Vec<String>>>,
}

impl MemoryClient {
    pub(crate) fn with_len(len: usize) -> Self {
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        MemoryClient {
            data: Bytes::from(data),
            report_length: true,
            honor_range: true,
            status: None,
            fail_from: None,
            last_modified: None,
            ranges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn without_length(self) -> Self {
        MemoryClient {
            report_length: false,
            ..self
        }
    }

    pub(crate) fn ignoring_range(self) -> Self {
        MemoryClient {
            honor_range: false,
            ..self
        }
    }

    pub(crate) fn failing_with(self, status: u16) -> Self {
        MemoryClient {
            status: Some(status),
            ..self
        }
    }

    /// Range requests starting at or after `offset` fail with a 503.
    pub(crate) fn failing_from(self, offset: u64) -> Self {
        MemoryClient {
            fail_from: Some(offset),
            ..self
        }
    }

    pub(crate) fn last_modified(self, time: SystemTime) -> Self {
        MemoryClient {
            last_modified: Some(httpdate::fmt_http_date(time)),
            ..self
        }
    }

    pub(crate) fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn ranges(&self) -> Vec<String> {
        self.ranges.lock().clone()
    }
}

fn parse_range(range: &str) -> Option<(u64, u64)> {
    let (begin, end) = range.strip_prefix("bytes=")?.split_once('-')?;
    Some((begin.parse().ok()?, end.parse().ok()?))
}

impl SyncHttpRangeClient for MemoryClient {
    fn get_range(&self, _url: &str, range: &str) -> Result<Bytes> {
        self.ranges.lock().push(range.to_string());
        if let Some(status) = self.status {
            return Err(StreamError::HttpStatus(status));
        }
        if !self.honor_range {
            return Ok(self.data.clone());
        }
        let (begin, end) =
            parse_range(range).ok_or_else(|| StreamError::HttpError(range.to_string()))?;
        if self.fail_from.map_or(false, |offset| begin >= offset) {
            return Err(StreamError::HttpStatus(503));
        }
        if begin >= self.data.len() as u64 {
            return Err(StreamError::HttpStatus(416));
        }
        let end = end.min(self.data.len() as u64 - 1);
        Ok(self.data.slice(begin as usize..=end as usize))
    }

    fn head_response_header(&self, _url: &str, header: &str) -> Result<Option<String>> {
        if let Some(status) = self.status {
            return Err(StreamError::HttpStatus(status));
        }
        if header.eq_ignore_ascii_case("content-length") && self.report_length {
            Ok(Some(self.data.len().to_string()))
        } else if header.eq_ignore_ascii_case("last-modified") {
            Ok(self.last_modified.clone())
        } else {
            Ok(None)
        }
    }
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
