use crate::chunk_cache::ChunkKey;
use crate::config::validate_chunk_size;
use crate::error::{Result, StreamError};
use crate::range_client::SyncHttpRangeClient;
use crate::registry::InstanceId;
use crate::stream_cache::Shared;
use bytes::Bytes;
use std::cmp::min;
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;
use std::time::Instant;

/// Index of the chunk containing `pos`.
pub fn chunk_index(pos: u64, chunk_size: usize) -> u64 {
    pos / chunk_size as u64
}

/// Chunk boundary at or before `pos`.
pub fn aligned_start(pos: u64, chunk_size: usize) -> u64 {
    chunk_index(pos, chunk_size) * chunk_size as u64
}

/// Part of a read served by a single chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ChunkSpan {
    /// Aligned start of the chunk
    pub start: u64,
    /// Offset of the first requested byte within the chunk
    pub offset: usize,
    pub len: usize,
}

/// Splits `[position, position + count)` at chunk boundaries.
#[derive(Debug)]
pub(crate) struct ChunkSpans {
    position: u64,
    remaining: usize,
    chunk_size: usize,
}

impl ChunkSpans {
    pub(crate) fn new(position: u64, count: usize, chunk_size: usize) -> Self {
        ChunkSpans {
            position,
            remaining: count,
            chunk_size,
        }
    }
}

impl Iterator for ChunkSpans {
    type Item = ChunkSpan;

    fn next(&mut self) -> Option<ChunkSpan> {
        if self.remaining == 0 {
            return None;
        }
        let start = aligned_start(self.position, self.chunk_size);
        let offset = (self.position - start) as usize;
        let len = min(self.chunk_size - offset, self.remaining);
        self.position += len as u64;
        self.remaining -= len;
        Some(ChunkSpan { start, offset, len })
    }
}

/// Read-only seekable stream over a remote resource.
///
/// Bytes are fetched in aligned chunks of `chunk_size` with HTTP Range requests
/// and kept in the chunk cache of the [`StreamCache`](crate::StreamCache) the
/// stream was opened from, so every stream on the same URL shares them.
///
/// Reads follow the usual [`Read`] contract: a read at or past [`len`](Self::len)
/// returns 0 and a read crossing it is shortened.
pub struct ChunkedStream<T: SyncHttpRangeClient> {
    shared: Arc<Shared<T>>,
    url: String,
    id: InstanceId,
    chunk_size: usize,
    length: u64,
    position: u64,
}

impl<T: SyncHttpRangeClient> ChunkedStream<T> {
    pub(crate) fn open(shared: Arc<Shared<T>>, url: &str, chunk_size: usize) -> Result<Self> {
        validate_chunk_size(chunk_size)?;
        let length = shared.fetcher.head_length(url)?;
        let id = shared.registry.register(url, Instant::now());
        shared.chunks.get_or_create_entry(url);
        debug!(
            "opened stream {} on {} (length {}, chunk size {})",
            id, url, length, chunk_size
        );
        Ok(ChunkedStream {
            shared,
            url: url.to_string(),
            id,
            chunk_size,
            length,
            position: 0,
        })
    }

    /// Read up to `buf.len()` bytes from the current position.
    ///
    /// On error the contents of `buf` are unspecified and the position may have
    /// advanced past the chunks that were copied successfully.
    pub fn read_chunked(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.shared
            .registry
            .touch(self.id, &self.url, Instant::now());
        if buf.is_empty() || self.position >= self.length {
            return Ok(0);
        }
        let count = min(buf.len() as u64, self.length - self.position) as usize;

        let mut copied = 0;
        for span in ChunkSpans::new(self.position, count, self.chunk_size) {
            let chunk = self.chunk(span.start)?;
            let end = span.offset + span.len;
            if chunk.len() < end {
                return Err(StreamError::UnexpectedLength {
                    expected: end,
                    actual: chunk.len(),
                });
            }
            buf[copied..copied + span.len].copy_from_slice(&chunk[span.offset..end]);
            copied += span.len;
            self.position += span.len as u64;
        }
        Ok(copied)
    }

    /// Cached chunk starting at `start`, fetched on a miss.
    fn chunk(&self, start: u64) -> Result<Bytes> {
        let key = ChunkKey::new(self.chunk_size, start);
        if let Some(chunk) = self.shared.chunks.get_chunk(&self.url, key) {
            trace!("{}: chunk {} from cache", self.url, start);
            return Ok(chunk);
        }
        let end = min(self.length, start + self.chunk_size as u64);
        debug!("{}: fetching chunk {} - {}", self.url, start, end);
        let bytes = self
            .shared
            .fetcher
            .get_range(&self.url, start, end)
            .map_err(|e| {
                warn!("{}: fetching chunk {} failed: {}", self.url, start, e);
                e
            })?;
        Ok(self.shared.chunks.put_chunk(&self.url, key, bytes))
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Move the cursor. Positions past the end are allowed.
    pub fn set_position(&mut self, position: u64) {
        self.position = position;
    }

    /// Length of the resource as reported when the stream was opened.
    pub fn len(&self) -> u64 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }
}

impl<T: SyncHttpRangeClient> Read for ChunkedStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_chunked(buf)?)
    }
}

impl<T: SyncHttpRangeClient> Seek for ChunkedStream<T> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let (base, offset) = match pos {
            SeekFrom::Start(n) => {
                self.position = n;
                return Ok(n);
            }
            SeekFrom::Current(n) => (self.position, n),
            SeekFrom::End(n) => (self.length, n),
        };
        match base.checked_add_signed(offset) {
            Some(n) => {
                self.position = n;
                Ok(n)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "invalid seek to a negative or overflowing position",
            )),
        }
    }
}

impl<T: SyncHttpRangeClient> Write for ChunkedStream<T> {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(StreamError::Unsupported("write to a read-only stream").into())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<T: SyncHttpRangeClient> Drop for ChunkedStream<T> {
    fn drop(&mut self) {
        self.shared.registry.unregister(self.id);
        trace!("closed stream {} on {}", self.id, self.url);
    }
}

impl<T: SyncHttpRangeClient> fmt::Debug for ChunkedStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedStream")
            .field("url", &self.url)
            .field("id", &self.id)
            .field("chunk_size", &self.chunk_size)
            .field("length", &self.length)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::CacheOptions;
    use crate::test_util::{init_logger, MemoryClient};
    use crate::StreamCache;

    const URL: &str = "mem://resource";

    fn cache(client: &MemoryClient, chunk_size: usize) -> StreamCache<MemoryClient> {
        init_logger();
        StreamCache::with_client(
            client.clone(),
            CacheOptions::default().chunk_size(chunk_size),
        )
        .unwrap()
    }

    #[test]
    fn alignment() {
        assert_eq!(chunk_index(0, 10), 0);
        assert_eq!(chunk_index(9, 10), 0);
        assert_eq!(chunk_index(10, 10), 1);
        assert_eq!(aligned_start(25, 10), 20);
        assert_eq!(aligned_start(30, 10), 30);
    }

    #[test]
    fn spans_split_at_boundaries() {
        let spans: Vec<ChunkSpan> = ChunkSpans::new(5, 20, 10).collect();
        assert_eq!(
            spans,
            vec![
                ChunkSpan { start: 0, offset: 5, len: 5 },
                ChunkSpan { start: 10, offset: 0, len: 10 },
                ChunkSpan { start: 20, offset: 0, len: 5 },
            ]
        );
        let spans: Vec<ChunkSpan> = ChunkSpans::new(12, 3, 10).collect();
        assert_eq!(spans, vec![ChunkSpan { start: 10, offset: 2, len: 3 }]);
        assert_eq!(ChunkSpans::new(12, 0, 10).count(), 0);
    }

    #[test]
    fn single_chunk_read() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        assert_eq!(stream.len(), 100);
        stream.set_position(3);
        let mut buf = [0; 10];
        assert_eq!(stream.read_chunked(&mut buf)?, 10);
        assert_eq!(&buf, &client.data()[3..13]);
        assert_eq!(stream.position(), 13);
        assert_eq!(client.ranges(), vec!["bytes=0-31".to_string()]);
        Ok(())
    }

    #[test]
    fn multi_chunk_read() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        stream.set_position(30);
        let mut buf = [0; 40];
        assert_eq!(stream.read_chunked(&mut buf)?, 40);
        assert_eq!(&buf[..], &client.data()[30..70]);
        assert_eq!(stream.position(), 70);
        assert_eq!(
            client.ranges(),
            vec![
                "bytes=0-31".to_string(),
                "bytes=32-63".to_string(),
                "bytes=64-95".to_string()
            ]
        );
        Ok(())
    }

    #[test]
    fn tail_chunk_is_clipped() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        stream.seek(SeekFrom::Start(96))?;
        let mut buf = [0; 4];
        stream.read_exact(&mut buf)?;
        assert_eq!(&buf, &client.data()[96..100]);
        assert_eq!(client.ranges(), vec!["bytes=96-99".to_string()]);
        Ok(())
    }

    #[test]
    fn warm_read_is_identical_and_free() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 16);
        let mut stream = cache.open(URL)?;
        let mut cold = [0; 50];
        stream.seek(SeekFrom::Start(7))?;
        stream.read_exact(&mut cold)?;
        let requests = cache.fetcher().requests_made();

        let mut warm = [0; 50];
        stream.seek(SeekFrom::Start(7))?;
        stream.read_exact(&mut warm)?;
        assert_eq!(cold, warm);
        assert_eq!(cache.fetcher().requests_made(), requests);
        Ok(())
    }

    // Reads are short at the end of the resource instead of padding past it.
    #[test]
    fn short_read_at_end_of_resource() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        stream.set_position(90);
        let mut buf = [0xff; 20];
        assert_eq!(stream.read_chunked(&mut buf)?, 10);
        assert_eq!(&buf[..10], &client.data()[90..]);
        assert_eq!(stream.position(), 100);
        assert_eq!(stream.read_chunked(&mut buf)?, 0);

        stream.set_position(500);
        assert_eq!(stream.read_chunked(&mut buf)?, 0);
        assert_eq!(stream.position(), 500);
        Ok(())
    }

    #[test]
    fn read_to_end_terminates() -> Result<()> {
        let client = MemoryClient::with_len(1000);
        let cache = cache(&client, 64);
        let mut stream = cache.open(URL)?;
        let mut all = Vec::new();
        stream.read_to_end(&mut all)?;
        assert_eq!(&all[..], client.data());
        Ok(())
    }

    #[test]
    fn seek_origins() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        assert_eq!(stream.seek(SeekFrom::Start(10))?, 10);
        assert_eq!(stream.seek(SeekFrom::Current(5))?, 15);
        assert_eq!(stream.seek(SeekFrom::End(-20))?, 80);
        assert_eq!(stream.seek(SeekFrom::End(20))?, 120);
        assert_eq!(stream.position(), 120);

        let err = stream.seek(SeekFrom::Current(-200)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(stream.position(), 120);
        Ok(())
    }

    #[test]
    fn write_always_fails() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        for buf in [&b""[..], &b"x"[..], &[0u8; 64][..]] {
            let err = stream.write(buf).unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        }
        assert!(stream.flush().is_ok());
        assert_eq!(stream.position(), 0);
        Ok(())
    }

    #[test]
    fn open_fails_when_resource_unavailable() {
        let client = MemoryClient::with_len(100).failing_with(404);
        let cache = cache(&client, 32);
        let err = cache.open(URL).unwrap_err();
        assert!(err.is_resource_unavailable());
        assert!(cache.registry().is_empty());
        assert!(cache.chunk_cache().is_empty());
    }

    #[test]
    fn open_rejects_zero_chunk_size() {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        assert!(matches!(
            cache.open_with_chunk_size(URL, 0),
            Err(StreamError::InvalidConfig(_))
        ));
    }

    #[test]
    fn failed_fetch_surfaces_and_keeps_earlier_chunks() -> Result<()> {
        let client = MemoryClient::with_len(100).failing_from(32);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        stream.set_position(20);
        let mut buf = [0; 30];
        let err = stream.read_chunked(&mut buf).unwrap_err();
        assert!(matches!(err, StreamError::HttpStatus(503)));
        assert_eq!(&buf[..12], &client.data()[20..32]);
        assert_eq!(stream.position(), 32);

        let entry = cache.chunk_cache().entry(URL).unwrap();
        assert!(entry.contains(ChunkKey::new(32, 0)));
        assert!(!entry.contains(ChunkKey::new(32, 32)));

        let err = stream.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Other);
        Ok(())
    }

    #[test]
    fn drop_unregisters() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let stream = cache.open(URL)?;
        let id = stream.id();
        assert!(cache.registry().contains(id));
        drop(stream);
        assert!(!cache.registry().contains(id));
        Ok(())
    }

    #[test]
    fn read_at_end_counts_as_activity() -> Result<()> {
        let client = MemoryClient::with_len(100);
        let cache = cache(&client, 32);
        let mut stream = cache.open(URL)?;
        stream.seek(SeekFrom::End(0))?;
        cache.registry().unregister(stream.id());

        let mut buf = [0; 8];
        assert_eq!(stream.read_chunked(&mut buf)?, 0);
        assert!(cache.registry().contains(stream.id()));

        cache.registry().unregister(stream.id());
        assert_eq!(stream.read_chunked(&mut [])?, 0);
        assert!(cache.registry().contains(stream.id()));
        assert!(client.ranges().is_empty());
        Ok(())
    }
}
