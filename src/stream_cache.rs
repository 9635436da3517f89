use crate::chunk_cache::ChunkCache;
use crate::config::CacheOptions;
use crate::error::Result;
use crate::range_client::{RangeFetcher, SyncHttpRangeClient};
use crate::registry::InstanceRegistry;
use crate::stream::ChunkedStream;
use crate::sweeper::{expire_idle, Sweeper};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// State shared by a [`StreamCache`] and all streams opened from it.
pub(crate) struct Shared<T: SyncHttpRangeClient> {
    pub(crate) fetcher: RangeFetcher<T>,
    pub(crate) chunks: Arc<ChunkCache>,
    pub(crate) registry: Arc<InstanceRegistry>,
}

/// Opens [`ChunkedStream`]s that share fetched chunks per URL.
///
/// Owns a background sweeper that drops the chunks of a URL once all its
/// streams have been idle for `idle_threshold`. The sweeper stops on
/// [`shutdown`](Self::shutdown) or when the cache is dropped; streams opened
/// before keep working.
pub struct StreamCache<T: SyncHttpRangeClient> {
    shared: Arc<Shared<T>>,
    options: CacheOptions,
    sweeper: Sweeper,
}

impl<T: SyncHttpRangeClient> StreamCache<T> {
    pub fn with_client(client: T, options: CacheOptions) -> Result<Self> {
        options.validate()?;
        let shared = Arc::new(Shared {
            fetcher: RangeFetcher::new(client),
            chunks: Arc::new(ChunkCache::new()),
            registry: Arc::new(InstanceRegistry::new()),
        });
        let sweeper = Sweeper::spawn(
            Arc::clone(&shared.chunks),
            Arc::clone(&shared.registry),
            options.sweep_period,
            options.idle_threshold,
        )?;
        Ok(StreamCache {
            shared,
            options,
            sweeper,
        })
    }

    /// Open `url` with the default chunk size.
    pub fn open(&self, url: &str) -> Result<ChunkedStream<T>> {
        self.open_with_chunk_size(url, self.options.chunk_size)
    }

    pub fn open_with_chunk_size(&self, url: &str, chunk_size: usize) -> Result<ChunkedStream<T>> {
        ChunkedStream::open(Arc::clone(&self.shared), url, chunk_size)
    }

    /// Run one sweep now. Returns the URLs whose entries were removed.
    pub fn sweep(&self) -> Vec<String> {
        self.sweep_at(Instant::now())
    }

    /// Run one sweep as if the current time was `now`.
    pub fn sweep_at(&self, now: Instant) -> Vec<String> {
        expire_idle(
            &self.shared.chunks,
            &self.shared.registry,
            now,
            self.options.idle_threshold,
        )
    }

    /// Stop the background sweeper. Cached chunks stay until the cache is dropped.
    pub fn shutdown(&mut self) {
        self.sweeper.stop();
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeper.is_running()
    }

    pub fn fetcher(&self) -> &RangeFetcher<T> {
        &self.shared.fetcher
    }

    pub fn chunk_cache(&self) -> &ChunkCache {
        &self.shared.chunks
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.shared.registry
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }
}

impl<T: SyncHttpRangeClient> fmt::Debug for StreamCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamCache")
            .field("options", &self.options)
            .field("entries", &self.shared.chunks.len())
            .field("instances", &self.shared.registry.len())
            .field("sweeping", &self.sweeper.is_running())
            .finish_non_exhaustive()
    }
}
