//! Process-wide store of fetched chunks, keyed by URL and aligned start.
//!
//! A chunk is inserted once and never modified afterwards. Two streams racing on
//! the same missing chunk may both fetch it; the first insert wins and the
//! second caller gets the stored copy back, so every reader of an entry sees
//! the same bytes.
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Identifies a chunk inside a URL entry.
///
/// The chunk size is part of the key so streams opened with different sizes
/// on the same URL never see each other's chunks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    pub chunk_size: usize,
    pub start: u64,
}

impl ChunkKey {
    pub fn new(chunk_size: usize, start: u64) -> Self {
        ChunkKey { chunk_size, start }
    }
}

/// Chunks of a single URL.
#[derive(Debug, Default)]
pub struct ChunkEntry {
    chunks: RwLock<HashMap<ChunkKey, Bytes>>,
}

impl ChunkEntry {
    pub fn get(&self, key: ChunkKey) -> Option<Bytes> {
        self.chunks.read().get(&key).cloned()
    }

    /// Insert `bytes` unless the chunk is already present. Returns the stored chunk.
    pub fn insert(&self, key: ChunkKey, bytes: Bytes) -> Bytes {
        self.chunks.write().entry(key).or_insert(bytes).clone()
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.chunks.read().contains_key(&key)
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Sum of the cached chunk lengths.
    pub fn cached_bytes(&self) -> usize {
        self.chunks.read().values().map(Bytes::len).sum()
    }
}

#[derive(Debug, Default)]
pub struct ChunkCache {
    entries: RwLock<HashMap<String, Arc<ChunkEntry>>>,
}

impl ChunkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_entry(&self, url: &str) -> Arc<ChunkEntry> {
        if let Some(entry) = self.entries.read().get(url) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(url.to_string()).or_default())
    }

    pub fn entry(&self, url: &str) -> Option<Arc<ChunkEntry>> {
        self.entries.read().get(url).cloned()
    }

    pub fn get_chunk(&self, url: &str, key: ChunkKey) -> Option<Bytes> {
        self.entry(url)?.get(key)
    }

    /// Store a chunk, creating the URL entry if it was swept in the meantime.
    pub fn put_chunk(&self, url: &str, key: ChunkKey, bytes: Bytes) -> Bytes {
        self.get_or_create_entry(url).insert(key, bytes)
    }

    /// Drop all chunks of `url`. Returns whether an entry existed.
    pub fn remove_entry(&self, url: &str) -> bool {
        self.entries.write().remove(url).is_some()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.read().contains_key(url)
    }

    pub fn urls(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Number of URL entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
