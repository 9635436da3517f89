//! Periodic reclamation of cache entries whose streams went idle.
use crate::chunk_cache::ChunkCache;
use crate::error::Result;
use crate::registry::{InstanceId, InstanceRegistry};
use std::collections::HashMap;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// One sweep pass. Returns the URLs whose entries were removed.
///
/// A URL is reclaimed only when every registered stream on it has been idle
/// for longer than `idle_threshold`; its streams are then unregistered.
/// Entries of URLs without any registered stream are reclaimed as well.
pub fn expire_idle(
    cache: &ChunkCache,
    registry: &InstanceRegistry,
    now: Instant,
    idle_threshold: Duration,
) -> Vec<String> {
    let mut groups: HashMap<String, Vec<(InstanceId, Instant)>> = HashMap::new();
    for info in registry.snapshot() {
        groups
            .entry(info.url)
            .or_default()
            .push((info.id, info.last_read));
    }

    let mut expired = Vec::new();
    for (url, instances) in &groups {
        let all_idle = instances
            .iter()
            .all(|(_, last_read)| now.saturating_duration_since(*last_read) > idle_threshold);
        if !all_idle {
            continue;
        }
        let removed = cache.remove_entry(url);
        for (id, _) in instances {
            registry.unregister(*id);
        }
        info!(
            "expired {} idle stream(s) on {} (entry removed: {})",
            instances.len(),
            url,
            removed
        );
        expired.push(url.clone());
    }

    for url in cache.urls() {
        if !groups.contains_key(&url) && cache.remove_entry(&url) {
            info!("expired cache entry of {} without streams", url);
            expired.push(url);
        }
    }
    expired
}

/// Background thread running [`expire_idle`] every `period` until stopped.
#[derive(Debug)]
pub(crate) struct Sweeper {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub(crate) fn spawn(
        cache: Arc<ChunkCache>,
        registry: Arc<InstanceRegistry>,
        period: Duration,
        idle_threshold: Duration,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("chunk-cache-sweeper".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        expire_idle(&cache, &registry, Instant::now(), idle_threshold);
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        debug!("sweeper started, period {:?}", period);
        Ok(Sweeper {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Stop the thread and wait for it. Idempotent.
    pub(crate) fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("sweeper thread panicked");
            }
            debug!("sweeper stopped");
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
