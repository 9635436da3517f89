//! Bookkeeping of live streams and the time of their last read.
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceInfo {
    pub id: InstanceId,
    pub url: String,
    pub last_read: Instant,
}

#[derive(Debug)]
struct Registration {
    url: String,
    last_read: Instant,
}

#[derive(Debug, Default)]
pub struct InstanceRegistry {
    next_id: AtomicU64,
    instances: Mutex<HashMap<InstanceId, Registration>>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stream on `url`. Registration counts as its first read.
    pub fn register(&self, url: &str, now: Instant) -> InstanceId {
        let id = InstanceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.instances.lock().insert(
            id,
            Registration {
                url: url.to_string(),
                last_read: now,
            },
        );
        id
    }

    pub fn unregister(&self, id: InstanceId) -> bool {
        self.instances.lock().remove(&id).is_some()
    }

    /// Record a read. Re-registers an instance that was reclaimed by a sweep.
    pub fn touch(&self, id: InstanceId, url: &str, now: Instant) {
        let mut instances = self.instances.lock();
        match instances.get_mut(&id) {
            Some(registration) => registration.last_read = now,
            None => {
                trace!("re-registering stream {} on {}", id, url);
                instances.insert(
                    id,
                    Registration {
                        url: url.to_string(),
                        last_read: now,
                    },
                );
            }
        }
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.lock().contains_key(&id)
    }

    pub fn snapshot(&self) -> Vec<InstanceInfo> {
        self.instances
            .lock()
            .iter()
            .map(|(id, registration)| InstanceInfo {
                id: *id,
                url: registration.url.clone(),
                last_read: registration.last_read,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }
}
