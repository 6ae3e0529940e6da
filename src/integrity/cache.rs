//! Last-observed digest per monitored data type, bounded by capacity.
//! When full, the entry updated least recently is evicted.

use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

struct CacheEntry {
    digest: String,
    updated: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    clock: u64,
}

pub struct DigestCache {
    state: Mutex<CacheState>,
    capacity: usize,
}

impl DigestCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            capacity: capacity.max(1),
        }
    }

    pub async fn get(&self, data_type: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .entries
            .get(data_type)
            .map(|entry| entry.digest.clone())
    }

    /// Store `digest` for `data_type` and return the digest it replaced
    pub async fn swap(&self, data_type: &str, digest: String) -> Option<String> {
        let mut state = self.state.lock().await;
        state.clock += 1;
        let updated = state.clock;

        if !state.entries.contains_key(data_type) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.updated)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                state.entries.remove(&key);
                debug!("Evicted digest cache entry for {}", key);
            }
        }

        state
            .entries
            .insert(data_type.to_string(), CacheEntry { digest, updated })
            .map(|previous| previous.digest)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
