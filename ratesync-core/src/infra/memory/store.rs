use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::Result;
use crate::ports::{Store, StoreChange, StoreKey};

/// Process-local store with change notification.
///
/// Notifications are only emitted when a write actually changes the record.
pub struct MemoryStore {
    records: DashMap<StoreKey, Value>,
    changes: broadcast::Sender<StoreChange>,
    notify: AtomicBool,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("records", &self.records.len())
            .field("listeners", &self.changes.receiver_count())
            .field("notify", &self.notify.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity.max(1));
        Self {
            records: DashMap::new(),
            changes,
            notify: AtomicBool::new(true),
        }
    }

    /// Turn change notifications on or off. Writes still land either way.
    pub fn set_notifications(&self, enabled: bool) {
        self.notify.store(enabled, Ordering::Relaxed);
    }

    /// Current raw record, bypassing the async interface.
    pub fn peek(&self, key: StoreKey) -> Option<Value> {
        self.records.get(&key).map(|entry| entry.value().clone())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: StoreKey) -> Result<Option<Value>> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: StoreKey, value: Value) -> Result<()> {
        let old_value = self.records.insert(key, value.clone());
        if old_value.as_ref() == Some(&value) {
            return Ok(());
        }

        if self.notify.load(Ordering::Relaxed) {
            let change = StoreChange {
                key,
                old_value,
                new_value: Some(value),
            };
            // No listeners is not an error.
            let _ = self.changes.send(change);
        } else {
            debug!("Store notifications disabled, {} change not emitted", key);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}
