use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use storage::documents::{load_json, save_json};
use storage::repository::{KeyValueStore, StorageError};

/// Document access that never fails the caller.
///
/// The first backend failure switches the owner to memory-only mode for the
/// rest of the process; corrupt documents read as missing.
///
/// Owners hold [`Persistence::writer`] from taking their snapshot until the
/// write lands, so documents are stored in the order snapshots were taken.
pub(crate) struct Persistence {
    documents: Arc<dyn KeyValueStore>,
    degraded: AtomicBool,
    writer: Mutex<()>,
}

impl Persistence {
    pub(crate) fn new(documents: Arc<dyn KeyValueStore>) -> Self {
        Self {
            documents,
            degraded: AtomicBool::new(false),
            writer: Mutex::new(()),
        }
    }

    /// Exclusive turn for a read-modify-write cycle.
    pub(crate) async fn writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    pub(crate) fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    pub(crate) async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if self.is_degraded() {
            return None;
        }
        match load_json(self.documents.as_ref(), key).await {
            Ok(value) => value,
            Err(StorageError::Serialization(reason)) => {
                warn!(key, %reason, "discarding corrupt document");
                None
            }
            Err(err) => {
                self.degrade(key, &err);
                None
            }
        }
    }

    pub(crate) async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if self.is_degraded() {
            debug!(key, "memory-only; skipping write");
            return;
        }
        match save_json(self.documents.as_ref(), key, value).await {
            Ok(()) => {}
            Err(StorageError::Serialization(reason)) => {
                warn!(key, %reason, "failed to encode document");
            }
            Err(err) => self.degrade(key, &err),
        }
    }

    pub(crate) async fn remove(&self, key: &str) {
        if self.is_degraded() {
            return;
        }
        if let Err(err) = self.documents.remove(key).await {
            self.degrade(key, &err);
        }
    }

    fn degrade(&self, key: &str, err: &StorageError) {
        if !self.degraded.swap(true, Ordering::AcqRel) {
            warn!(key, error = %err, "storage unavailable; continuing in memory only");
        }
    }
}
