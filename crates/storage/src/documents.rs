//! Typed JSON documents on top of a [`KeyValueStore`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::{KeyValueStore, StorageError};

/// Visitor progress ledger.
pub const PROGRESS_KEY: &str = "kakomon-progress";
/// Preference flags.
pub const SETTINGS_KEY: &str = "kakomon-settings";
/// "Continue where you left off" pointer.
pub const LAST_SESSION_KEY: &str = "kakomon-last-session";

/// Read and decode the document under `key`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if the stored text is not a valid
/// `T`, or the backend's error if it cannot be read.
pub async fn load_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(raw) = store.get(key).await? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|err| StorageError::Serialization(format!("{key}: {err}")))
}

/// Encode `value` and store it under `key`.
///
/// # Errors
///
/// Returns `StorageError` if encoding or the write fails.
pub async fn save_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)
        .map_err(|err| StorageError::Serialization(format!("{key}: {err}")))?;
    store.set(key, &raw).await
}
