//! Record store adapter.
//!
//! Everything above this module talks to persistence through
//! [`RecordStore`]: string keys, string values, no logic. Values are JSON
//! documents; [`get_json`] and [`put_json`] are the typed helpers the rest
//! of the crate uses.
//!
//! Implementations:
//! - [`MemoryStore`]: process-local map, used by tests and dry runs.
//! - [`SqliteStore`]: single-table SQLite database for the CLI.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Serialize, de::DeserializeOwned};

/// Errors surfaced by a [`RecordStore`].
///
/// Every variant means the persistence layer could not serve the request.
/// Callers propagate these; nothing in this crate retries.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store rejected or could not complete the call.
    #[error("record store unavailable for key {key}: {reason}")]
    Unavailable { key: String, reason: String },

    /// SQLite backend failure.
    #[error("sqlite record store error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A previous panic left the in-memory store's lock poisoned.
    #[error("record store lock poisoned")]
    Poisoned,
}

/// Key-value contract every component depends on.
///
/// Single-key operations only; there is no cross-key transaction. Writes
/// must be idempotent for identical values.
pub trait RecordStore {
    /// Fetch the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be reached.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write fails.
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the delete fails.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: RecordStore + ?Sized> RecordStore for &T {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        (**self).delete(key)
    }
}

/// Outcome of decoding a stored JSON document.
#[derive(Debug)]
pub enum Decoded<T> {
    /// No value under the key.
    Missing,
    /// Value present and decoded.
    Found(T),
    /// Value present but not decodable as `T`.
    Corrupt(serde_json::Error),
}

/// Read `key` and decode it as JSON.
///
/// A malformed document is reported as [`Decoded::Corrupt`] rather than an
/// error so callers can decide whether to treat it as a miss.
///
/// # Errors
///
/// Returns [`StoreError`] only when the store itself fails.
pub fn get_json<T: DeserializeOwned>(
    store: &impl RecordStore,
    key: &str,
) -> Result<Decoded<T>, StoreError> {
    let Some(raw) = store.get(key)? else {
        return Ok(Decoded::Missing);
    };
    Ok(match serde_json::from_str(&raw) {
        Ok(value) => Decoded::Found(value),
        Err(err) => Decoded::Corrupt(err),
    })
}

/// Encode `value` as JSON and store it under `key`.
///
/// # Errors
///
/// Returns [`StoreError`] if the write fails. Serialization of the crate's
/// own record types cannot fail; a failure is reported as `Unavailable`.
pub fn put_json<T: Serialize>(
    store: &impl RecordStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|err| StoreError::Unavailable {
        key: key.to_string(),
        reason: format!("encode: {err}"),
    })?;
    store.put(key, &raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn json_helpers_round_trip_through_store() {
        let store = MemoryStore::new();
        put_json(&store, "k", &Sample { n: 7 }).expect("put");
        match get_json::<Sample>(&store, "k").expect("get") {
            Decoded::Found(sample) => assert_eq!(sample, Sample { n: 7 }),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn corrupt_value_is_not_an_error() {
        let store = MemoryStore::new();
        store.put("k", "{not json").expect("put");
        assert!(matches!(
            get_json::<Sample>(&store, "k").expect("get"),
            Decoded::Corrupt(_)
        ));
        assert!(matches!(
            get_json::<Sample>(&store, "absent").expect("get"),
            Decoded::Missing
        ));
    }
}
