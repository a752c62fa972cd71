use std::collections::BTreeMap;
use std::sync::Mutex;

use super::{RecordStore, StoreError};

/// In-process [`RecordStore`] backed by an ordered map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All keys starting with `prefix`, in lexical order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Poisoned`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.records.lock().map_err(|_| StoreError::Poisoned)?.len())
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(|_| StoreError::Poisoned)?;
        records.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").expect("get"), None);
        store.put("a", "1").expect("put");
        assert_eq!(store.get("a").expect("get").as_deref(), Some("1"));
        store.delete("a").expect("delete");
        store.delete("a").expect("second delete is a no-op");
        assert_eq!(store.get("a").expect("get"), None);
    }

    #[test]
    fn prefix_scan_stops_at_prefix_boundary() {
        let store = MemoryStore::new();
        for key in ["user:a:x", "user:a:y", "user:b:x", "user:aa:z"] {
            store.put(key, "v").expect("put");
        }
        let keys = store.keys_with_prefix("user:a:").expect("scan");
        assert_eq!(keys, vec!["user:a:x".to_string(), "user:a:y".to_string()]);
    }
}
