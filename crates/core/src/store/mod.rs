//! Key-value persistence collaborator.
//!
//! The core never decides where values live. It reads them once at startup
//! and writes them on change through [`KeyValueStore`].

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};

use crate::Result;

pub const SELECTED_PATTERN_KEY: &str = "pocketOperatorSelectedPattern";
pub const BPM_KEY: &str = "pocketOperatorBPM";

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// Process-local store, used by tests and the command line host.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Reads a JSON-encoded value. Missing or malformed entries read as `None`.
pub fn load_value<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(key, %err, "ignoring malformed stored value");
            None
        }
    }
}

pub fn store_value<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, raw)
}

/// Writes a value, logging instead of failing. Runtime operations use this so
/// a broken store never interrupts playback.
pub(crate) fn persist<T: Serialize>(store: &mut dyn KeyValueStore, key: &str, value: &T) {
    if let Err(err) = store_value(store, key, value) {
        tracing::warn!(key, %err, "failed to persist value");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PocketError;

    #[test]
    fn round_trips_json_values() {
        let mut store = MemoryStore::new();
        store_value(&mut store, SELECTED_PATTERN_KEY, &7_usize).unwrap();
        assert_eq!(store.get(SELECTED_PATTERN_KEY).as_deref(), Some("7"));
        assert_eq!(load_value::<usize>(&store, SELECTED_PATTERN_KEY), Some(7));
    }

    #[test]
    fn malformed_values_read_as_missing() {
        let mut store = MemoryStore::new();
        store.set(BPM_KEY, "fast".to_string()).unwrap();
        assert_eq!(load_value::<u32>(&store, BPM_KEY), None);
        assert_eq!(load_value::<u32>(&store, "absent"), None);
    }

    struct ReadOnlyStore;

    impl KeyValueStore for ReadOnlyStore {
        fn get(&self, _key: &str) -> Option<String> {
            None
        }

        fn set(&mut self, key: &str, _value: String) -> Result<()> {
            Err(PocketError::msg(format!("store is read-only: {key}")))
        }
    }

    #[test]
    fn persist_swallows_store_failures() {
        let mut store = ReadOnlyStore;
        assert!(store_value(&mut store, BPM_KEY, &120).is_err());
        persist(&mut store, BPM_KEY, &120);
    }
}
