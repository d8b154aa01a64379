//! In-process stores.

use std::collections::HashMap;
use std::sync::Mutex;

use jobdigest_shared::{JobDigestError, Result};

use crate::{KeyValueStore, display_key};

type Entries = HashMap<(String, String), String>;

/// Map-backed store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<T>(&self, key: &str, name: &str, f: impl FnOnce(&mut Entries) -> T) -> Result<T> {
        let mut entries = self.entries.lock().map_err(|_| {
            JobDigestError::persistence(display_key(key, name), "memory store lock poisoned")
        })?;
        Ok(f(&mut entries))
    }
}

impl KeyValueStore for MemoryStore {
    fn exists(&self, key: &str, name: &str) -> Result<bool> {
        self.with_entries(key, name, |e| {
            e.contains_key(&(key.to_string(), name.to_string()))
        })
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<String> {
        self.with_entries(key, name, |e| {
            e.get(&(key.to_string(), name.to_string())).cloned()
        })?
        .ok_or_else(|| JobDigestError::persistence(display_key(key, name), "no such value"))
    }

    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
        self.with_entries(key, name, |e| {
            e.insert((key.to_string(), name.to_string()), contents.to_string());
        })
    }
}

/// Reads fall through to `inner` unless overwritten here; writes never reach
/// `inner`. Used for dry runs against real data.
#[derive(Debug)]
pub struct OverlayStore<S> {
    inner: S,
    overlay: MemoryStore,
}

impl<S: KeyValueStore> OverlayStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            overlay: MemoryStore::new(),
        }
    }

    /// Number of values written to the overlay.
    pub fn pending_writes(&self) -> usize {
        self.overlay.len()
    }
}

impl<S: KeyValueStore> KeyValueStore for OverlayStore<S> {
    fn exists(&self, key: &str, name: &str) -> Result<bool> {
        Ok(self.overlay.exists(key, name)? || self.inner.exists(key, name)?)
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<String> {
        if self.overlay.exists(key, name)? {
            self.overlay.read_raw(key, name)
        } else {
            self.inner.read_raw(key, name)
        }
    }

    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
        self.overlay.write_raw(key, name, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_basics() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        assert!(!store.exists("a", "x.json").unwrap());
        assert!(store.read_raw("a", "x.json").unwrap_err().is_persistence());

        store.write_raw("a", "x.json", "1").unwrap();
        store.write_raw("b", "x.json", "2").unwrap();
        assert_eq!(store.read_raw("a", "x.json").unwrap(), "1");
        assert_eq!(store.read_raw("b", "x.json").unwrap(), "2");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn overlay_reads_through_and_shields_writes() {
        let inner = MemoryStore::new();
        inner.write_raw("room", "sent.json", "old").unwrap();

        let overlay = OverlayStore::new(&inner);
        assert_eq!(overlay.read_raw("room", "sent.json").unwrap(), "old");

        overlay.write_raw("room", "sent.json", "new").unwrap();
        assert_eq!(overlay.read_raw("room", "sent.json").unwrap(), "new");
        assert_eq!(overlay.pending_writes(), 1);
        assert_eq!(inner.read_raw("room", "sent.json").unwrap(), "old");
    }
}
