//! Key-value storage for per-audience sent records.
//!
//! Values live under a composite key: an audience key (room topic) plus a
//! fixed per-source file name. [`KeyValueStore`] is the raw-text contract;
//! [`JsonStoreExt`] layers typed JSON reads and writes on top of any store.
//!
//! **Implementations:**
//! - [`FileStore`]: one directory per audience on local disk, atomic writes
//! - [`MemoryStore`]: in-process map for tests
//! - [`OverlayStore`]: reads through to another store, keeps writes in memory

mod file;
mod memory;

use std::sync::Arc;

use jobdigest_shared::{JobDigestError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use file::FileStore;
pub use memory::{MemoryStore, OverlayStore};

/// Raw text storage addressed by `(key, name)`.
///
/// All failures are [`JobDigestError::Persistence`].
pub trait KeyValueStore: Send + Sync {
    /// Whether a value exists for `(key, name)`.
    fn exists(&self, key: &str, name: &str) -> Result<bool>;

    /// Read the value for `(key, name)`. Missing values are an error.
    fn read_raw(&self, key: &str, name: &str) -> Result<String>;

    /// Replace the value for `(key, name)`. Readers observe either the old or
    /// the new value, never a partial write.
    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Arc<S> {
    fn exists(&self, key: &str, name: &str) -> Result<bool> {
        (**self).exists(key, name)
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<String> {
        (**self).read_raw(key, name)
    }

    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
        (**self).write_raw(key, name, contents)
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for &S {
    fn exists(&self, key: &str, name: &str) -> Result<bool> {
        (**self).exists(key, name)
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<String> {
        (**self).read_raw(key, name)
    }

    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
        (**self).write_raw(key, name, contents)
    }
}

/// Typed JSON access for every [`KeyValueStore`].
pub trait JsonStoreExt: KeyValueStore {
    /// Read and deserialize the value for `(key, name)`.
    fn read_json<T: DeserializeOwned>(&self, key: &str, name: &str) -> Result<T> {
        let raw = self.read_raw(key, name)?;
        serde_json::from_str(&raw).map_err(|e| {
            JobDigestError::persistence(display_key(key, name), format!("invalid JSON: {e}"))
        })
    }

    /// Serialize (pretty-printed) and write `value` for `(key, name)`.
    fn write_json<T: Serialize + ?Sized>(&self, key: &str, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(|e| {
            JobDigestError::persistence(
                display_key(key, name),
                format!("JSON serialization failed: {e}"),
            )
        })?;
        self.write_raw(key, name, &json)
    }
}

impl<S: KeyValueStore + ?Sized> JsonStoreExt for S {}

/// `key/name`, as used in error messages and logs.
pub fn display_key(key: &str, name: &str) -> String {
    format!("{key}/{name}")
}
