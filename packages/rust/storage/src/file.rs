//! On-disk JSON store: `<root>/<escaped key>/<name>`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use jobdigest_shared::{JobDigestError, Result};
use tracing::debug;

use crate::{KeyValueStore, display_key};

/// File-per-value store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    readonly: bool,
}

impl FileStore {
    /// Open a store at `root` in read-write mode, creating the directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            JobDigestError::persistence(root.display().to_string(), e.to_string())
        })?;
        Ok(Self {
            root,
            readonly: false,
        })
    }

    /// Open a store at `root` that rejects writes. The directory need not exist.
    pub fn open_readonly(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            readonly: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the value for `(key, name)`.
    pub fn path_for(&self, key: &str, name: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(JobDigestError::persistence(
                display_key(key, name),
                "empty storage key",
            ));
        }
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(JobDigestError::persistence(
                display_key(key, name),
                "value name must be a plain file name",
            ));
        }
        Ok(self.root.join(escape_key(key)).join(name))
    }

    fn check_writable(&self, key: &str, name: &str) -> Result<()> {
        if self.readonly {
            return Err(JobDigestError::persistence(
                display_key(key, name),
                "store is opened in read-only mode",
            ));
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    /// Only a missing path counts as absent. Anything else that prevents a
    /// read, including a non-file at the path, is a persistence error.
    fn exists(&self, key: &str, name: &str) -> Result<bool> {
        let path = self.path_for(key, name)?;
        let fail = |msg: String| JobDigestError::persistence(display_key(key, name), msg);
        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(true),
            Ok(_) => Err(fail(format!("{}: not a regular file", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(fail(format!("{}: {e}", path.display()))),
        }
    }

    fn read_raw(&self, key: &str, name: &str) -> Result<String> {
        let path = self.path_for(key, name)?;
        std::fs::read_to_string(&path).map_err(|e| {
            JobDigestError::persistence(display_key(key, name), format!("{}: {e}", path.display()))
        })
    }

    fn write_raw(&self, key: &str, name: &str, contents: &str) -> Result<()> {
        self.check_writable(key, name)?;
        let target = self.path_for(key, name)?;
        let fail = |path: &Path, e: std::io::Error| {
            JobDigestError::persistence(display_key(key, name), format!("{}: {e}", path.display()))
        };

        if let Some(dir) = target.parent() {
            std::fs::create_dir_all(dir).map_err(|e| fail(dir, e))?;
        }

        // Write to temp file first
        let temp = target.with_file_name(format!(".{name}.{}.tmp", std::process::id()));
        std::fs::write(&temp, contents).map_err(|e| fail(&temp, e))?;

        // Atomic rename
        if let Err(e) = std::fs::rename(&temp, &target) {
            let _ = std::fs::remove_file(&temp);
            return Err(fail(&target, e));
        }

        debug!(path = %target.display(), bytes = contents.len(), "wrote value");
        Ok(())
    }
}

/// Map any key to a single safe directory name. ASCII letters, digits, `-`
/// and `_` pass through; every other byte becomes `%XX`, so distinct keys
/// never share a directory and no key can climb out of the root.
fn escape_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}
