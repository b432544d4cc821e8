//! Managed local storage with directory semantics
//!
//! Files are addressed as `subdirectory/file_name` relative to one of three
//! logical roots ([`Directory`]). Completed transfers are committed here by
//! moving their temporary file into place, and small structured values can be
//! persisted as JSON next to them.
//!
//! All operations are synchronous and blocking. They are safe to call from
//! any thread; the coordinator runs them on the blocking pool so callers and
//! the delivery context are never stalled by disk I/O.
//!
//! ## Usage
//!
//! ```no_run
//! use transfer_dl::storage::StorageManager;
//! use transfer_dl::config::StorageConfig;
//! use transfer_dl::Directory;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = StorageManager::new(&StorageConfig::default())?;
//!
//! storage.store(&vec!["a", "b"], Directory::Library, Some("state"), "list.json")?;
//! let list: Option<Vec<String>> =
//!     storage.retrieve("list.json", Directory::Library, Some("state"))?;
//! assert_eq!(list.map(|l| l.len()), Some(2));
//! # Ok(())
//! # }
//! ```

mod roots;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use roots::StorageRoots;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::types::Directory;
use crate::utils::{relative_path, validate_relative};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Resolves logical directories and moves, stores, retrieves and removes files
#[derive(Clone, Debug)]
pub struct StorageManager {
    roots: StorageRoots,
}

impl StorageManager {
    /// Create a manager from configuration
    ///
    /// Resolves every root and creates it if missing.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        Self::with_roots(StorageRoots::from_config(config)?)
    }

    /// Create a manager over already-resolved roots
    pub fn with_roots(roots: StorageRoots) -> StorageResult<Self> {
        for directory in Directory::ALL {
            let root = roots.get(directory);
            std::fs::create_dir_all(root).map_err(|e| StorageError::io(root, e))?;
        }
        tracing::debug!(
            documents = %roots.get(Directory::Documents).display(),
            library = %roots.get(Directory::Library).display(),
            caches = %roots.get(Directory::Caches).display(),
            "Storage roots resolved"
        );
        Ok(Self { roots })
    }

    /// Absolute location of a logical root
    pub fn root(&self, directory: Directory) -> &Path {
        self.roots.get(directory)
    }

    /// Resolve a directory (and optional subdirectory) to an absolute path
    ///
    /// The subdirectory is created recursively if it does not exist yet.
    /// Calling this repeatedly for the same location is not an error.
    pub fn resolve_path(
        &self,
        directory: Directory,
        subdirectory: Option<&str>,
    ) -> StorageResult<PathBuf> {
        let path = self.location(directory, subdirectory)?;
        if !path.is_dir() {
            std::fs::create_dir_all(&path).map_err(|e| StorageError::io(&path, e))?;
            tracing::debug!(path = %path.display(), "Created storage directory");
        }
        Ok(path)
    }

    /// Move a temporary file into its final location
    ///
    /// An existing file at the destination is removed first (overwrite, not
    /// merge). Returns the destination path relative to the root, which is
    /// always `subdirectory/file_name`.
    pub fn move_file(
        &self,
        from: &Path,
        directory: Directory,
        subdirectory: Option<&str>,
        file_name: &str,
    ) -> StorageResult<String> {
        let relative = relative_path(subdirectory, file_name);
        validate_relative(&relative)?;

        let dir = self.resolve_path(directory, subdirectory)?;
        let destination = dir.join(file_name);

        if destination.exists() {
            remove_entry(&destination)?;
            tracing::debug!(path = %destination.display(), "Previous file removed");
        }

        if let Err(rename_err) = std::fs::rename(from, &destination) {
            // rename cannot cross filesystems; fall back to copy + delete
            std::fs::copy(from, &destination).map_err(|_| StorageError::io(from, rename_err))?;
            if let Err(e) = std::fs::remove_file(from) {
                tracing::warn!(path = %from.display(), error = %e, "Failed to remove source after copy");
            }
        }

        tracing::debug!(
            from = %from.display(),
            to = %destination.display(),
            "Moved file into storage"
        );
        Ok(relative)
    }

    /// Whether a file exists at a path relative to a root
    pub fn file_exists(&self, relative_path: &str, directory: Directory) -> bool {
        validate_relative(relative_path).is_ok() && self.root(directory).join(relative_path).exists()
    }

    /// Return the relative path back if a file already exists there
    pub fn check_if_already_exists(&self, relative_path: &str, directory: Directory) -> Option<String> {
        self.file_exists(relative_path, directory)
            .then(|| relative_path.to_string())
    }

    /// Serialize a value as JSON and write it, replacing any existing file
    ///
    /// The subdirectory is created if needed. The write goes through a
    /// sibling temporary file so readers never observe a partial value.
    ///
    /// # Errors
    ///
    /// [`StorageError::Encode`] means the value's `Serialize` impl rejected it,
    /// which is a programming error rather than a transient condition.
    pub fn store<T: Serialize + ?Sized>(
        &self,
        value: &T,
        directory: Directory,
        subdirectory: Option<&str>,
        file_name: &str,
    ) -> StorageResult<()> {
        validate_relative(&relative_path(subdirectory, file_name))?;
        let dir = self.resolve_path(directory, subdirectory)?;
        let path = dir.join(file_name);

        let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
            path: path.clone(),
            source,
        })?;

        let staging = dir.join(format!(".{}.tmp", file_name));
        std::fs::write(&staging, &bytes).map_err(|e| StorageError::io(&staging, e))?;
        if path.is_dir() {
            remove_entry(&path)?;
        }
        std::fs::rename(&staging, &path).map_err(|e| StorageError::io(&path, e))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored value");
        Ok(())
    }

    /// Read and decode a value stored with [`store`](Self::store)
    ///
    /// Returns `Ok(None)` when the file does not exist.
    ///
    /// # Errors
    ///
    /// [`StorageError::Decode`] means the file exists but does not match `T`.
    /// This is a schema mismatch and will not go away on retry.
    pub fn retrieve<T: DeserializeOwned>(
        &self,
        file_name: &str,
        directory: Directory,
        subdirectory: Option<&str>,
    ) -> StorageResult<Option<T>> {
        let path = self.location(directory, subdirectory)?.join(file_name);
        validate_relative(file_name)?;

        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&path).map_err(|e| StorageError::io(&path, e))?;
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| StorageError::Decode { path, source })
    }

    /// Remove every entry directly under a directory
    ///
    /// Child directories are removed together with their contents; the
    /// cleared directory itself is kept. Missing directories are not an error.
    pub fn clear(&self, directory: Directory, subdirectory: Option<&str>) -> StorageResult<()> {
        let path = self.location(directory, subdirectory)?;
        if !path.exists() {
            return Ok(());
        }

        let entries = std::fs::read_dir(&path).map_err(|e| StorageError::io(&path, e))?;
        let mut removed = 0usize;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&path, e))?;
            remove_entry(&entry.path())?;
            removed += 1;
        }

        tracing::debug!(path = %path.display(), removed, "Cleared directory");
        Ok(())
    }

    /// Remove a file (or directory) at a path relative to a root
    ///
    /// Missing paths are not an error.
    pub fn remove_file(&self, relative_path: &str, directory: Directory) -> StorageResult<()> {
        validate_relative(relative_path)?;
        let path = self.root(directory).join(relative_path);
        if path.exists() {
            remove_entry(&path)?;
            tracing::debug!(path = %path.display(), "Removed file");
        }
        Ok(())
    }

    /// Absolute path of a directory/subdirectory without touching the disk
    fn location(&self, directory: Directory, subdirectory: Option<&str>) -> StorageResult<PathBuf> {
        let root = self.root(directory);
        match subdirectory.map(|s| s.trim_matches('/')) {
            Some(sub) if !sub.is_empty() => {
                validate_relative(sub)?;
                Ok(root.join(sub))
            }
            _ => Ok(root.to_path_buf()),
        }
    }
}

/// Remove a file or a whole directory tree
fn remove_entry(path: &Path) -> StorageResult<()> {
    let result = if path.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| StorageError::io(path, e))
}
