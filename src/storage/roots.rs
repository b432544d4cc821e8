//! Resolution of logical directories to absolute locations

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::types::Directory;
use std::path::{Path, PathBuf};

/// Absolute locations of the three logical roots
///
/// Resolved once and never changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageRoots {
    documents: PathBuf,
    library: PathBuf,
    caches: PathBuf,
}

impl StorageRoots {
    /// Use explicit absolute locations
    pub fn new(documents: PathBuf, library: PathBuf, caches: PathBuf) -> Self {
        Self {
            documents,
            library,
            caches,
        }
    }

    /// Resolve each root from its override or the platform location
    pub fn from_config(config: &StorageConfig) -> Result<Self, StorageError> {
        let resolve = |directory: Directory, configured: &Option<PathBuf>| {
            match configured {
                Some(path) => Ok(path.clone()),
                None => platform_dir(directory)
                    .map(|base| base.join(&config.app_namespace))
                    .ok_or_else(|| StorageError::RootUnavailable {
                        directory: directory.to_string(),
                    }),
            }
        };

        Ok(Self {
            documents: resolve(Directory::Documents, &config.documents_dir)?,
            library: resolve(Directory::Library, &config.library_dir)?,
            caches: resolve(Directory::Caches, &config.caches_dir)?,
        })
    }

    /// Absolute location of a logical root
    pub fn get(&self, directory: Directory) -> &Path {
        match directory {
            Directory::Documents => &self.documents,
            Directory::Library => &self.library,
            Directory::Caches => &self.caches,
        }
    }
}

/// Platform location backing a logical directory
fn platform_dir(directory: Directory) -> Option<PathBuf> {
    match directory {
        Directory::Documents => {
            dirs::document_dir().or_else(|| dirs::home_dir().map(|home| home.join("Documents")))
        }
        Directory::Library => dirs::data_dir(),
        Directory::Caches => dirs::cache_dir(),
    }
}
