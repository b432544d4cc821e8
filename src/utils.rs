//! Utility functions for path manipulation and request identity

use crate::error::{Error, Result, StorageError};
use std::path::{Component, Path};

/// Join an optional subdirectory and a file name into a relative path
///
/// Surrounding slashes on the subdirectory are ignored, and an empty
/// subdirectory means the file lives directly in the root.
///
/// # Examples
///
/// ```
/// use transfer_dl::utils::relative_path;
///
/// assert_eq!(relative_path(Some("videos"), "a.mp4"), "videos/a.mp4");
/// assert_eq!(relative_path(Some("videos/"), "a.mp4"), "videos/a.mp4");
/// assert_eq!(relative_path(None, "a.mp4"), "a.mp4");
/// assert_eq!(relative_path(Some(""), "a.mp4"), "a.mp4");
/// ```
pub fn relative_path(subdirectory: Option<&str>, file_name: &str) -> String {
    match subdirectory.map(|s| s.trim_matches('/')) {
        Some(sub) if !sub.is_empty() => format!("{}/{}", sub, file_name),
        _ => file_name.to_string(),
    }
}

/// Canonicalize a request URL into the string used as a transfer key
///
/// The URL is parsed and re-serialized, so equivalent spellings (host case,
/// default port, empty path) collapse onto the same key.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if the URL cannot be parsed.
pub fn canonical_url(raw: &str) -> Result<String> {
    url::Url::parse(raw)
        .map(|url| url.to_string())
        .map_err(|e| Error::InvalidRequest(format!("invalid URL '{}': {}", raw, e)))
}

/// Ensure a relative path stays inside its root
///
/// Absolute paths, `..` components and drive prefixes are rejected.
pub fn validate_relative(path: &str) -> std::result::Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("parent directory components are not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("path must be relative to a storage root"));
            }
        }
    }
    Ok(())
}
