//! Object store access
//!
//! Keys are `/`-separated paths without a leading slash. Listing follows
//! delimiter semantics: `list("cameras/caco-01/")` yields the immediate
//! children, folders with a trailing `/` and objects by full key.

pub mod local;
pub mod memory;
pub mod retrying;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use retrying::RetryingStore;

use async_trait::async_trait;
use std::io::ErrorKind;
use std::sync::Arc;
use thiserror::Error;

/// Object store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object at the key
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Underlying I/O failure
    #[error("Storage I/O error on '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Key is empty, absolute, or escapes the store
    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),
}

impl StoreError {
    pub fn io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == ErrorKind::NotFound {
            return StoreError::NotFound(key.to_string());
        }
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }

    /// Whether another attempt may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::TimedOut
                    | ErrorKind::Interrupted
                    | ErrorKind::WouldBlock
                    | ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::ConnectionRefused
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
            ),
            StoreError::NotFound(_) | StoreError::InvalidKey(_) => false,
        }
    }
}

/// Bucket-like object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Immediate children of a folder prefix, sorted
    ///
    /// A prefix with no children yields an empty list, not an error.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or replace an object
    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Copy an object, replacing any existing destination
    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        (**self).list(prefix).await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, data: Vec<u8>) -> Result<(), StoreError> {
        (**self).put(key, data).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        (**self).copy(src, dst).await
    }
}

/// Reject keys that are empty, absolute, or contain `.`/`..` segments
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.starts_with('/')
        || key.ends_with('/')
        || key.contains('\\')
        || key.split('/').any(|s| s.is_empty() || s == "." || s == "..");
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Normalize a listing prefix to folder form (`a/b` → `a/b/`, `` stays ``)
pub fn folder_prefix(prefix: &str) -> Result<String, StoreError> {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    validate_key(trimmed).map_err(|_| StoreError::InvalidKey(prefix.to_string()))?;
    Ok(format!("{}/", trimmed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("cameras/caco-01/c1/2019").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/cameras").is_err());
        assert!(validate_key("cameras/").is_err());
        assert!(validate_key("cameras//c1").is_err());
        assert!(validate_key("cameras/../etc").is_err());
    }

    #[test]
    fn test_folder_prefix() {
        assert_eq!(folder_prefix("cameras/caco-01").unwrap(), "cameras/caco-01/");
        assert_eq!(folder_prefix("cameras/caco-01/").unwrap(), "cameras/caco-01/");
        assert_eq!(folder_prefix("").unwrap(), "");
        assert!(folder_prefix("cameras/../x/").is_err());
    }

    #[test]
    fn test_transient_classification() {
        let timeout = StoreError::io("k", std::io::Error::new(ErrorKind::TimedOut, "slow"));
        assert!(timeout.is_transient());

        let missing = StoreError::io("k", std::io::Error::new(ErrorKind::NotFound, "gone"));
        assert!(matches!(missing, StoreError::NotFound(_)));
        assert!(!missing.is_transient());

        let denied = StoreError::io("k", std::io::Error::new(ErrorKind::PermissionDenied, "no"));
        assert!(!denied.is_transient());
    }
}
