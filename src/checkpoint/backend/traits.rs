//! Byte-level storage traits shared by all conversation backends.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Key not found: {0}")]
    NotFound(String),

    /// Store unreachable (remote backends, poisoned in-process state)
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Metadata about a stored item
#[derive(Debug, Clone)]
pub struct StorageItemMeta {
    pub key: String,
    pub size: u64,
    /// Unix timestamp, seconds
    pub modified_at: i64,
}

/// Options for listing items
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub prefix: Option<String>,
}

impl ListOptions {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}

/// Key/value byte store behind the conversation store.
///
/// Keys are `/`-separated relative paths. Writes replace the whole value.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Backend type name ("file", "memory")
    fn backend_type(&self) -> &'static str;

    /// Whether the backend can currently serve reads and writes.
    async fn is_available(&self) -> bool;

    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()>;

    /// Fails with [`StorageError::NotFound`] for unknown keys.
    async fn read(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Deleting an unknown key is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Items under `options.prefix`, sorted by key.
    async fn list(&self, options: ListOptions) -> StorageResult<Vec<StorageItemMeta>>;
}

/// JSON helpers on top of any [`StorageBackend`].
#[async_trait]
pub trait StorageBackendExt: StorageBackend {
    async fn write_json<T: serde::Serialize + Send + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.write(key, &json).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> StorageResult<T> {
        let data = self.read(key).await?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Deserialization(e.to_string()))
    }
}

impl<T: StorageBackend + ?Sized> StorageBackendExt for T {}

/// Builds a backend from the `[checkpointing]` settings.
pub struct StorageBackendBuilder {
    backend_type: String,
    options: HashMap<String, String>,
}

impl StorageBackendBuilder {
    pub fn new(backend_type: &str) -> Self {
        Self {
            backend_type: backend_type.to_string(),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: &str, value: &str) -> Self {
        self.options.insert(key.to_string(), value.to_string());
        self
    }

    /// Root directory (file backend only)
    pub fn with_base_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_option("base_path", &path.into().to_string_lossy())
    }

    pub fn build(self) -> StorageResult<Arc<dyn StorageBackend>> {
        match self.backend_type.to_lowercase().as_str() {
            "file" | "filesystem" => {
                let base_path = self
                    .options
                    .get("base_path")
                    .ok_or_else(|| StorageError::Configuration("base_path is required".into()))?;
                Ok(Arc::new(super::FileStorageBackend::new(base_path)?))
            }
            "memory" => Ok(Arc::new(super::MemoryStorageBackend::new())),
            unknown => Err(StorageError::Configuration(format!(
                "Unknown backend type: {}",
                unknown
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display() {
        let err = StorageError::NotFound("conversations/abc.json".to_string());
        assert_eq!(err.to_string(), "Key not found: conversations/abc.json");
        assert!(err.is_not_found());

        let err = StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        ));
        assert!(err.to_string().contains("IO error"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_builder_backends() {
        let dir = tempfile::tempdir().unwrap();
        let backend = StorageBackendBuilder::new("file")
            .with_base_path(dir.path())
            .build()
            .unwrap();
        assert_eq!(backend.backend_type(), "file");

        let backend = StorageBackendBuilder::new("Memory").build().unwrap();
        assert_eq!(backend.backend_type(), "memory");
    }

    #[test]
    fn test_builder_errors() {
        match StorageBackendBuilder::new("file").build() {
            Err(StorageError::Configuration(msg)) => assert!(msg.contains("base_path")),
            _ => panic!("expected configuration error"),
        }
        match StorageBackendBuilder::new("postgres").build() {
            Err(StorageError::Configuration(msg)) => assert!(msg.contains("Unknown backend type")),
            _ => panic!("expected configuration error"),
        }
    }
}
