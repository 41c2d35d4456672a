//! Filesystem storage backend
//!
//! One file per key under a base directory. Writes go to a sibling temp file
//! that is renamed into place, so a reader never observes a half-written
//! checkpoint.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::traits::{ListOptions, StorageBackend, StorageError, StorageItemMeta, StorageResult};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File system storage backend
pub struct FileStorageBackend {
    base_path: PathBuf,
}

impl FileStorageBackend {
    /// Create the backend, creating `base_path` if needed.
    pub fn new<P: AsRef<Path>>(base_path: P) -> StorageResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Map a key onto a path below the base directory.
    ///
    /// Only normal components survive, so `..`, roots and prefixes can never
    /// escape `base_path`.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        let mut path = self.base_path.clone();
        let mut pushed = false;
        for component in Path::new(key).components() {
            if let Component::Normal(part) = component {
                path.push(part);
                pushed = true;
            }
        }
        if !pushed {
            return Err(StorageError::Configuration(format!("Invalid storage key: {:?}", key)));
        }
        Ok(path)
    }

    fn path_to_key(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let parts: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(parts.join("/"))
    }

    fn temp_path_for(path: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        path.with_file_name(name)
    }

    fn map_io(key: &str, err: std::io::Error) -> StorageError {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => {
                StorageError::PermissionDenied(format!("{}: {}", key, err))
            }
            _ => StorageError::Io(err),
        }
    }
}

#[async_trait]
impl StorageBackend for FileStorageBackend {
    fn backend_type(&self) -> &'static str {
        "file"
    }

    async fn is_available(&self) -> bool {
        fs::metadata(&self.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let temp_path = Self::temp_path_for(&path);
        let result = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            fs::rename(&temp_path, &path).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Self::map_io(key, err));
        }
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        fs::read(&path).await.map_err(|e| Self::map_io(key, e))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io(key, e)),
        }
    }

    async fn list(&self, options: ListOptions) -> StorageResult<Vec<StorageItemMeta>> {
        let prefix = options.prefix.unwrap_or_default();
        let mut items = Vec::new();
        let mut stack = vec![self.base_path.clone()];

        while let Some(dir) = stack.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(_) => continue,
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(ft) => ft,
                    Err(_) => continue,
                };

                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }
                if !file_type.is_file() {
                    continue;
                }
                // In-flight temp files are not keys
                if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                    continue;
                }
                let Some(key) = self.path_to_key(&path) else {
                    continue;
                };
                if !key.starts_with(&prefix) {
                    continue;
                }

                let metadata = entry.metadata().await?;
                let modified_at = metadata
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);

                items.push(StorageItemMeta {
                    key,
                    size: metadata.len(),
                    modified_at,
                });
            }
        }

        items.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(items)
    }
}
