//! In-process storage backend. Nothing survives a restart.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::traits::{ListOptions, StorageBackend, StorageError, StorageItemMeta, StorageResult};

#[derive(Default)]
pub struct MemoryStorageBackend {
    entries: RwLock<BTreeMap<String, (Vec<u8>, i64)>>,
}

impl MemoryStorageBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorageBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn write(&self, key: &str, data: &[u8]) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (data.to_vec(), Utc::now().timestamp()));
        Ok(())
    }

    async fn read(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.entries
            .read()
            .await
            .get(key)
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, options: ListOptions) -> StorageResult<Vec<StorageItemMeta>> {
        let prefix = options.prefix.unwrap_or_default();
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, (data, modified_at))| StorageItemMeta {
                key: key.clone(),
                size: data.len() as u64,
                modified_at: *modified_at,
            })
            .collect())
    }
}
