//! Conversation state store
//!
//! Durable copy of each conversation between steps. The store is
//! last-writer-wins per conversation id; callers serialize turns on the same
//! id with [`super::ConversationLocks`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use super::backend::{ListOptions, StorageBackend, StorageError};
use super::errors::{CheckpointError, CheckpointResult};
use super::models::{ConversationCheckpoint, CHECKPOINT_VERSION};

const CONVERSATIONS_PREFIX: &str = "conversations/";

/// Listing entry for a stored conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: String,
    pub message_count: usize,
    pub retry_count: u32,
    /// A turn was interrupted and has not been resumed yet
    pub has_pending_turn: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<&ConversationCheckpoint> for ConversationSummary {
    fn from(cp: &ConversationCheckpoint) -> Self {
        Self {
            conversation_id: cp.conversation_id.clone(),
            message_count: cp.state.messages.len(),
            retry_count: cp.state.retry_count,
            has_pending_turn: cp.pending.is_some(),
            updated_at: cp.updated_at,
        }
    }
}

/// Keyed-by-conversation-id checkpoint storage.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// `Ok(None)` when the conversation has never been saved.
    async fn load(&self, conversation_id: &str) -> CheckpointResult<Option<ConversationCheckpoint>>;

    async fn save(
        &self,
        conversation_id: &str,
        checkpoint: &ConversationCheckpoint,
    ) -> CheckpointResult<()>;

    /// Stored conversations, most recently updated first. Unreadable entries are skipped.
    async fn list(&self) -> CheckpointResult<Vec<ConversationSummary>>;

    async fn delete(&self, conversation_id: &str) -> CheckpointResult<()>;

    /// Whether the underlying storage is reachable.
    async fn is_available(&self) -> bool;
}

/// [`ConversationStore`] over any [`StorageBackend`].
pub struct BackendConversationStore {
    backend: Arc<dyn StorageBackend>,
}

impl BackendConversationStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Storage key for a conversation. Ids are arbitrary user text, so they
    /// are hashed rather than used as path components.
    pub fn key_for(conversation_id: &str) -> String {
        let digest = Sha256::digest(conversation_id.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        format!("{}{}.json", CONVERSATIONS_PREFIX, hex)
    }

    fn validate_id(conversation_id: &str) -> CheckpointResult<()> {
        if conversation_id.trim().is_empty() {
            return Err(CheckpointError::InvalidConversationId {
                conversation_id: conversation_id.to_string(),
            });
        }
        Ok(())
    }

    fn decode(conversation_id: &str, data: &[u8]) -> CheckpointResult<ConversationCheckpoint> {
        let checkpoint: ConversationCheckpoint = serde_json::from_slice(data)?;
        if checkpoint.checkpoint_version != CHECKPOINT_VERSION {
            return Err(CheckpointError::VersionMismatch {
                expected: CHECKPOINT_VERSION.to_string(),
                found: checkpoint.checkpoint_version,
            });
        }
        if checkpoint.conversation_id != conversation_id {
            return Err(CheckpointError::corrupted(format!(
                "checkpoint belongs to conversation '{}'",
                checkpoint.conversation_id
            )));
        }
        Ok(checkpoint)
    }
}

#[async_trait]
impl ConversationStore for BackendConversationStore {
    async fn load(&self, conversation_id: &str) -> CheckpointResult<Option<ConversationCheckpoint>> {
        Self::validate_id(conversation_id)?;
        let key = Self::key_for(conversation_id);
        let data = match self.backend.read(&key).await {
            Ok(data) => data,
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Self::decode(conversation_id, &data).map(Some)
    }

    async fn save(
        &self,
        conversation_id: &str,
        checkpoint: &ConversationCheckpoint,
    ) -> CheckpointResult<()> {
        Self::validate_id(conversation_id)?;
        if checkpoint.conversation_id != conversation_id {
            return Err(CheckpointError::InvalidConversationId {
                conversation_id: checkpoint.conversation_id.clone(),
            });
        }
        let data = serde_json::to_vec_pretty(checkpoint)?;
        self.backend
            .write(&Self::key_for(conversation_id), &data)
            .await?;
        tracing::debug!(
            conversation_id,
            step_count = checkpoint.step_count,
            backend = self.backend.backend_type(),
            "checkpoint saved"
        );
        Ok(())
    }

    async fn list(&self) -> CheckpointResult<Vec<ConversationSummary>> {
        let listing = self
            .backend
            .list(ListOptions::with_prefix(CONVERSATIONS_PREFIX))
            .await?;

        let mut summaries = Vec::with_capacity(listing.len());
        for item in listing {
            let data = match self.backend.read(&item.key).await {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(key = %item.key, error = %e, "skipping unreadable checkpoint");
                    continue;
                }
            };
            match serde_json::from_slice::<ConversationCheckpoint>(&data) {
                Ok(cp) => summaries.push(ConversationSummary::from(&cp)),
                Err(e) => {
                    tracing::warn!(key = %item.key, error = %e, "skipping corrupted checkpoint");
                }
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    async fn delete(&self, conversation_id: &str) -> CheckpointResult<()> {
        Self::validate_id(conversation_id)?;
        self.backend.delete(&Self::key_for(conversation_id)).await?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        self.backend.is_available().await
    }
}
