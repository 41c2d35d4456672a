//! Per-conversation turn serialization.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard held for the duration of one turn.
pub type ConversationGuard = OwnedMutexGuard<()>;

/// At most one in-flight turn per conversation id. Different ids never contend.
#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`.
    pub async fn acquire(&self, conversation_id: &str) -> ConversationGuard {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries only referenced by the map belong to idle conversations
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(conversation_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}
