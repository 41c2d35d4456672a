//! Conversation checkpoints
//!
//! Durable conversation state for the turn engine:
//! - the persisted message/state model and its invariant repair
//! - byte-level storage backends (filesystem, in-memory)
//! - a conversation store keyed by conversation id
//! - per-conversation turn locks
//!
//! ## Usage
//!
//! ```rust,no_run
//! use lorekeeper::checkpoint::{open_store, ConversationCheckpoint, CheckpointResult};
//!
//! async fn example() -> CheckpointResult<()> {
//!     let store = open_store("file", Some("/tmp/lorekeeper".as_ref()))?;
//!     let checkpoint = ConversationCheckpoint::new("conv-1");
//!     store.save("conv-1", &checkpoint).await?;
//!     assert!(store.load("conv-1").await?.is_some());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod errors;
pub mod locks;
pub mod models;
pub mod store;

use std::path::Path;
use std::sync::Arc;

pub use backend::{
    FileStorageBackend, MemoryStorageBackend, StorageBackend, StorageBackendBuilder,
    StorageBackendExt, StorageError, StorageResult,
};
pub use errors::{CheckpointError, CheckpointResult};
pub use locks::{ConversationGuard, ConversationLocks};
pub use models::{
    ConversationCheckpoint, ConversationState, Message, PendingTurn, Role, ToolInvocationRequest,
    CHECKPOINT_VERSION,
};
pub use store::{BackendConversationStore, ConversationStore, ConversationSummary};

/// Build a conversation store for a backend type ("file" or "memory").
///
/// `base_path` is required by the file backend and ignored otherwise.
pub fn open_store(
    backend_type: &str,
    base_path: Option<&Path>,
) -> CheckpointResult<Arc<dyn ConversationStore>> {
    let mut builder = StorageBackendBuilder::new(backend_type);
    if let Some(path) = base_path {
        builder = builder.with_base_path(path);
    }
    let backend = builder.build()?;
    Ok(Arc::new(BackendConversationStore::new(backend)))
}
