//! Storage backends
//!
//! The conversation store serializes checkpoints to JSON and hands the bytes
//! to a [`StorageBackend`]. Two implementations ship with the crate:
//!
//! ```text
//! ┌────────────────────────────┐
//! │ BackendConversationStore   │
//! └─────────────┬──────────────┘
//!               │
//! ┌─────────────▼──────────────┐
//! │ StorageBackend (async)     │  <-- Trait
//! └─────────────┬──────────────┘
//!        ┌──────┴──────┐
//!    ┌───▼───┐    ┌────▼───┐
//!    │ File  │    │ Memory │
//!    └───────┘    └────────┘
//! ```
//!
//! ```rust,no_run
//! use lorekeeper::checkpoint::backend::{FileStorageBackend, StorageBackend};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let backend = FileStorageBackend::new("/tmp/lorekeeper")?;
//!     backend.write("conversations/demo.json", b"{}").await?;
//!     let data = backend.read("conversations/demo.json").await?;
//!     assert_eq!(data, b"{}");
//!     Ok(())
//! }
//! ```

mod file_backend;
mod memory_backend;
mod traits;

pub use file_backend::FileStorageBackend;
pub use memory_backend::MemoryStorageBackend;
pub use traits::*;
