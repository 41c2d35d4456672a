//! CLI command implementations
//!
//! One module per subcommand. Commands that run turns build a
//! [`RagRuntime`](crate::orchestration::RagRuntime); the read-only ones
//! open the conversation store directly.

pub mod ask;
pub mod chat;
pub mod config;
pub mod conversations;
pub mod history;
pub mod resume;
