//! Provider request/response types

pub mod generate;
pub mod tools;

pub use generate::GenerateConfig;
pub use tools::{InternalToolDefinition, ToolChoice};

// Message format shared with every provider
pub use umf::{ContentBlock, InternalMessage, MessageContent, MessageRole};
