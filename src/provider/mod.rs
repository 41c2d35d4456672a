//! LLM provider abstraction module
//!
//! Provider trait, request types and the OpenAI-compatible HTTP provider.

pub mod factory;
pub mod openai;
pub mod traits;
pub mod types;

// Re-export main types
pub use factory::ProviderFactory;
pub use openai::OpenAiProvider;
pub use traits::{GenerateResponse, LlmProvider, ToolInvocation};
pub use types::{
    ContentBlock, GenerateConfig, InternalMessage, InternalToolDefinition, MessageContent,
    MessageRole, ToolChoice,
};
