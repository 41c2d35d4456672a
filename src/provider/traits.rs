//! LLM provider abstraction.
//!
//! The judgment layer talks to a model only through [`LlmProvider`], so an
//! OpenAI-compatible endpoint, a local server or a test double are
//! interchangeable.

use crate::provider::types::generate::GenerateConfig;
use crate::provider::types::InternalMessage;
use anyhow::Result;
use std::collections::HashMap;

/// Response from a generation request
#[derive(Debug, Clone, PartialEq)]
pub enum GenerateResponse {
    /// Text content response
    Content(String),
    /// Tool calls requested by the model
    ToolCalls(Vec<ToolInvocation>),
}

/// A tool invocation from the LLM
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    /// Arguments, already parsed from the provider's wire format
    pub arguments: serde_json::Value,
    /// Provider-specific metadata (e.g. finish reason)
    pub provider_metadata: HashMap<String, String>,
}

impl ToolInvocation {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            provider_metadata: HashMap::new(),
        }
    }
}

/// Core trait that all LLM providers implement
///
/// # Example
///
/// ```ignore
/// use lorekeeper::provider::{GenerateConfig, GenerateResponse, InternalMessage, LlmProvider};
///
/// async fn ask(provider: &dyn LlmProvider) -> anyhow::Result<()> {
///     let messages = vec![InternalMessage::user("Who is Dobby?")];
///     let config = GenerateConfig::new().with_temperature(0.0);
///     match provider.generate(messages, &config).await? {
///         GenerateResponse::Content(text) => println!("{}", text),
///         GenerateResponse::ToolCalls(calls) => println!("{} tool calls", calls.len()),
///     }
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a response for `messages`.
    ///
    /// Returns either text content or the tool calls the model requested.
    async fn generate(
        &self,
        messages: Vec<InternalMessage>,
        config: &GenerateConfig,
    ) -> Result<GenerateResponse>;

    /// Provider identifier for logging (e.g. "openai")
    fn provider_name(&self) -> &str;

    /// Model used when `GenerateConfig::model` is unset
    fn default_model(&self) -> String;
}
