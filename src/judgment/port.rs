//! Judgment port contract.

use async_trait::async_trait;

use super::schema::{OutputSchema, StructuredValue};
use crate::checkpoint::ToolInvocationRequest;
use crate::prompts::{PromptError, PromptId, PromptVars};
use crate::provider::InternalToolDefinition;

pub type JudgmentResult<T> = Result<T, JudgmentError>;

#[derive(Debug, thiserror::Error)]
pub enum JudgmentError {
    /// Model call failed (transport, HTTP status, malformed response)
    #[error("Model call failed: {0}")]
    Provider(String),

    /// Structured output could not be coerced into the schema
    #[error("Output violates schema '{schema}': {message}")]
    SchemaViolation { schema: String, message: String },

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Model returned an empty response for prompt '{0}'")]
    EmptyResponse(PromptId),
}

impl JudgmentError {
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, JudgmentError::SchemaViolation { .. })
    }

    /// Log label separating contract violations from other port failures.
    pub fn kind(&self) -> &'static str {
        if self.is_schema_violation() {
            "schema_violation"
        } else {
            "port_call"
        }
    }
}

/// Reply to a call made with tools available
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    /// The model answered directly
    Answer(String),
    /// The model asked for one or more tool invocations
    ToolRequests(Vec<ToolInvocationRequest>),
}

/// Language-model judgments used by the graph steps.
#[async_trait]
pub trait JudgmentPort: Send + Sync {
    /// Free-text completion.
    async fn complete(&self, prompt: PromptId, vars: &PromptVars) -> JudgmentResult<String>;

    /// Completion validated against `schema`.
    async fn complete_structured(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        schema: &OutputSchema,
    ) -> JudgmentResult<StructuredValue>;

    /// Completion with `tools` offered; the model either answers or requests tools.
    async fn respond_or_request(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        tools: &[InternalToolDefinition],
    ) -> JudgmentResult<ModelReply>;
}
