//! OpenAI-compatible `chat/completions` provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::provider::traits::{GenerateResponse, LlmProvider, ToolInvocation};
use crate::provider::types::{
    ContentBlock, GenerateConfig, InternalMessage, InternalToolDefinition, MessageContent,
    MessageRole, ToolChoice,
};

/// Error bodies are cut to this many characters in error messages
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

/// Provider for OpenAI and API-compatible servers
pub struct OpenAiProvider {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn to_wire(message: &InternalMessage) -> Result<WireMessage> {
        let role = match message.role {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        };

        let mut wire = WireMessage {
            role,
            content: None,
            tool_calls: Vec::new(),
            tool_call_id: message.tool_call_id.clone(),
            name: None,
        };

        match &message.content {
            MessageContent::Text(text) => wire.content = Some(text.clone()),
            MessageContent::Blocks(blocks) => {
                let mut text_parts = Vec::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => text_parts.push(text.clone()),
                        ContentBlock::ToolUse { id, name, input } => {
                            wire.tool_calls.push(WireToolCall {
                                id: id.clone(),
                                kind: function_type(),
                                function: WireFunctionCall {
                                    name: name.clone(),
                                    arguments: serde_json::to_string(input)?,
                                },
                            });
                        }
                        ContentBlock::ToolResult {
                            tool_use_id,
                            content,
                        } => {
                            wire.tool_call_id.get_or_insert_with(|| tool_use_id.clone());
                            text_parts.push(content.clone());
                        }
                        ContentBlock::Image { .. } => {}
                    }
                }
                if !text_parts.is_empty() || wire.tool_calls.is_empty() {
                    wire.content = Some(text_parts.join("\n"));
                }
            }
        }

        if message.role == MessageRole::Tool {
            wire.name = message.name.clone();
        }

        Ok(wire)
    }

    fn tool_to_wire(tool: &InternalToolDefinition) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": tool.name,
                "description": tool.description,
                "parameters": tool.parameters,
            }
        })
    }

    fn tool_choice_to_wire(choice: &ToolChoice) -> Value {
        match choice {
            ToolChoice::Specific { name } => json!({
                "type": "function",
                "function": { "name": name }
            }),
            other => json!(other.as_str()),
        }
    }

    /// Request body for `chat/completions`.
    fn build_body(&self, messages: &[InternalMessage], config: &GenerateConfig) -> Result<Value> {
        let wire_messages = messages
            .iter()
            .map(Self::to_wire)
            .collect::<Result<Vec<_>>>()?;

        let mut body = json!({
            "model": config.model.clone().unwrap_or_else(|| self.model.clone()),
            "messages": wire_messages,
            "temperature": config.temperature,
        });

        if let Some(max_tokens) = config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(ref tools) = config.tools {
            if !tools.is_empty() {
                body["tools"] = Value::Array(tools.iter().map(Self::tool_to_wire).collect());
                if let Some(ref choice) = config.tool_choice {
                    body["tool_choice"] = Self::tool_choice_to_wire(choice);
                }
            }
        }

        Ok(body)
    }

    fn parse_response(response: ChatResponse) -> Result<GenerateResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .context("Provider returned no choices")?;

        let tool_calls = choice.message.tool_calls.unwrap_or_default();
        if !tool_calls.is_empty() {
            let invocations = tool_calls
                .into_iter()
                .map(|call| {
                    let mut metadata = HashMap::new();
                    if let Some(ref reason) = choice.finish_reason {
                        metadata.insert("finish_reason".to_string(), reason.clone());
                    }
                    let arguments = if call.function.arguments.trim().is_empty() {
                        json!({})
                    } else {
                        match serde_json::from_str(&call.function.arguments) {
                            Ok(value) => value,
                            Err(_) => {
                                metadata.insert("raw_arguments".to_string(), call.function.arguments);
                                Value::Null
                            }
                        }
                    };
                    ToolInvocation {
                        id: call.id,
                        name: call.function.name,
                        arguments,
                        provider_metadata: metadata,
                    }
                })
                .collect();
            return Ok(GenerateResponse::ToolCalls(invocations));
        }

        Ok(GenerateResponse::Content(
            choice.message.content.unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(
        &self,
        messages: Vec<InternalMessage>,
        config: &GenerateConfig,
    ) -> Result<GenerateResponse> {
        config.validate()?;
        let body = self.build_body(&messages, config)?;

        let response = self
            .http_client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", self.endpoint()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(ERROR_BODY_LIMIT).collect();
            anyhow::bail!("Provider returned HTTP {}: {}", status.as_u16(), snippet);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        Self::parse_response(parsed)
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> String {
        self.model.clone()
    }
}
