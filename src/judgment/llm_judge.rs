//! Judgment port backed by an [`LlmProvider`].

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::port::{JudgmentError, JudgmentPort, JudgmentResult, ModelReply};
use super::schema::{OutputSchema, StructuredValue};
use crate::checkpoint::ToolInvocationRequest;
use crate::config::LlmConfig;
use crate::observability::Logger;
use crate::prompts::{PromptId, PromptLibrary, PromptVars};
use crate::provider::{
    GenerateConfig, GenerateResponse, InternalMessage, InternalToolDefinition, LlmProvider,
    ToolChoice,
};

/// Per-prompt sampling settings
#[derive(Debug, Clone)]
pub struct JudgeSettings {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub temperatures: HashMap<PromptId, f32>,
}

impl JudgeSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        let t = &config.temperatures;
        let temperatures = HashMap::from([
            (PromptId::Router, t.router),
            (PromptId::ChitChat, t.chit_chat),
            (PromptId::GenerateQueryOrRespond, t.respond),
            (PromptId::Grade, t.grade),
            (PromptId::Rewrite, t.rewrite),
            (PromptId::Generate, t.generate),
        ]);
        Self {
            model: None,
            max_tokens: config.max_tokens,
            temperatures,
        }
    }

    pub fn temperature(&self, prompt: PromptId) -> f32 {
        self.temperatures.get(&prompt).copied().unwrap_or(0.0)
    }
}

impl Default for JudgeSettings {
    fn default() -> Self {
        Self::from_config(&LlmConfig::default())
    }
}

/// First JSON object embedded in free text (e.g. inside a markdown fence).
pub fn extract_json_object(text: &str) -> Option<Value> {
    text.match_indices('{').find_map(|(start, _)| {
        serde_json::Deserializer::from_str(&text[start..])
            .into_iter::<Value>()
            .next()
            .and_then(Result::ok)
            .filter(Value::is_object)
    })
}

pub struct LlmJudge {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptLibrary,
    settings: JudgeSettings,
    logger: Option<Arc<Logger>>,
}

impl LlmJudge {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: PromptLibrary, settings: JudgeSettings) -> Self {
        Self {
            provider,
            prompts,
            settings,
            logger: None,
        }
    }

    /// Also write rendered prompts to the transcript (DEBUG level only).
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    fn request(&self, prompt: PromptId, vars: &PromptVars) -> JudgmentResult<(Vec<InternalMessage>, GenerateConfig)> {
        let rendered = self.prompts.render(prompt, vars)?;
        if let Some(ref logger) = self.logger {
            if let Err(e) = logger.log_prompt(prompt.as_str(), &rendered) {
                tracing::warn!(error = %e, "failed to write prompt to transcript");
            }
        }

        let mut config = GenerateConfig::new()
            .with_temperature(self.settings.temperature(prompt))
            .with_max_tokens(self.settings.max_tokens);
        if let Some(ref model) = self.settings.model {
            config = config.with_model(model.clone());
        }
        Ok((vec![InternalMessage::user(rendered)], config))
    }

    async fn generate(
        &self,
        prompt: PromptId,
        messages: Vec<InternalMessage>,
        config: &GenerateConfig,
    ) -> JudgmentResult<GenerateResponse> {
        tracing::debug!(
            prompt = %prompt,
            provider = self.provider.provider_name(),
            temperature = config.temperature,
            "calling model"
        );
        self.provider
            .generate(messages, config)
            .await
            .map_err(|e| JudgmentError::Provider(format!("{:#}", e)))
    }
}

#[async_trait]
impl JudgmentPort for LlmJudge {
    async fn complete(&self, prompt: PromptId, vars: &PromptVars) -> JudgmentResult<String> {
        let (messages, config) = self.request(prompt, vars)?;
        match self.generate(prompt, messages, &config).await? {
            GenerateResponse::Content(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            GenerateResponse::Content(_) => Err(JudgmentError::EmptyResponse(prompt)),
            GenerateResponse::ToolCalls(calls) => Err(JudgmentError::Provider(format!(
                "expected text, model requested {} tool call(s)",
                calls.len()
            ))),
        }
    }

    async fn complete_structured(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        schema: &OutputSchema,
    ) -> JudgmentResult<StructuredValue> {
        let (messages, config) = self.request(prompt, vars)?;
        let config = config
            .with_tools(vec![schema.tool_definition()])
            .with_tool_choice(ToolChoice::Specific {
                name: schema.name.to_string(),
            });

        match self.generate(prompt, messages, &config).await? {
            GenerateResponse::ToolCalls(calls) => {
                let call = calls
                    .iter()
                    .find(|c| c.name == schema.name)
                    .or_else(|| calls.first())
                    .ok_or(JudgmentError::EmptyResponse(prompt))?;
                schema.validate(&call.arguments)
            }
            GenerateResponse::Content(text) => {
                let value = extract_json_object(&text)
                    .unwrap_or_else(|| Value::String(text.trim().to_string()));
                schema.validate(&value)
            }
        }
    }

    async fn respond_or_request(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        tools: &[InternalToolDefinition],
    ) -> JudgmentResult<ModelReply> {
        let (messages, mut config) = self.request(prompt, vars)?;
        if !tools.is_empty() {
            config = config
                .with_tools(tools.to_vec())
                .with_tool_choice(ToolChoice::Auto);
        }

        match self.generate(prompt, messages, &config).await? {
            GenerateResponse::Content(text) if !text.trim().is_empty() => {
                Ok(ModelReply::Answer(text.trim().to_string()))
            }
            GenerateResponse::Content(_) => Err(JudgmentError::EmptyResponse(prompt)),
            GenerateResponse::ToolCalls(calls) => Ok(ModelReply::ToolRequests(
                calls
                    .into_iter()
                    .map(|c| ToolInvocationRequest::new(c.id, c.name, c.arguments))
                    .collect(),
            )),
        }
    }
}
