//! Per-request generation settings.

use crate::provider::types::tools::{InternalToolDefinition, ToolChoice};
use serde::{Deserialize, Serialize};

/// Configuration for a generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Model to use (None = provider default)
    pub model: Option<String>,
    /// Sampling temperature, 0.0 to 2.0
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    /// Tools the model may call
    pub tools: Option<Vec<InternalToolDefinition>>,
    pub tool_choice: Option<ToolChoice>,
}

impl GenerateConfig {
    pub fn new() -> Self {
        Self {
            model: None,
            temperature: 0.0,
            max_tokens: Some(1024),
            tools: None,
            tool_choice: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<InternalToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Validate ranges and tool schemas.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!("Temperature must be between 0.0 and 2.0");
        }

        if self.max_tokens == Some(0) {
            anyhow::bail!("Max tokens must be greater than 0");
        }

        if let Some(ref tools) = self.tools {
            for tool in tools {
                tool.validate()?;
            }
        }

        if let Some(ToolChoice::Specific { ref name }) = self.tool_choice {
            let offered = self
                .tools
                .as_ref()
                .map(|tools| tools.iter().any(|t| &t.name == name))
                .unwrap_or(false);
            if !offered {
                anyhow::bail!("Tool choice '{}' is not among the offered tools", name);
            }
        }

        Ok(())
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_tool(name: &str) -> InternalToolDefinition {
        InternalToolDefinition::new(name, "test", json!({"type": "object", "properties": {}}))
    }

    #[test]
    fn test_config_builder() {
        let config = GenerateConfig::new()
            .with_model("gpt-4o")
            .with_temperature(0.4)
            .with_max_tokens(256);

        assert_eq!(config.model, Some("gpt-4o".to_string()));
        assert_eq!(config.temperature, 0.4);
        assert_eq!(config.max_tokens, Some(256));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = GenerateConfig::new();
        config.temperature = 2.1;
        assert!(config.validate().is_err());

        let mut config = GenerateConfig::new();
        config.max_tokens = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_specific_tool_choice_must_be_offered() {
        let config = GenerateConfig::new()
            .with_tools(vec![schema_tool("grade_documents")])
            .with_tool_choice(ToolChoice::Specific {
                name: "grade_documents".into(),
            });
        assert!(config.validate().is_ok());

        let config = GenerateConfig::new().with_tool_choice(ToolChoice::Specific {
            name: "route".into(),
        });
        assert!(config.validate().is_err());
    }
}
