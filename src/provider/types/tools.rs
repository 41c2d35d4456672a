//! Provider-agnostic tool definitions.

use serde::{Deserialize, Serialize};

/// A function the model may call: name, description and JSON Schema parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl InternalToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Check the name and that parameters is an object schema with a `type`.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!("Invalid tool name '{}'", self.name);
        }

        let Some(obj) = self.parameters.as_object() else {
            anyhow::bail!("Tool parameters must be a JSON object (schema)");
        };
        if !obj.contains_key("type") {
            anyhow::bail!("Tool parameters schema must have 'type' field");
        }

        Ok(())
    }
}

/// Tool choice option for controlling LLM tool usage
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
    /// Let the LLM decide whether to use tools
    #[default]
    Auto,
    /// Force the LLM to use some tool
    Required,
    /// Prevent the LLM from using tools
    None,
    /// Force one specific tool
    Specific { name: String },
}

impl ToolChoice {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => "auto",
            Self::Required => "required",
            Self::None => "none",
            Self::Specific { .. } => "specific",
        }
    }
}
