//! TOML configuration parsing and management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default location of the configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/lorekeeper.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
    pub graph: GraphConfig,
    pub llm: LlmConfig,
    pub retriever: RetrieverConfig,
    pub checkpointing: CheckpointingConfig,
    pub prompts: Option<PromptsConfig>,
}

/// Agent identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub version: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "lorekeeper".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Markdown transcript file. No transcript is written when unset.
    pub log_file: Option<String>,
    pub log_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: "INFO".to_string(),
        }
    }
}

/// Graph topology and loop bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// "graded_retry" or "two_path"
    pub topology: String,
    /// Rewrite cycles allowed before grading is skipped
    pub max_retries: u32,
    /// Hard cap on steps executed in a single turn
    pub max_steps_per_turn: u32,
    /// Messages of prior history shown to the model
    pub max_history_messages: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            topology: "graded_retry".to_string(),
            max_retries: 2,
            max_steps_per_turn: 24,
            max_history_messages: 12,
        }
    }
}

/// Sampling temperature per prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub router: f32,
    pub chit_chat: f32,
    pub respond: f32,
    pub grade: f32,
    pub rewrite: f32,
    pub generate: f32,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        Self {
            router: 0.0,
            chit_chat: 0.7,
            respond: 0.0,
            grade: 0.0,
            rewrite: 0.0,
            generate: 0.4,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperatures: TemperatureConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            timeout_seconds: 60,
            max_tokens: 1024,
            temperatures: TemperatureConfig::default(),
        }
    }
}

/// Retriever configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// "weaviate" or "memory"
    pub backend: String,
    pub collection: String,
    pub text_property: String,
    pub k: usize,
    pub url: Option<String>,
    /// Markdown corpus for the in-memory backend
    pub corpus_path: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            backend: "weaviate".to_string(),
            collection: "HarryPotterCollection".to_string(),
            text_property: "text".to_string(),
            k: 5,
            url: None,
            corpus_path: None,
            timeout_seconds: 30,
        }
    }
}

/// Conversation state store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointingConfig {
    /// "file" or "memory"
    pub backend: String,
    pub base_path: String,
}

impl Default for CheckpointingConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            base_path: "~/.lorekeeper/conversations".to_string(),
        }
    }
}

/// Prompt template overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Directory holding `<prompt_id>.md` files
    pub dir: Option<String>,
}

impl Configuration {
    /// Check value ranges and closed-set strings.
    pub fn validate(&self) -> Result<()> {
        match self.graph.topology.as_str() {
            "graded_retry" | "two_path" => {}
            other => anyhow::bail!("Unknown graph topology: {}", other),
        }
        if self.graph.max_retries == 0 || self.graph.max_retries > 10 {
            anyhow::bail!(
                "graph.max_retries must be between 1 and 10 (got {})",
                self.graph.max_retries
            );
        }
        if self.graph.max_steps_per_turn == 0 {
            anyhow::bail!("graph.max_steps_per_turn must be greater than 0");
        }
        match self.retriever.backend.as_str() {
            "weaviate" | "memory" => {}
            other => anyhow::bail!("Unknown retriever backend: {}", other),
        }
        if self.retriever.k == 0 {
            anyhow::bail!("retriever.k must be greater than 0");
        }
        match self.checkpointing.backend.as_str() {
            "file" | "memory" => {}
            other => anyhow::bail!("Unknown checkpointing backend: {}", other),
        }
        Ok(())
    }

    /// Checkpoint directory with `~` and environment variables expanded.
    pub fn checkpoint_base_path(&self) -> Result<PathBuf> {
        let expanded = shellexpand::full(&self.checkpointing.base_path).with_context(|| {
            format!(
                "Failed to expand checkpoint path: {}",
                self.checkpointing.base_path
            )
        })?;
        Ok(PathBuf::from(expanded.as_ref()))
    }

    /// In-memory retriever corpus with `~` expanded, if configured.
    pub fn corpus_path(&self) -> Option<PathBuf> {
        self.retriever
            .corpus_path
            .as_ref()
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
    }

    /// Prompt override directory with `~` expanded, if configured.
    pub fn prompts_dir(&self) -> Option<PathBuf> {
        self.prompts
            .as_ref()
            .and_then(|p| p.dir.as_ref())
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses `config/lorekeeper.toml`
    ///   when it exists and built-in defaults otherwise.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };
        config
            .validate()
            .with_context(|| format!("Invalid configuration: {}", config_path.display()))?;

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            config,
        })
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Render the resolved configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(&self.config).context("Failed to serialize configuration")
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        let c = &self.config;
        match key {
            "agent.name" => Some(c.agent.name.clone()),
            "agent.version" => Some(c.agent.version.clone()),
            "logging.log_file" => c.logging.log_file.clone(),
            "logging.log_level" => Some(c.logging.log_level.clone()),
            "graph.topology" => Some(c.graph.topology.clone()),
            "llm.provider" => Some(c.llm.provider.clone()),
            "llm.base_url" => Some(c.llm.base_url.clone()),
            "llm.model" => Some(c.llm.model.clone()),
            "retriever.backend" => Some(c.retriever.backend.clone()),
            "retriever.collection" => Some(c.retriever.collection.clone()),
            "retriever.url" => c.retriever.url.clone(),
            "checkpointing.backend" => Some(c.checkpointing.backend.clone()),
            "checkpointing.base_path" => Some(c.checkpointing.base_path.clone()),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        let c = &self.config;
        match key {
            "graph.max_retries" => Some(c.graph.max_retries as u64),
            "graph.max_steps_per_turn" => Some(c.graph.max_steps_per_turn as u64),
            "graph.max_history_messages" => Some(c.graph.max_history_messages as u64),
            "llm.timeout_seconds" => Some(c.llm.timeout_seconds),
            "llm.max_tokens" => Some(c.llm.max_tokens as u64),
            "retriever.k" => Some(c.retriever.k as u64),
            "retriever.timeout_seconds" => Some(c.retriever.timeout_seconds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Configuration::default();
        assert_eq!(config.agent.name, "lorekeeper");
        assert_eq!(config.graph.topology, "graded_retry");
        assert_eq!(config.graph.max_retries, 2);
        assert_eq!(config.retriever.k, 5);
        assert_eq!(config.retriever.collection, "HarryPotterCollection");
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.temperatures.chit_chat, 0.7);
        assert_eq!(config.llm.temperatures.generate, 0.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let loader = ConfigurationLoader::new(Some(Path::new("/nonexistent/lorekeeper.toml"))).unwrap();
        assert_eq!(loader.get_string("graph.topology"), Some("graded_retry".to_string()));
        assert_eq!(loader.get_u64("graph.max_retries"), Some(2));
        assert_eq!(loader.get_string("logging.log_file"), None);
    }

    #[test]
    fn test_partial_toml() {
        let toml_content = r#"
[graph]
topology = "two_path"

[retriever]
backend = "memory"
corpus_path = "corpus/harry_potter.md"
k = 3
"#;
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).unwrap();

        let loader = ConfigurationLoader::new(Some(temp_file.path())).unwrap();
        assert_eq!(loader.config.graph.topology, "two_path");
        // untouched fields keep their defaults
        assert_eq!(loader.config.graph.max_retries, 2);
        assert_eq!(loader.get_u64("retriever.k"), Some(3));
        assert_eq!(loader.config.llm.provider, "openai");
        assert_eq!(
            loader.config.retriever.corpus_path.as_deref(),
            Some("corpus/harry_potter.md")
        );
    }

    #[test]
    fn test_rejects_unknown_topology() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[graph]\ntopology = \"fan_out\"\n").unwrap();
        assert!(ConfigurationLoader::new(Some(temp_file.path())).is_err());
    }

    #[test]
    fn test_rejects_out_of_range_retries() {
        let mut config = Configuration::default();
        config.graph.max_retries = 0;
        assert!(config.validate().is_err());
        config.graph.max_retries = 11;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_checkpoint_path_expansion() {
        let mut config = Configuration::default();
        config.checkpointing.base_path = "/var/lib/lorekeeper".to_string();
        assert_eq!(
            config.checkpoint_base_path().unwrap(),
            PathBuf::from("/var/lib/lorekeeper")
        );
    }

    #[test]
    fn test_toml_roundtrip_of_resolved_config() {
        let loader = ConfigurationLoader::from_config(Configuration::default()).unwrap();
        let rendered = loader.to_toml().unwrap();
        assert!(rendered.contains("[graph]"));
        let parsed: Configuration = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.graph.max_retries, 2);
    }
}
