//! Environment variable loading and management.
//!
//! Secrets (API keys) are only ever read from the environment, never from the
//! TOML configuration. Non-secret values found here override the TOML file.

use std::env;
use std::path::Path;

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. Nothing is loaded when None, so tests
    ///   never pick up a developer's local `.env`.
    pub fn new(env_file: Option<&Path>) -> Self {
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!("Failed to load .env file {}: {}", path.display(), e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was created with, if any.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    fn non_empty(name: &str) -> Option<String> {
        env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    /// API key for the OpenAI-compatible chat endpoint.
    pub fn openai_api_key(&self) -> Option<String> {
        Self::non_empty("OPENAI_API_KEY")
    }

    /// Base URL override for the chat endpoint.
    pub fn openai_base_url(&self) -> Option<String> {
        Self::non_empty("OPENAI_BASE_URL")
    }

    /// Model override.
    pub fn llm_model(&self) -> Option<String> {
        Self::non_empty("LLM_MODEL")
    }

    /// Weaviate cluster URL.
    pub fn weaviate_url(&self) -> Option<String> {
        Self::non_empty("WEAVIATE_URL")
    }

    /// Weaviate API key.
    pub fn weaviate_api_key(&self) -> Option<String> {
        Self::non_empty("WEAVIATE_API_KEY")
    }

    /// Weaviate collection override.
    pub fn weaviate_collection(&self) -> Option<String> {
        Self::non_empty("WEAVIATE_COLLECTION")
    }

    /// Data directory override for conversation checkpoints.
    pub fn data_dir(&self) -> Option<String> {
        Self::non_empty("LOREKEEPER_DATA_DIR")
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weaviate_collection_override() {
        env::remove_var("WEAVIATE_COLLECTION");
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.weaviate_collection(), None);

        env::set_var("WEAVIATE_COLLECTION", "MEETUP");
        assert_eq!(env_loader.weaviate_collection(), Some("MEETUP".to_string()));

        env::set_var("WEAVIATE_COLLECTION", "   ");
        assert_eq!(env_loader.weaviate_collection(), None);

        env::remove_var("WEAVIATE_COLLECTION");
    }

    #[test]
    fn test_env_file_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "LOREKEEPER_DATA_DIR=/tmp/lorekeeper-test\n").unwrap();

        env::remove_var("LOREKEEPER_DATA_DIR");
        let env_loader = EnvironmentLoader::new(Some(&path));
        assert_eq!(env_loader.env_file(), Some(path.to_string_lossy().as_ref()));
        assert_eq!(env_loader.data_dir(), Some("/tmp/lorekeeper-test".to_string()));
        env::remove_var("LOREKEEPER_DATA_DIR");
    }

    #[test]
    fn test_no_env_file() {
        let env_loader = EnvironmentLoader::new(None);
        assert!(env_loader.env_file().is_none());
    }
}
