//! Provider factory: builds the configured LLM provider.

use crate::config::{EnvironmentLoader, LlmConfig};
use crate::provider::openai::OpenAiProvider;
use crate::provider::LlmProvider;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

/// Factory for creating LLM providers
pub struct ProviderFactory;

impl ProviderFactory {
    /// Create the provider named by `[llm].provider`.
    ///
    /// `OPENAI_BASE_URL` and `LLM_MODEL` override the file; the API key is
    /// only read from the environment.
    pub fn create(config: &LlmConfig, env: &EnvironmentLoader) -> Result<Arc<dyn LlmProvider>> {
        match config.provider.to_lowercase().as_str() {
            "openai" | "openai-compatible" => {
                let api_key = env.openai_api_key().ok_or_else(|| {
                    anyhow::anyhow!("OPENAI_API_KEY is not set; the '{}' provider needs it", config.provider)
                })?;
                let base_url = env
                    .openai_base_url()
                    .unwrap_or_else(|| config.base_url.clone());
                let model = env.llm_model().unwrap_or_else(|| config.model.clone());

                tracing::debug!(provider = "openai", %base_url, %model, "creating provider");
                let provider = OpenAiProvider::new(
                    base_url,
                    api_key,
                    model,
                    Duration::from_secs(config.timeout_seconds),
                )?;
                Ok(Arc::new(provider))
            }
            other => anyhow::bail!(
                "Unknown LLM provider '{}'. Supported providers: openai, openai-compatible",
                other
            ),
        }
    }
}
