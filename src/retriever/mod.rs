//! Retriever port and adapters
//!
//! The turn engine only sees [`RetrieverPort`]. Two adapters ship with the
//! crate: [`WeaviateRetriever`] for the hosted vector index and
//! [`InMemoryRetriever`] for offline runs over a markdown corpus.

pub mod memory;
pub mod traits;
pub mod weaviate;

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Configuration, EnvironmentLoader};

pub use memory::InMemoryRetriever;
pub use traits::{join_passages, Passage, RetrievalError, RetrievalResult, RetrieverPort};
pub use weaviate::{WeaviateRetriever, WeaviateSettings};

/// Build the retriever selected by `[retriever].backend`.
///
/// Environment values (`WEAVIATE_URL`, `WEAVIATE_API_KEY`,
/// `WEAVIATE_COLLECTION`, `OPENAI_API_KEY`) take precedence over the file.
pub async fn build_retriever(
    config: &Configuration,
    env: &EnvironmentLoader,
) -> RetrievalResult<Arc<dyn RetrieverPort>> {
    let retriever_config = &config.retriever;
    match retriever_config.backend.as_str() {
        "weaviate" => {
            let url = env
                .weaviate_url()
                .or_else(|| retriever_config.url.clone())
                .unwrap_or_default();
            let collection = env
                .weaviate_collection()
                .unwrap_or_else(|| retriever_config.collection.clone());

            let mut settings = WeaviateSettings::new(url, collection)
                .with_text_property(retriever_config.text_property.clone())
                .with_timeout(Duration::from_secs(retriever_config.timeout_seconds));
            if let Some(key) = env.weaviate_api_key() {
                settings = settings.with_api_key(key);
            }
            if let Some(key) = env.openai_api_key() {
                settings = settings.with_openai_api_key(key);
            }
            Ok(Arc::new(WeaviateRetriever::new(settings)?))
        }
        "memory" => {
            let path = config.corpus_path().ok_or_else(|| {
                RetrievalError::Configuration(
                    "retriever.corpus_path is required for the memory backend".into(),
                )
            })?;
            Ok(Arc::new(InMemoryRetriever::from_file(&path).await?))
        }
        other => Err(RetrievalError::Configuration(format!(
            "Unknown retriever backend: {}",
            other
        ))),
    }
}
