//! Retriever port contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result type for retrieval operations
pub type RetrievalResult<T> = Result<T, RetrievalError>;

/// Errors raised by retriever adapters
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Transport failure (connect, timeout, TLS)
    #[error("Retriever request failed: {0}")]
    Http(String),

    #[error("Retriever returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("Invalid retriever response: {0}")]
    InvalidResponse(String),

    #[error("Retriever configuration error: {0}")]
    Configuration(String),

    /// Health check failed
    #[error("Retriever unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A passage returned by a search, most relevant first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    /// Adapter-specific relevance score; larger is better when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score: None,
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }
}

/// Semantic search over the knowledge base.
#[async_trait]
pub trait RetrieverPort: Send + Sync {
    /// Up to `k` passages relevant to `query`, ordered by relevance.
    async fn search(&self, query: &str, k: usize) -> RetrievalResult<Vec<Passage>>;

    /// Probe run once at startup. A failure here is fatal for the service.
    async fn health_check(&self) -> RetrievalResult<()>;

    /// Adapter name for logs
    fn name(&self) -> &str;
}

/// Join passages into one context blob, separated by a blank line.
pub fn join_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| p.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_passages() {
        let passages = vec![
            Passage::new("Harry Potter is a wizard.\n"),
            Passage::new("   "),
            Passage::new("Hedwig is his owl.").with_score(0.4),
        ];
        assert_eq!(
            join_passages(&passages),
            "Harry Potter is a wizard.\n\nHedwig is his owl."
        );
        assert_eq!(join_passages(&[]), "");
    }

    #[test]
    fn test_error_display() {
        let err = RetrievalError::Status {
            status: 503,
            message: "overloaded".into(),
        };
        assert_eq!(err.to_string(), "Retriever returned HTTP 503: overloaded");
    }
}
