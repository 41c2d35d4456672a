//! Weaviate adapter: GraphQL `nearText` search with a server-side vectorizer.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::traits::{Passage, RetrievalError, RetrievalResult, RetrieverPort};

/// Connection settings for a Weaviate cluster
#[derive(Debug, Clone)]
pub struct WeaviateSettings {
    /// Cluster base URL, e.g. `https://my-cluster.weaviate.cloud`
    pub url: String,
    pub api_key: Option<String>,
    /// Forwarded as `X-OpenAI-Api-Key` for the text2vec-openai vectorizer
    pub openai_api_key: Option<String>,
    pub collection: String,
    pub text_property: String,
    pub timeout: Duration,
}

impl WeaviateSettings {
    pub fn new(url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
            openai_api_key: None,
            collection: collection.into(),
            text_property: "text".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.openai_api_key = Some(key.into());
        self
    }

    pub fn with_text_property(mut self, property: impl Into<String>) -> Self {
        self.text_property = property.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

pub struct WeaviateRetriever {
    settings: WeaviateSettings,
    http_client: reqwest::Client,
}

impl WeaviateRetriever {
    pub fn new(settings: WeaviateSettings) -> RetrievalResult<Self> {
        if settings.url.trim().is_empty() {
            return Err(RetrievalError::Configuration(
                "Weaviate URL is required (set WEAVIATE_URL or retriever.url)".into(),
            ));
        }
        validate_identifier("collection", &settings.collection)?;
        validate_identifier("text property", &settings.text_property)?;

        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| RetrievalError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            settings,
            http_client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.settings.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(ref key) = self.settings.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        if let Some(ref key) = self.settings.openai_api_key {
            request = request.header("X-OpenAI-Api-Key", key);
        }
        request
    }

    /// GraphQL document for a nearText search.
    pub fn build_query(&self, query: &str, k: usize) -> RetrievalResult<String> {
        // A JSON string literal is a valid GraphQL string literal
        let concept = serde_json::to_string(query)
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;
        Ok(format!(
            "{{ Get {{ {collection}(nearText: {{concepts: [{concept}]}}, limit: {k}) {{ {property} _additional {{ distance }} }} }} }}",
            collection = self.settings.collection,
            concept = concept,
            k = k,
            property = self.settings.text_property,
        ))
    }

    /// Extract passages from a GraphQL response body.
    pub fn parse_response(&self, body: Value) -> RetrievalResult<Vec<Passage>> {
        let response: GraphQlResponse = serde_json::from_value(body)
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        if let Some(errors) = response.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
            return Err(RetrievalError::InvalidResponse(messages.join("; ")));
        }

        let objects = response
            .data
            .as_ref()
            .and_then(|d| d.get("Get"))
            .and_then(|g| g.get(&self.settings.collection))
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                RetrievalError::InvalidResponse(format!(
                    "missing data.Get.{}",
                    self.settings.collection
                ))
            })?;

        let passages = objects
            .iter()
            .filter_map(|obj| {
                let text = obj.get(&self.settings.text_property)?.as_str()?;
                let mut passage = Passage::new(text);
                if let Some(distance) = obj
                    .get("_additional")
                    .and_then(|a| a.get("distance"))
                    .and_then(|d| d.as_f64())
                {
                    passage = passage.with_score(1.0 - distance as f32);
                }
                Some(passage)
            })
            .collect();

        Ok(passages)
    }
}

fn validate_identifier(what: &str, value: &str) -> RetrievalResult<()> {
    let mut chars = value.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(RetrievalError::Configuration(format!(
            "Invalid Weaviate {}: {:?}",
            what, value
        )));
    }
    Ok(())
}

#[async_trait]
impl RetrieverPort for WeaviateRetriever {
    async fn search(&self, query: &str, k: usize) -> RetrievalResult<Vec<Passage>> {
        let graphql = self.build_query(query, k)?;
        let request = self
            .http_client
            .post(self.endpoint("/v1/graphql"))
            .json(&json!({ "query": graphql }));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RetrievalError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(RetrievalError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| RetrievalError::InvalidResponse(e.to_string()))?;

        let passages = self.parse_response(body)?;
        tracing::debug!(
            collection = %self.settings.collection,
            k,
            returned = passages.len(),
            "weaviate search complete"
        );
        Ok(passages)
    }

    async fn health_check(&self) -> RetrievalResult<()> {
        let request = self.http_client.get(self.endpoint("/v1/.well-known/ready"));
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| RetrievalError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RetrievalError::Unavailable(format!(
                "readiness probe returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "weaviate"
    }
}
