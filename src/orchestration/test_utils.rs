//! Scripted port doubles for exercising the graph without a model or index.
//!
//! ```rust
//! use lorekeeper::orchestration::test_utils::{ScriptedJudge, StaticRetriever};
//! use lorekeeper::prompts::PromptId;
//! use serde_json::json;
//!
//! let judge = ScriptedJudge::new()
//!     .tool_request("Dobby")
//!     .structured(PromptId::Grade, json!({"binary_score": true}))
//!     .text(PromptId::Generate, "Dobby is a house-elf.");
//! let retriever = StaticRetriever::new(["Dobby is a house-elf."]);
//! ```

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use super::steps::RETRIEVE_TOOL;
use crate::checkpoint::ToolInvocationRequest;
use crate::judgment::{
    JudgmentError, JudgmentPort, JudgmentResult, ModelReply, OutputSchema, StructuredValue,
};
use crate::prompts::{PromptId, PromptVars};
use crate::provider::InternalToolDefinition;
use crate::retriever::{Passage, RetrievalError, RetrievalResult, RetrieverPort};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Json(Value),
    Tools(Vec<ToolInvocationRequest>),
    Fail(String),
}

/// [`JudgmentPort`] replaying queued replies per prompt.
///
/// Structured replies are raw JSON and go through the real schema
/// validation, so malformed values surface as schema violations. A prompt
/// with nothing queued fails like a provider error.
#[derive(Debug, Default)]
pub struct ScriptedJudge {
    replies: Mutex<HashMap<PromptId, VecDeque<Reply>>>,
    calls: Mutex<Vec<(PromptId, PromptVars)>>,
    tool_ids: AtomicUsize,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, prompt: PromptId, reply: Reply) -> Self {
        self.replies
            .get_mut()
            .entry(prompt)
            .or_default()
            .push_back(reply);
        self
    }

    /// Queue a free-text reply.
    pub fn text(self, prompt: PromptId, text: impl Into<String>) -> Self {
        self.push(prompt, Reply::Text(text.into()))
    }

    /// Queue a raw structured reply.
    pub fn structured(self, prompt: PromptId, value: Value) -> Self {
        self.push(prompt, Reply::Json(value))
    }

    /// Queue a failure for `prompt`.
    pub fn fail(self, prompt: PromptId, message: impl Into<String>) -> Self {
        self.push(prompt, Reply::Fail(message.into()))
    }

    /// Queue a `retrieve_passages` request from `generate_query_or_respond`.
    pub fn tool_request(self, query: impl Into<String>) -> Self {
        let id = format!("call_{}", self.tool_ids.fetch_add(1, Ordering::SeqCst) + 1);
        let request = ToolInvocationRequest::new(id, RETRIEVE_TOOL, json!({"query": query.into()}));
        self.push(PromptId::GenerateQueryOrRespond, Reply::Tools(vec![request]))
    }

    /// Queue a raw tool request list from `generate_query_or_respond`.
    pub fn tool_requests(self, requests: Vec<ToolInvocationRequest>) -> Self {
        self.push(PromptId::GenerateQueryOrRespond, Reply::Tools(requests))
    }

    /// Queue a direct answer from `generate_query_or_respond`.
    pub fn answer(self, text: impl Into<String>) -> Self {
        self.text(PromptId::GenerateQueryOrRespond, text)
    }

    /// Every call so far, in order.
    pub async fn calls(&self) -> Vec<(PromptId, PromptVars)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self, prompt: PromptId) -> usize {
        self.calls.lock().await.iter().filter(|(p, _)| *p == prompt).count()
    }

    /// Replies queued but never consumed.
    pub async fn remaining(&self) -> usize {
        self.replies.lock().await.values().map(VecDeque::len).sum()
    }

    async fn next(&self, prompt: PromptId, vars: &PromptVars) -> JudgmentResult<Reply> {
        self.calls.lock().await.push((prompt, vars.clone()));
        let reply = self
            .replies
            .lock()
            .await
            .get_mut(&prompt)
            .and_then(VecDeque::pop_front);
        match reply {
            Some(Reply::Fail(message)) => Err(JudgmentError::Provider(message)),
            Some(reply) => Ok(reply),
            None => Err(JudgmentError::Provider(format!(
                "no scripted reply for prompt '{}'",
                prompt
            ))),
        }
    }
}

#[async_trait]
impl JudgmentPort for ScriptedJudge {
    async fn complete(&self, prompt: PromptId, vars: &PromptVars) -> JudgmentResult<String> {
        match self.next(prompt, vars).await? {
            Reply::Text(text) => Ok(text),
            other => Err(JudgmentError::Provider(format!(
                "scripted {:?} cannot answer a text call",
                other
            ))),
        }
    }

    async fn complete_structured(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        schema: &OutputSchema,
    ) -> JudgmentResult<StructuredValue> {
        match self.next(prompt, vars).await? {
            Reply::Json(value) => schema.validate(&value),
            Reply::Text(text) => schema.validate(&Value::String(text)),
            other => Err(JudgmentError::Provider(format!(
                "scripted {:?} cannot answer a structured call",
                other
            ))),
        }
    }

    async fn respond_or_request(
        &self,
        prompt: PromptId,
        vars: &PromptVars,
        _tools: &[InternalToolDefinition],
    ) -> JudgmentResult<ModelReply> {
        match self.next(prompt, vars).await? {
            Reply::Text(text) => Ok(ModelReply::Answer(text)),
            Reply::Tools(requests) => Ok(ModelReply::ToolRequests(requests)),
            other => Err(JudgmentError::Provider(format!(
                "scripted {:?} cannot answer a tool call",
                other
            ))),
        }
    }
}

/// [`RetrieverPort`] returning the same passages for every query.
#[derive(Debug, Default)]
pub struct StaticRetriever {
    passages: Vec<Passage>,
    calls: AtomicUsize,
    queries: Mutex<Vec<String>>,
}

impl StaticRetriever {
    pub fn new<I, S>(passages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            passages: passages.into_iter().map(Passage::new).collect(),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Queries received, in order.
    pub async fn queries(&self) -> Vec<String> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl RetrieverPort for StaticRetriever {
    async fn search(&self, query: &str, k: usize) -> RetrievalResult<Vec<Passage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().await.push(query.to_string());
        Ok(self.passages.iter().take(k).cloned().collect())
    }

    async fn health_check(&self) -> RetrievalResult<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// [`RetrieverPort`] whose every call fails.
#[derive(Debug, Default)]
pub struct FailingRetriever {
    calls: AtomicUsize,
}

impl FailingRetriever {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RetrieverPort for FailingRetriever {
    async fn search(&self, _query: &str, _k: usize) -> RetrievalResult<Vec<Passage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RetrievalError::Unavailable("index offline".into()))
    }

    async fn health_check(&self) -> RetrievalResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RetrievalError::Unavailable("index offline".into()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}
