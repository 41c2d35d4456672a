//! Step implementations.
//!
//! Every step reads the state, calls at most the judgment and retriever
//! ports, and returns a [`StepOutcome`]. Port failures are recovered here and
//! never leave the step.

use serde_json::json;

use super::engine::EngineSettings;
use super::graph::{Decision, GradeDecision, Node, StepOutcome, Topology};
use super::state::{render_history, StatePatch};
use crate::checkpoint::{ConversationState, Message, Role};
use crate::judgment::{JudgmentError, JudgmentPort, ModelReply, OutputSchema, RouteDecision};
use crate::observability::Logger;
use crate::prompts::{prompt_vars, PromptId};
use crate::provider::InternalToolDefinition;
use crate::retriever::{join_passages, RetrieverPort};

/// Reply when the chit-chat model call fails.
pub const CHIT_CHAT_FALLBACK: &str = "Hello! How can I help you with Harry Potter today?";

/// Reply when an answer cannot be produced.
pub const GENERATE_FALLBACK: &str =
    "I apologize, but I encountered an error generating a response. Please try asking your question again.";

/// Context bound into the generate prompt when nothing was retrieved.
pub const NO_CONTEXT: &str = "No context available";

/// Question used when the turn has no usable human message.
pub const DEFAULT_QUESTION: &str = "Please provide a question about Harry Potter.";

/// Name of the retrieval tool offered to the model.
pub const RETRIEVE_TOOL: &str = "retrieve_passages";

/// Tool the model may request from `generate_query_or_respond`.
pub fn retrieval_tool() -> InternalToolDefinition {
    InternalToolDefinition::new(
        RETRIEVE_TOOL,
        "Search the Harry Potter books for passages relevant to a query.",
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query describing the information needed"
                }
            },
            "required": ["query"]
        }),
    )
}

/// Collaborators and turn bookkeeping a step runs with.
pub struct StepContext<'a> {
    pub judge: &'a dyn JudgmentPort,
    pub retriever: &'a dyn RetrieverPort,
    pub settings: &'a EngineSettings,
    pub logger: Option<&'a Logger>,
    /// Index of the human message that opened the turn
    pub turn_start: usize,
}

impl StepContext<'_> {
    fn transcript<F>(&self, write: F)
    where
        F: FnOnce(&Logger) -> anyhow::Result<()>,
    {
        if let Some(logger) = self.logger {
            if let Err(e) = write(logger) {
                tracing::warn!(error = %e, "transcript write failed");
            }
        }
    }

    fn port_failure(&self, node: Node, kind: &str, error: &str) {
        tracing::warn!(step = %node, kind, error, "recovered port failure");
        self.transcript(|l| l.log_port_error(node.as_str(), kind, error));
    }

    fn judgment_failure(&self, node: Node, error: &JudgmentError) {
        self.port_failure(node, error.kind(), &error.to_string());
    }

    fn question(&self, state: &ConversationState) -> String {
        state
            .latest_human_question(self.turn_start)
            .unwrap_or(DEFAULT_QUESTION)
            .to_string()
    }

    fn history(&self, state: &ConversationState) -> String {
        render_history(state, self.turn_start, self.settings.max_history_messages)
    }

    /// The question as the user typed it, before any rewrite.
    fn original_question(&self, state: &ConversationState) -> String {
        state
            .messages
            .get(self.turn_start)
            .filter(|m| m.role() == Role::Human && !m.content().trim().is_empty())
            .map(|m| m.content().to_string())
            .unwrap_or_else(|| self.question(state))
    }
}

/// Run `node` under the settings' topology.
pub async fn run_step(node: Node, ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    match (node, ctx.settings.topology) {
        (Node::Router, _) => router(ctx, state).await,
        (Node::ChitChat, _) => chit_chat(ctx, state).await,
        (Node::Generate, Topology::TwoPath) => retrieve_and_generate(ctx, state).await,
        (Node::Generate, Topology::GradedRetry) => generate(ctx, state).await,
        (Node::GenerateQueryOrRespond, _) => generate_query_or_respond(ctx, state).await,
        (Node::Retrieve, _) => retrieve(ctx, state).await,
        (Node::GradeDocuments, _) => grade_documents(ctx, state).await,
        (Node::Rewrite, _) => rewrite(ctx, state).await,
    }
}

async fn router(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let vars = prompt_vars([("question", ctx.question(state)), ("history", ctx.history(state))]);
    let (route, defaulted) = match ctx
        .judge
        .complete_structured(PromptId::Router, &vars, &OutputSchema::route())
        .await
        .map(|v| v.as_route())
    {
        Ok(Some(route)) => (route, false),
        Ok(None) => {
            ctx.port_failure(Node::Router, "schema_violation", "structured value is not a route");
            (RouteDecision::ChitChat, true)
        }
        Err(e) => {
            ctx.judgment_failure(Node::Router, &e);
            (RouteDecision::ChitChat, true)
        }
    };

    tracing::info!(route = %route, defaulted, "route decided");
    ctx.transcript(|l| l.log_route_decision(route.as_str(), defaulted));
    StepOutcome::new(StatePatch::new(), format!("routed to {}", route))
        .with_decision(Decision::Route(route))
}

async fn chit_chat(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let vars = prompt_vars([("question", ctx.question(state)), ("history", ctx.history(state))]);
    let reply = match ctx.judge.complete(PromptId::ChitChat, &vars).await {
        Ok(text) => text,
        Err(e) => {
            ctx.judgment_failure(Node::ChitChat, &e);
            CHIT_CHAT_FALLBACK.to_string()
        }
    };
    StepOutcome::new(
        StatePatch::new().append(Message::ai(reply)).with_retry_count(0),
        "answered conversationally",
    )
}

/// Two-path generation: retrieve for the question, then answer from it.
async fn retrieve_and_generate(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let question = ctx.question(state);

    let passages = match ctx.retriever.search(&question, ctx.settings.k).await {
        Ok(passages) => passages,
        Err(e) => {
            ctx.port_failure(Node::Generate, "port_call", &e.to_string());
            return StepOutcome::new(
                StatePatch::new()
                    .append(Message::ai(GENERATE_FALLBACK))
                    .with_retry_count(0),
                "retrieval failed; fallback answer",
            );
        }
    };

    let context = match join_passages(&passages) {
        joined if joined.is_empty() => NO_CONTEXT.to_string(),
        joined => joined,
    };
    let vars = prompt_vars([("question", question), ("context", context)]);
    let (reply, summary) = match ctx.judge.complete(PromptId::Generate, &vars).await {
        Ok(text) => (text, format!("answered from {} passage(s)", passages.len())),
        Err(e) => {
            ctx.judgment_failure(Node::Generate, &e);
            (GENERATE_FALLBACK.to_string(), "generation failed; fallback answer".to_string())
        }
    };
    StepOutcome::new(
        StatePatch::new().append(Message::ai(reply)).with_retry_count(0),
        summary,
    )
}

async fn generate_query_or_respond(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let vars = prompt_vars([("question", ctx.question(state)), ("history", ctx.history(state))]);
    let tools = [retrieval_tool()];

    match ctx
        .judge
        .respond_or_request(PromptId::GenerateQueryOrRespond, &vars, &tools)
        .await
    {
        Ok(ModelReply::ToolRequests(requests)) if !requests.is_empty() => {
            let summary = format!("requested {} tool call(s)", requests.len());
            StepOutcome::new(
                StatePatch::new().append(Message::ai_tool_request("", requests)),
                summary,
            )
        }
        Ok(ModelReply::ToolRequests(_)) => {
            ctx.port_failure(
                Node::GenerateQueryOrRespond,
                "port_call",
                "tool request without any tool calls",
            );
            fallback_answer()
        }
        Ok(ModelReply::Answer(text)) => StepOutcome::new(
            StatePatch::new().append(Message::ai(text)).with_retry_count(0),
            "answered directly",
        ),
        Err(e) => {
            ctx.judgment_failure(Node::GenerateQueryOrRespond, &e);
            fallback_answer()
        }
    }
}

fn fallback_answer() -> StepOutcome {
    StepOutcome::new(
        StatePatch::new()
            .append(Message::ai(GENERATE_FALLBACK))
            .with_retry_count(0),
        "fallback answer",
    )
}

async fn retrieve(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let requests = state
        .last_message()
        .map(|m| m.tool_calls().to_vec())
        .unwrap_or_default();

    let mut patch = StatePatch::new();
    let mut found = 0;
    for request in &requests {
        if request.name != RETRIEVE_TOOL {
            tracing::warn!(tool = %request.name, "model requested an unknown tool");
            patch = patch.append(Message::tool(
                format!("Unknown tool '{}'", request.name),
                request.id.clone(),
                request.name.clone(),
            ));
            continue;
        }

        let query = request
            .string_argument("query")
            .map(str::to_string)
            .unwrap_or_else(|| ctx.question(state));
        tracing::debug!(query = %query, retriever = ctx.retriever.name(), "retrieving passages");

        let content = match ctx.retriever.search(&query, ctx.settings.k).await {
            Ok(passages) => {
                found += passages.len();
                join_passages(&passages)
            }
            Err(e) => {
                ctx.port_failure(Node::Retrieve, "port_call", &e.to_string());
                String::new()
            }
        };
        patch = patch.append(Message::tool(content, request.id.clone(), RETRIEVE_TOOL));
    }

    StepOutcome::new(
        patch,
        format!("ran {} tool call(s), {} passage(s)", requests.len(), found),
    )
}

async fn grade_documents(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let decide = |decision: GradeDecision, reason: &str, patch: StatePatch| {
        tracing::info!(decision = decision.as_str(), reason, "documents graded");
        ctx.transcript(|l| l.log_grade_decision(decision.as_str(), reason));
        StepOutcome::new(patch, format!("{} ({})", decision.as_str(), reason))
            .with_decision(Decision::Grade(decision))
    };

    if state.retry_count >= ctx.settings.max_retries {
        return decide(GradeDecision::Generate, "retry limit reached", StatePatch::new());
    }

    let question = state.latest_human_question(ctx.turn_start);
    let context = state.latest_tool_content(ctx.turn_start);
    let (Some(question), Some(context)) = (question, context) else {
        return decide(GradeDecision::Generate, "nothing to grade", StatePatch::new());
    };

    let vars = prompt_vars([
        ("question", question.to_string()),
        ("context", context.to_string()),
    ]);
    let relevant = match ctx
        .judge
        .complete_structured(PromptId::Grade, &vars, &OutputSchema::relevance())
        .await
        .map(|v| v.as_relevance())
    {
        Ok(Some(relevant)) => relevant,
        Ok(None) => {
            ctx.port_failure(
                Node::GradeDocuments,
                "schema_violation",
                "structured value is not a relevance score",
            );
            return decide(GradeDecision::Generate, "grading failed", StatePatch::new());
        }
        Err(e) => {
            ctx.judgment_failure(Node::GradeDocuments, &e);
            return decide(GradeDecision::Generate, "grading failed", StatePatch::new());
        }
    };

    if relevant {
        decide(GradeDecision::Generate, "relevant", StatePatch::new())
    } else {
        let retry_count = state.retry_count + 1;
        decide(
            GradeDecision::Rewrite,
            "not relevant",
            StatePatch::new().with_retry_count(retry_count),
        )
    }
}

async fn rewrite(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let original = ctx.original_question(state);
    let vars = prompt_vars([("question", original.clone())]);

    match ctx.judge.complete(PromptId::Rewrite, &vars).await {
        Ok(rewritten) => {
            tracing::debug!(rewritten = %rewritten, "question rewritten");
            StepOutcome::new(
                StatePatch::new().append(Message::rewritten_question(rewritten)),
                "question rewritten",
            )
        }
        Err(e) => {
            ctx.judgment_failure(Node::Rewrite, &e);
            StepOutcome::new(
                StatePatch::new().append(Message::rewritten_question(original)),
                "rewrite failed; original question reused",
            )
        }
    }
}

/// Graded-retry generation from the turn's latest retrieved context.
async fn generate(ctx: &StepContext<'_>, state: &ConversationState) -> StepOutcome {
    let context = state
        .latest_tool_content(ctx.turn_start)
        .unwrap_or(NO_CONTEXT)
        .to_string();
    let vars = prompt_vars([("question", ctx.question(state)), ("context", context)]);

    let (reply, summary) = match ctx.judge.complete(PromptId::Generate, &vars).await {
        Ok(text) => (text, "answered from retrieved context"),
        Err(e) => {
            ctx.judgment_failure(Node::Generate, &e);
            (GENERATE_FALLBACK.to_string(), "generation failed; fallback answer")
        }
    };
    StepOutcome::new(
        StatePatch::new().append(Message::ai(reply)).with_retry_count(0),
        summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::ToolInvocationRequest;
    use crate::orchestration::test_utils::{FailingRetriever, ScriptedJudge, StaticRetriever};

    fn settings(topology: Topology) -> EngineSettings {
        EngineSettings {
            topology,
            ..EngineSettings::default()
        }
    }

    fn state_with(messages: Vec<Message>, retry_count: u32) -> ConversationState {
        ConversationState {
            messages,
            retry_count,
        }
    }

    fn tool_request(query: serde_json::Value) -> Message {
        Message::ai_tool_request(
            "",
            vec![ToolInvocationRequest::new("call_1", RETRIEVE_TOOL, query)],
        )
    }

    #[tokio::test]
    async fn test_grade_skips_judge_at_retry_limit() {
        let judge = ScriptedJudge::new().structured(PromptId::Grade, json!({"binary_score": false}));
        let retriever = StaticRetriever::new(["Dobby is a house-elf."]);
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(
            vec![
                Message::human("Who is Dobby?"),
                tool_request(json!({"query": "Dobby"})),
                Message::tool("Dobby is a house-elf.", "call_1", RETRIEVE_TOOL),
            ],
            2,
        );

        let outcome = run_step(Node::GradeDocuments, &ctx, &state).await;
        assert_eq!(outcome.decision, Some(Decision::Grade(GradeDecision::Generate)));
        assert!(outcome.patch.is_empty());
        assert_eq!(judge.call_count(PromptId::Grade).await, 0);
    }

    #[tokio::test]
    async fn test_grade_rewrite_increments_counter() {
        let judge = ScriptedJudge::new().structured(PromptId::Grade, json!({"binary_score": "no"}));
        let retriever = StaticRetriever::new(["Quidditch rules."]);
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(
            vec![
                Message::human("Who is Dobby?"),
                tool_request(json!({"query": "Dobby"})),
                Message::tool("Quidditch rules.", "call_1", RETRIEVE_TOOL),
            ],
            1,
        );

        let outcome = run_step(Node::GradeDocuments, &ctx, &state).await;
        assert_eq!(outcome.decision, Some(Decision::Grade(GradeDecision::Rewrite)));
        assert_eq!(outcome.patch.retry_count, Some(2));
    }

    #[tokio::test]
    async fn test_grade_fails_open() {
        // schema violation
        let judge = ScriptedJudge::new().structured(PromptId::Grade, json!({"binary_score": "maybe"}));
        let retriever = StaticRetriever::new(Vec::<String>::new());
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let graded = state_with(
            vec![
                Message::human("Who is Dobby?"),
                Message::tool("passages", "call_1", RETRIEVE_TOOL),
            ],
            0,
        );
        let outcome = run_step(Node::GradeDocuments, &ctx, &graded).await;
        assert_eq!(outcome.decision, Some(Decision::Grade(GradeDecision::Generate)));
        assert_eq!(outcome.patch.retry_count, None);

        // missing tool content never reaches the judge
        let ungraded = state_with(
            vec![
                Message::human("Who is Dobby?"),
                Message::tool("", "call_1", RETRIEVE_TOOL),
            ],
            0,
        );
        let outcome = run_step(Node::GradeDocuments, &ctx, &ungraded).await;
        assert_eq!(outcome.decision, Some(Decision::Grade(GradeDecision::Generate)));
        assert_eq!(judge.call_count(PromptId::Grade).await, 1);
    }

    #[tokio::test]
    async fn test_retrieve_uses_query_argument_and_handles_unknown_tools() {
        let judge = ScriptedJudge::new();
        let retriever = StaticRetriever::new(["Dobby is a house-elf.", "Dobby was freed."]);
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(
            vec![
                Message::human("Who is Dobby?"),
                Message::ai_tool_request(
                    "",
                    vec![
                        ToolInvocationRequest::new("call_1", RETRIEVE_TOOL, json!({"query": "Dobby elf"})),
                        ToolInvocationRequest::new("call_2", "cast_spell", json!({})),
                        ToolInvocationRequest::new("call_3", RETRIEVE_TOOL, json!({})),
                    ],
                ),
            ],
            0,
        );

        let outcome = run_step(Node::Retrieve, &ctx, &state).await;
        let messages = &outcome.patch.messages;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].content(), "Dobby is a house-elf.\n\nDobby was freed.");
        assert_eq!(messages[1].content(), "Unknown tool 'cast_spell'");
        assert_eq!(
            retriever.queries().await,
            vec!["Dobby elf".to_string(), "Who is Dobby?".to_string()]
        );
    }

    #[tokio::test]
    async fn test_retrieve_error_yields_empty_tool_message() {
        let judge = ScriptedJudge::new();
        let retriever = FailingRetriever::new();
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(
            vec![Message::human("Who is Dobby?"), tool_request(json!({"query": "Dobby"}))],
            0,
        );

        let outcome = run_step(Node::Retrieve, &ctx, &state).await;
        assert_eq!(outcome.patch.messages, vec![Message::tool("", "call_1", RETRIEVE_TOOL)]);
    }

    #[tokio::test]
    async fn test_rewrite_falls_back_to_original_question() {
        let judge = ScriptedJudge::new().fail(PromptId::Rewrite, "timeout");
        let retriever = StaticRetriever::new(Vec::<String>::new());
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 2,
        };
        let state = state_with(
            vec![
                Message::human("Hi"),
                Message::ai("Hello!"),
                Message::human("Who is Dobby?"),
                Message::rewritten_question("Dobby identity"),
            ],
            1,
        );

        let outcome = run_step(Node::Rewrite, &ctx, &state).await;
        assert_eq!(
            outcome.patch.messages,
            vec![Message::rewritten_question("Who is Dobby?")]
        );
    }

    #[tokio::test]
    async fn test_generate_defaults_without_context() {
        let judge = ScriptedJudge::new().text(PromptId::Generate, "I don't know.");
        let retriever = StaticRetriever::new(Vec::<String>::new());
        let settings = settings(Topology::GradedRetry);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(vec![Message::human("  ")], 2);

        let outcome = run_step(Node::Generate, &ctx, &state).await;
        assert_eq!(outcome.patch.retry_count, Some(0));
        let calls = judge.calls().await;
        assert_eq!(calls[0].1["context"], NO_CONTEXT);
        assert_eq!(calls[0].1["question"], DEFAULT_QUESTION);
        assert_eq!(retriever.call_count(), 0);
    }

    #[tokio::test]
    async fn test_router_violation_defaults_to_chit_chat() {
        let judge = ScriptedJudge::new().structured(PromptId::Router, json!({"path": "search"}));
        let retriever = StaticRetriever::new(Vec::<String>::new());
        let settings = settings(Topology::TwoPath);
        let ctx = StepContext {
            judge: &judge,
            retriever: &retriever,
            settings: &settings,
            logger: None,
            turn_start: 0,
        };
        let state = state_with(vec![Message::human("Who is Dobby?")], 0);

        let outcome = run_step(Node::Router, &ctx, &state).await;
        assert_eq!(outcome.decision, Some(Decision::Route(RouteDecision::ChitChat)));
        assert!(outcome.patch.is_empty());
    }
}
