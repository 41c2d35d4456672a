//! Data models for conversation checkpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current on-disk checkpoint format
pub const CHECKPOINT_VERSION: &str = "1";

/// Message author
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Human,
    Ai,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Human => write!(f, "human"),
            Role::Ai => write!(f, "ai"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call requested by the model inside an AI message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRequest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

impl ToolInvocationRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// String argument by name, trimmed; None when absent, blank or not a string.
    pub fn string_argument(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Conversation message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    Human {
        content: String,
        /// Set on questions reformulated by the rewrite step
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        rewritten: bool,
    },
    Ai {
        content: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolInvocationRequest>,
    },
    Tool {
        content: String,
        tool_call_id: String,
        name: String,
    },
}

impl Message {
    pub fn human(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
            rewritten: false,
        }
    }

    pub fn rewritten_question(content: impl Into<String>) -> Self {
        Message::Human {
            content: content.into(),
            rewritten: true,
        }
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Message::Ai {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// AI message carrying tool requests; content is usually empty.
    pub fn ai_tool_request(content: impl Into<String>, tool_calls: Vec<ToolInvocationRequest>) -> Self {
        Message::Ai {
            content: content.into(),
            tool_calls,
        }
    }

    pub fn tool(
        content: impl Into<String>,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Message::Tool {
            content: content.into(),
            tool_call_id: tool_call_id.into(),
            name: name.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Message::Human { .. } => Role::Human,
            Message::Ai { .. } => Role::Ai,
            Message::Tool { .. } => Role::Tool,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::Human { content, .. }
            | Message::Ai { content, .. }
            | Message::Tool { content, .. } => content,
        }
    }

    /// Tool requests of an AI message; empty for every other role.
    pub fn tool_calls(&self) -> &[ToolInvocationRequest] {
        match self {
            Message::Ai { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// Whether a chat front end should render this message.
    ///
    /// Tool results, tool-request markers and rewritten questions are internal.
    pub fn is_user_visible(&self) -> bool {
        match self {
            Message::Human { rewritten, .. } => !rewritten,
            Message::Ai { tool_calls, .. } => tool_calls.is_empty(),
            Message::Tool { .. } => false,
        }
    }
}

/// The unit of persistence: everything a conversation carries between steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub retry_count: u32,
}

impl ConversationState {
    /// Messages from index `start` on; empty when `start` is past the end.
    pub fn messages_since(&self, start: usize) -> &[Message] {
        self.messages.get(start..).unwrap_or(&[])
    }

    /// Content of the most recent human message at or after `since`,
    /// rewritten questions included.
    pub fn latest_human_question(&self, since: usize) -> Option<&str> {
        self.messages_since(since)
            .iter()
            .rev()
            .find(|m| m.role() == Role::Human)
            .map(Message::content)
            .filter(|c| !c.trim().is_empty())
    }

    /// Content of the most recent tool message at or after `since`, if non-blank.
    pub fn latest_tool_content(&self, since: usize) -> Option<&str> {
        self.messages_since(since)
            .iter()
            .rev()
            .find(|m| m.role() == Role::Tool)
            .map(Message::content)
            .filter(|c| !c.trim().is_empty())
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages a chat front end renders.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.is_user_visible())
    }
}

/// Bookkeeping for a turn that has not reached END yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTurn {
    /// Node the driver runs next
    pub next_node: String,
    /// Index of the human message that opened the turn
    pub turn_start: usize,
    /// Topology the turn was started under
    pub topology: String,
    /// Steps already completed in this turn
    #[serde(default)]
    pub steps_taken: u32,
}

/// Durable snapshot written after every step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationCheckpoint {
    pub conversation_id: String,
    pub state: ConversationState,
    #[serde(default)]
    pub pending: Option<PendingTurn>,
    /// Steps completed over the conversation's lifetime
    #[serde(default)]
    pub step_count: u64,
    pub updated_at: DateTime<Utc>,
    pub checkpoint_version: String,
}

impl ConversationCheckpoint {
    /// Fresh checkpoint for a conversation seen for the first time.
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            state: ConversationState::default(),
            pending: None,
            step_count: 0,
            updated_at: Utc::now(),
            checkpoint_version: CHECKPOINT_VERSION.to_string(),
        }
    }

    /// Refresh the timestamp before a write.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Bring a loaded checkpoint back within its invariants.
    ///
    /// Out-of-range retry counters are reset, and a pending turn that can no
    /// longer be resumed under `topology` is dropped. A dropped turn gives
    /// back its retry budget and, when it never answered, is closed with
    /// `orphan_reply`. Returns one line per repair applied; an empty list
    /// means the checkpoint was sound.
    pub fn repair<F>(
        &mut self,
        max_retries: u32,
        topology: &str,
        is_known_node: F,
        orphan_reply: &str,
    ) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let mut repairs = Vec::new();

        if self.state.retry_count > max_retries {
            repairs.push(format!(
                "retry_count {} exceeds {}; reset to 0",
                self.state.retry_count, max_retries
            ));
            self.state.retry_count = 0;
        }

        let drop_reason = self.pending.as_ref().and_then(|pending| {
            if pending.topology != topology {
                Some(format!(
                    "pending turn was started under topology '{}'; dropped",
                    pending.topology
                ))
            } else if !is_known_node(&pending.next_node) {
                Some(format!(
                    "pending turn names unknown node '{}'; dropped",
                    pending.next_node
                ))
            } else if pending.turn_start >= self.state.messages.len() {
                Some(format!(
                    "pending turn starts at message {} of {}; dropped",
                    pending.turn_start,
                    self.state.messages.len()
                ))
            } else {
                None
            }
        });
        if let Some(reason) = drop_reason {
            repairs.push(reason);
            self.pending = None;

            if self.state.retry_count != 0 {
                repairs.push(format!(
                    "retry_count {} of dropped turn reset to 0",
                    self.state.retry_count
                ));
                self.state.retry_count = 0;
            }

            let answered = self
                .state
                .last_message()
                .map_or(true, |m| m.role() == Role::Ai && m.is_user_visible());
            if !answered {
                self.state.messages.push(Message::ai(orphan_reply));
                repairs.push("dropped turn closed with a fallback reply".to_string());
            }
        }

        repairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_wire_shape() {
        let msg = Message::human("Who is Dobby?");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({"role": "human", "content": "Who is Dobby?"}));

        let msg = Message::ai_tool_request(
            "",
            vec![ToolInvocationRequest::new(
                "call_1",
                "retrieve_passages",
                json!({"query": "Dobby"}),
            )],
        );
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "ai");
        assert_eq!(value["tool_calls"][0]["name"], "retrieve_passages");

        let msg = Message::tool("passage", "call_1", "retrieve_passages");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["tool_call_id"], "call_1");
    }

    #[test]
    fn test_legacy_message_without_optional_fields() {
        let msg: Message = serde_json::from_value(json!({"role": "ai", "content": "hi"})).unwrap();
        assert_eq!(msg, Message::ai("hi"));
        let msg: Message = serde_json::from_value(json!({"role": "human", "content": "q"})).unwrap();
        assert_eq!(msg, Message::human("q"));
    }

    #[test]
    fn test_visibility() {
        assert!(Message::human("q").is_user_visible());
        assert!(!Message::rewritten_question("q2").is_user_visible());
        assert!(Message::ai("answer").is_user_visible());
        assert!(!Message::ai_tool_request(
            "",
            vec![ToolInvocationRequest::new("c", "retrieve_passages", json!({}))]
        )
        .is_user_visible());
        assert!(!Message::tool("x", "c", "retrieve_passages").is_user_visible());
    }

    #[test]
    fn test_latest_lookups() {
        let state = ConversationState {
            messages: vec![
                Message::human("first question"),
                Message::tool("old passages", "c1", "retrieve_passages"),
                Message::rewritten_question("better question"),
                Message::tool("   ", "c2", "retrieve_passages"),
            ],
            retry_count: 1,
        };
        assert_eq!(state.latest_human_question(0), Some("better question"));
        // blank tool content counts as missing
        assert_eq!(state.latest_tool_content(0), None);
        assert_eq!(state.latest_tool_content(9), None);
        assert_eq!(state.messages_since(3).len(), 1);
        assert_eq!(state.visible_messages().count(), 1);
    }

    #[test]
    fn test_string_argument() {
        let call = ToolInvocationRequest::new("c", "retrieve_passages", json!({"query": "  Hedwig "}));
        assert_eq!(call.string_argument("query"), Some("Hedwig"));
        let call = ToolInvocationRequest::new("c", "retrieve_passages", json!({"query": 3}));
        assert_eq!(call.string_argument("query"), None);
        let call = ToolInvocationRequest::new("c", "retrieve_passages", serde_json::Value::Null);
        assert_eq!(call.string_argument("query"), None);
    }

    #[test]
    fn test_checkpoint_defaults() {
        let cp = ConversationCheckpoint::new("conv-1");
        assert_eq!(cp.checkpoint_version, CHECKPOINT_VERSION);
        assert!(cp.pending.is_none());
        assert_eq!(cp.state.retry_count, 0);
        assert!(cp.state.messages.is_empty());
    }

    fn pending(next: &str, start: usize, topology: &str) -> PendingTurn {
        PendingTurn {
            next_node: next.to_string(),
            turn_start: start,
            topology: topology.to_string(),
            steps_taken: 1,
        }
    }

    #[test]
    fn test_repair_sound_checkpoint_is_untouched() {
        let mut cp = ConversationCheckpoint::new("conv");
        cp.state.messages.push(Message::human("q"));
        cp.state.retry_count = 2;
        cp.pending = Some(pending("retrieve", 0, "graded_retry"));

        let repairs = cp.repair(2, "graded_retry", |n| n == "retrieve", "fallback");
        assert!(repairs.is_empty());
        assert_eq!(cp.state.retry_count, 2);
        assert!(cp.pending.is_some());
    }

    #[test]
    fn test_repair_resets_retry_count() {
        let mut cp = ConversationCheckpoint::new("conv");
        cp.state.retry_count = 9;
        let repairs = cp.repair(2, "graded_retry", |_| true, "fallback");
        assert_eq!(repairs.len(), 1);
        assert_eq!(cp.state.retry_count, 0);
    }

    #[test]
    fn test_dropped_turn_returns_retry_budget() {
        let mut cp = ConversationCheckpoint::new("conv");
        cp.state.messages = vec![
            Message::human("Who is Winky?"),
            Message::tool("", "call_1", "retrieve_passages"),
        ];
        cp.state.retry_count = 2;
        cp.pending = Some(pending("rewrite", 0, "two_path"));

        let repairs = cp.repair(2, "graded_retry", |_| true, "fallback");
        assert_eq!(repairs.len(), 3);
        assert!(repairs[1].contains("retry_count 2"));
        assert_eq!(cp.state.retry_count, 0);
        assert_eq!(cp.state.messages.len(), 3);
        assert_eq!(cp.state.visible_messages().count(), 2);
    }

    #[test]
    fn test_repair_drops_unresumable_pending() {
        let mut cp = ConversationCheckpoint::new("conv");
        cp.state.messages.push(Message::human("q"));

        cp.pending = Some(pending("router", 0, "two_path"));
        let repairs = cp.repair(2, "graded_retry", |_| true, "fallback");
        assert_eq!(repairs.len(), 2);
        assert!(cp.pending.is_none());
        assert_eq!(cp.state.last_message(), Some(&Message::ai("fallback")));

        // already answered: nothing appended
        cp.pending = Some(pending("teleport", 0, "graded_retry"));
        assert_eq!(cp.repair(2, "graded_retry", |n| n != "teleport", "fallback").len(), 1);
        assert!(cp.pending.is_none());
        assert_eq!(cp.state.messages.len(), 2);

        cp.pending = Some(pending("retrieve", 5, "graded_retry"));
        let repairs = cp.repair(2, "graded_retry", |_| true, "fallback");
        assert!(repairs[0].contains("starts at message 5"));
        assert!(cp.pending.is_none());
    }
}
