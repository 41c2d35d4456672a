//! State patches and prompt-facing views of conversation state.

use crate::checkpoint::{ConversationState, Message, Role};

/// Changes a step asks the driver to merge into the state.
///
/// `messages` are appended in order. `retry_count` replaces the stored
/// counter when present and leaves it untouched otherwise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    pub messages: Vec<Message>,
    pub retry_count: Option<u32>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.retry_count.is_none()
    }

    /// Merge into `state`.
    pub fn apply(self, state: &mut ConversationState) {
        state.messages.extend(self.messages);
        if let Some(retry_count) = self.retry_count {
            state.retry_count = retry_count;
        }
    }
}

/// Rendered when there is no earlier conversation.
pub const EMPTY_HISTORY: &str = "(no previous messages)";

/// Prior user-visible exchanges as prompt text, most recent `limit` only.
///
/// Only messages before `turn_start` are included; the current question is
/// bound separately.
pub fn render_history(state: &ConversationState, turn_start: usize, limit: usize) -> String {
    let end = turn_start.min(state.messages.len());
    let visible: Vec<&Message> = state.messages[..end]
        .iter()
        .filter(|m| m.is_user_visible())
        .collect();
    let skip = visible.len().saturating_sub(limit);

    let lines: Vec<String> = visible
        .into_iter()
        .skip(skip)
        .map(|m| {
            let speaker = match m.role() {
                Role::Human => "User",
                _ => "Assistant",
            };
            format!("{}: {}", speaker, m.content().trim())
        })
        .collect();

    if lines.is_empty() {
        EMPTY_HISTORY.to_string()
    } else {
        lines.join("\n")
    }
}
