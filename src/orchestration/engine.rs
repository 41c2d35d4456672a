//! Turn driver.
//!
//! [`TurnEngine::run_turn`] appends the human message, then runs steps from
//! the topology's entry until an edge reaches END. The checkpoint is written
//! before the first step and after every step, with `pending.next_node`
//! naming the step still to run, so an interrupted turn resumes where it
//! stopped.

use anyhow::Result;
use std::sync::Arc;

use super::graph::{GraphSpec, Node, Target, Topology, MAX_RETRIES};
use super::steps::{run_step, StepContext, GENERATE_FALLBACK};
use super::state::StatePatch;
use crate::checkpoint::{
    ConversationCheckpoint, ConversationLocks, ConversationStore, Message, PendingTurn, Role,
};
use crate::config::Configuration;
use crate::judgment::JudgmentPort;
use crate::observability::Logger;
use crate::retriever::RetrieverPort;

/// Loop bounds and topology for a [`TurnEngine`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub topology: Topology,
    pub max_retries: u32,
    pub max_steps_per_turn: u32,
    pub max_history_messages: usize,
    /// Passages requested per retrieval
    pub k: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            topology: Topology::GradedRetry,
            max_retries: MAX_RETRIES,
            max_steps_per_turn: 24,
            max_history_messages: 12,
            k: 5,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Configuration) -> Result<Self> {
        let topology = config
            .graph
            .topology
            .parse::<Topology>()
            .map_err(anyhow::Error::msg)?;
        Ok(Self {
            topology,
            max_retries: config.graph.max_retries,
            max_steps_per_turn: config.graph.max_steps_per_turn,
            max_history_messages: config.graph.max_history_messages,
            k: config.retriever.k,
        })
    }
}

pub struct TurnEngine {
    judge: Arc<dyn JudgmentPort>,
    retriever: Arc<dyn RetrieverPort>,
    store: Arc<dyn ConversationStore>,
    locks: ConversationLocks,
    graph: GraphSpec,
    settings: EngineSettings,
    logger: Option<Arc<Logger>>,
}

impl TurnEngine {
    pub fn new(
        judge: Arc<dyn JudgmentPort>,
        retriever: Arc<dyn RetrieverPort>,
        store: Arc<dyn ConversationStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            judge,
            retriever,
            store,
            locks: ConversationLocks::new(),
            graph: GraphSpec::for_topology(settings.topology),
            settings,
            logger: None,
        }
    }

    /// Also write a markdown transcript of every turn.
    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn graph(&self) -> &GraphSpec {
        &self.graph
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Run one turn and return the assistant's reply.
    ///
    /// Never fails: port errors become fallback replies inside the steps, and
    /// store errors are logged while the turn continues in memory. A turn left
    /// pending by an earlier interruption is finished first.
    pub async fn run_turn(&self, conversation_id: &str, text: &str) -> Message {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut checkpoint = self.load(conversation_id).await;

        if checkpoint.pending.is_some() {
            tracing::info!(conversation_id, "finishing interrupted turn before new message");
            self.drive(&mut checkpoint).await;
        }

        let turn_start = checkpoint.state.messages.len();
        checkpoint.state.messages.push(Message::human(text));
        checkpoint.pending = Some(PendingTurn {
            next_node: self.graph.entry().as_str().to_string(),
            turn_start,
            topology: self.settings.topology.as_str().to_string(),
            steps_taken: 0,
        });
        self.persist(&mut checkpoint).await;

        tracing::info!(conversation_id, topology = %self.settings.topology, "turn started");
        self.transcript(|l| l.log_turn_start(conversation_id, text, self.settings.topology.as_str()));

        self.drive(&mut checkpoint).await
    }

    /// Finish an interrupted turn. `None` when nothing was pending.
    pub async fn resume(&self, conversation_id: &str) -> Option<Message> {
        let _guard = self.locks.acquire(conversation_id).await;
        let mut checkpoint = self.load(conversation_id).await;
        if checkpoint.pending.is_none() {
            return None;
        }
        tracing::info!(conversation_id, "resuming interrupted turn");
        Some(self.drive(&mut checkpoint).await)
    }

    /// Load a checkpoint and repair it, or start fresh.
    async fn load(&self, conversation_id: &str) -> ConversationCheckpoint {
        let mut checkpoint = match self.store.load(conversation_id).await {
            Ok(Some(checkpoint)) => checkpoint,
            Ok(None) => ConversationCheckpoint::new(conversation_id),
            Err(e) if e.is_corruption() => {
                tracing::warn!(conversation_id, error = %e, "stored state is corrupted; starting fresh");
                let issues = vec![format!("unreadable checkpoint replaced: {}", e)];
                self.transcript(|l| l.log_state_repair(conversation_id, &issues));
                ConversationCheckpoint::new(conversation_id)
            }
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "conversation store unavailable; using empty state");
                ConversationCheckpoint::new(conversation_id)
            }
        };

        let repairs = checkpoint.repair(
            self.settings.max_retries,
            self.settings.topology.as_str(),
            |name| self.graph.is_known_node(name),
            GENERATE_FALLBACK,
        );
        if !repairs.is_empty() {
            tracing::warn!(conversation_id, repairs = ?repairs, "repaired stored state");
            self.transcript(|l| l.log_state_repair(conversation_id, &repairs));
        }
        checkpoint
    }

    async fn persist(&self, checkpoint: &mut ConversationCheckpoint) {
        checkpoint.touch();
        if let Err(e) = self.store.save(&checkpoint.conversation_id, checkpoint).await {
            tracing::error!(
                conversation_id = %checkpoint.conversation_id,
                error = %e,
                "checkpoint write failed"
            );
        }
    }

    /// Run steps from `checkpoint.pending` until END and return the reply.
    async fn drive(&self, checkpoint: &mut ConversationCheckpoint) -> Message {
        let Some(mut pending) = checkpoint.pending.clone() else {
            return Message::ai(GENERATE_FALLBACK);
        };
        let turn_start = pending.turn_start;

        let mut node = match pending.next_node.parse::<Node>() {
            Ok(node) if self.graph.contains(node) => Some(node),
            _ => None,
        };

        while let Some(current) = node {
            if pending.steps_taken >= self.settings.max_steps_per_turn {
                tracing::warn!(
                    conversation_id = %checkpoint.conversation_id,
                    steps = pending.steps_taken,
                    "step limit reached; ending turn"
                );
                StatePatch::new()
                    .append(Message::ai(GENERATE_FALLBACK))
                    .with_retry_count(0)
                    .apply(&mut checkpoint.state);
                break;
            }

            tracing::debug!(step = %current, retry_count = checkpoint.state.retry_count, "step started");
            let ctx = StepContext {
                judge: self.judge.as_ref(),
                retriever: self.retriever.as_ref(),
                settings: &self.settings,
                logger: self.logger.as_deref(),
                turn_start,
            };
            let mut outcome = run_step(current, &ctx, &checkpoint.state).await;
            std::mem::take(&mut outcome.patch).apply(&mut checkpoint.state);

            pending.steps_taken += 1;
            checkpoint.step_count += 1;
            self.transcript(|l| {
                l.log_step(current.as_str(), &outcome.summary, checkpoint.state.retry_count)
            });

            node = match self.graph.next(current, &outcome, &checkpoint.state) {
                Target::Node(next) => {
                    pending.next_node = next.as_str().to_string();
                    checkpoint.pending = Some(pending.clone());
                    self.persist(checkpoint).await;
                    Some(next)
                }
                Target::End => None,
            };
        }

        let reply = match final_reply(&checkpoint.state.messages, turn_start) {
            Some(reply) => reply,
            None => {
                let reply = Message::ai(GENERATE_FALLBACK);
                checkpoint.state.messages.push(reply.clone());
                reply
            }
        };
        checkpoint.pending = None;
        self.persist(checkpoint).await;

        tracing::info!(
            conversation_id = %checkpoint.conversation_id,
            steps = pending.steps_taken,
            retry_count = checkpoint.state.retry_count,
            "turn complete"
        );
        self.transcript(|l| l.log_turn_complete(reply.content(), pending.steps_taken));
        reply
    }

    fn transcript<F>(&self, write: F)
    where
        F: FnOnce(&Logger) -> Result<()>,
    {
        if let Some(ref logger) = self.logger {
            if let Err(e) = write(logger) {
                tracing::warn!(error = %e, "transcript write failed");
            }
        }
    }
}

/// Last user-visible AI message appended since `turn_start`.
fn final_reply(messages: &[Message], turn_start: usize) -> Option<Message> {
    messages
        .get(turn_start..)?
        .iter()
        .rev()
        .find(|m| m.role() == Role::Ai && m.is_user_visible())
        .cloned()
}
