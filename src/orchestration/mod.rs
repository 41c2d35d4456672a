//! Turn orchestration
//!
//! The state machine that answers one user message:
//!
//! ```text
//! two_path:      router ──► chit_chat ──► END
//!                       └─► generate  ──► END
//!
//! graded_retry:  generate_query_or_respond ──► END (direct answer)
//!                        │ tool request
//!                        ▼
//!                    retrieve ──► grade_documents ──► generate ──► END
//!                        ▲                │ not relevant
//!                        │                ▼
//!                        └──(via gqor)── rewrite
//! ```
//!
//! - [`graph`]: topologies as transition tables with out-of-band decisions
//! - [`steps`]: step bodies; port failures become fallback replies
//! - [`engine`]: the driver loop, checkpointing after every step
//! - [`runtime`]: process lifecycle (initialize, backoff, shutdown)
//! - [`test_utils`]: scripted judge and retriever doubles

pub mod engine;
pub mod graph;
pub mod runtime;
pub mod state;
pub mod steps;
pub mod test_utils;

pub use engine::{EngineSettings, TurnEngine};
pub use graph::{
    Decision, Edge, GradeDecision, GraphSpec, Node, StepOutcome, Target, Topology, MAX_RETRIES,
};
pub use runtime::{
    backoff_delay, checkpoint_dir, ensure_store_available, open_conversation_store,
    InitializationError, RagRuntime, RuntimeStatus, MAX_BACKOFF_SECS,
};
pub use state::{render_history, StatePatch};
pub use steps::{
    retrieval_tool, CHIT_CHAT_FALLBACK, DEFAULT_QUESTION, GENERATE_FALLBACK, NO_CONTEXT,
    RETRIEVE_TOOL,
};
