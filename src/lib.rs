//! Lorekeeper - conversational question answering over the Harry Potter books
//!
//! Each user message is answered by a small state machine: route or
//! decide whether to retrieve, fetch passages from a vector index, grade
//! their relevance, rewrite the question and retry a bounded number of
//! times, then generate a grounded answer. Conversation state is
//! checkpointed after every step so an interrupted turn can be resumed.
//!
//! Modules are feature-gated:
//!
//! - **`config`** - TOML configuration and `.env` loading
//! - **`observability`** - tracing setup and the JSON-lines transcript logger
//! - **`checkpoint`** - conversation state, storage backends, per-conversation locks
//! - **`retriever`** - the retrieval port with Weaviate and in-memory adapters
//! - **`provider`** - LLM provider, prompt library and the judgment port
//! - **`orchestration`** - graph topologies, step bodies, turn engine, runtime
//! - **`cli`** - the `lorekeeper` command line
//!
//! ```toml
//! [dependencies]
//! lorekeeper = { version = "0.3", default-features = false, features = ["orchestration"] }
//! ```
//!
//! # Example: answering one message
//!
//! ```ignore
//! use lorekeeper::config::{ConfigurationLoader, EnvironmentLoader};
//! use lorekeeper::orchestration::RagRuntime;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let env = EnvironmentLoader::new(None);
//!     let loader = ConfigurationLoader::new(None)?;
//!     let runtime = RagRuntime::initialize(&loader.config, &env).await?;
//!
//!     let reply = runtime.run_turn("conv-1", "Who gave Harry the invisibility cloak?").await?;
//!     println!("{}", reply.content());
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Tracing and transcript logging (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Conversation persistence (enabled with the `checkpoint` feature)
#[cfg(feature = "checkpoint")]
pub mod checkpoint;

/// Passage retrieval (enabled with the `retriever` feature)
#[cfg(feature = "retriever")]
pub mod retriever;

/// LLM provider abstraction (enabled with the `provider` feature)
#[cfg(feature = "provider")]
pub mod provider;

/// Prompt templates (enabled with the `provider` feature)
#[cfg(feature = "provider")]
pub mod prompts;

/// Model-backed judgments: routing, grading, rewriting, answering
#[cfg(feature = "provider")]
pub mod judgment;

/// Turn orchestration (enabled with the `orchestration` feature)
#[cfg(feature = "orchestration")]
pub mod orchestration;

/// Command line (enabled with the `cli` feature)
#[cfg(feature = "cli")]
pub mod cli;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;

    #[cfg(feature = "checkpoint")]
    pub use crate::checkpoint::{
        CheckpointError, CheckpointResult, ConversationCheckpoint, ConversationState,
        ConversationStore, Message,
    };

    #[cfg(feature = "retriever")]
    pub use crate::retriever::{Passage, RetrievalError, RetrieverPort};

    #[cfg(feature = "provider")]
    pub use crate::provider::{GenerateConfig, GenerateResponse, LlmProvider, ProviderFactory};

    #[cfg(feature = "provider")]
    pub use crate::judgment::{JudgmentPort, LlmJudge};

    #[cfg(feature = "orchestration")]
    pub use crate::orchestration::{
        EngineSettings, GraphSpec, Node, RagRuntime, Topology, TurnEngine, MAX_RETRIES,
    };
}
