//! Process-scoped runtime: build once at startup, run turns, shut down.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::engine::{EngineSettings, TurnEngine};
use crate::checkpoint::{open_store, CheckpointError, ConversationStore, Message, StorageError};
use crate::config::{Configuration, EnvironmentLoader};
use crate::judgment::{JudgeSettings, JudgmentPort, LlmJudge};
use crate::observability::Logger;
use crate::prompts::{PromptError, PromptLibrary};
use crate::provider::ProviderFactory;
use crate::retriever::{build_retriever, RetrievalError, RetrieverPort};

/// Failures that keep the runtime from serving turns.
#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Retriever(#[from] RetrievalError),

    #[error("LLM provider setup failed: {0}")]
    Provider(String),

    #[error(transparent)]
    Prompts(#[from] PromptError),

    #[error("Conversation store setup failed: {0}")]
    Store(#[from] CheckpointError),

    #[error("Transcript setup failed: {0}")]
    Logger(String),

    #[error("Runtime is not ready (status: {0})")]
    NotReady(RuntimeStatus),
}

impl InitializationError {
    /// Whether another attempt may succeed (the index may come up later).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InitializationError::Retriever(RetrievalError::Http(_))
                | InitializationError::Retriever(RetrievalError::Status { .. })
                | InitializationError::Retriever(RetrievalError::Unavailable(_))
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeStatus {
    Ready,
    ShutDown,
}

impl fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeStatus::Ready => f.write_str("ready"),
            RuntimeStatus::ShutDown => f.write_str("shut down"),
        }
    }
}

/// Longest wait between two initialization attempts.
pub const MAX_BACKOFF_SECS: u64 = 30;

/// Wait before retry `attempt` (0-based): 1s, 2s, 4s, ... up to [`MAX_BACKOFF_SECS`].
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64
        .checked_pow(attempt)
        .unwrap_or(u64::MAX)
        .min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// Run `op` up to `attempts` times, sleeping [`backoff_delay`] between
/// retryable failures.
async fn retry_with_backoff<T, F, Fut>(attempts: u32, mut op: F) -> Result<T, InitializationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, InitializationError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let wait_time = backoff_delay(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    wait_secs = wait_time.as_secs(),
                    error = %e,
                    "initialization failed; retrying"
                );
                tokio::time::sleep(wait_time).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Checkpoint directory: `LOREKEEPER_DATA_DIR` wins over `[checkpointing].base_path`.
pub fn checkpoint_dir(
    config: &Configuration,
    env: &EnvironmentLoader,
) -> Result<PathBuf, InitializationError> {
    match env.data_dir() {
        Some(dir) => Ok(PathBuf::from(shellexpand::tilde(&dir).as_ref())),
        None => config
            .checkpoint_base_path()
            .map_err(|e| InitializationError::Config(format!("{:#}", e))),
    }
}

/// Open the configured conversation store without building the rest of the runtime.
pub fn open_conversation_store(
    config: &Configuration,
    env: &EnvironmentLoader,
) -> Result<Arc<dyn ConversationStore>, InitializationError> {
    let base_path = checkpoint_dir(config, env)?;
    Ok(open_store(&config.checkpointing.backend, Some(&base_path))?)
}

/// Fail startup when the conversation store cannot be reached.
pub async fn ensure_store_available(store: &dyn ConversationStore) -> Result<(), InitializationError> {
    if !store.is_available().await {
        return Err(InitializationError::Store(CheckpointError::Storage(
            StorageError::Connection("conversation store is not available".into()),
        )));
    }
    Ok(())
}

/// Turn engine plus its lifecycle.
///
/// Holds the only provider, retriever and store instances of the process;
/// hosts construct one and share it by reference.
pub struct RagRuntime {
    engine: TurnEngine,
    status: Arc<RwLock<RuntimeStatus>>,
}

impl RagRuntime {
    /// Build every collaborator from configuration.
    ///
    /// The retriever's health check runs here, once, before any turn.
    pub async fn initialize(
        config: &Configuration,
        env: &EnvironmentLoader,
    ) -> Result<Self, InitializationError> {
        config
            .validate()
            .map_err(|e| InitializationError::Config(format!("{:#}", e)))?;
        let settings = EngineSettings::from_config(config)
            .map_err(|e| InitializationError::Config(format!("{:#}", e)))?;

        let retriever = build_retriever(config, env).await?;
        retriever.health_check().await?;
        tracing::info!(retriever = retriever.name(), "retriever ready");

        let provider = ProviderFactory::create(&config.llm, env)
            .map_err(|e| InitializationError::Provider(format!("{:#}", e)))?;
        let prompts = match config.prompts_dir() {
            Some(dir) => PromptLibrary::with_overrides(&dir)?,
            None => PromptLibrary::builtin()?,
        };

        let logger = match config.logging.log_file {
            Some(ref path) => {
                let path = PathBuf::from(shellexpand::tilde(path).as_ref());
                let logger = Logger::new(Some(&path), Some(config.logging.log_level.as_str()))
                    .map_err(|e| InitializationError::Logger(format!("{:#}", e)))?;
                Some(Arc::new(logger))
            }
            None => None,
        };

        let mut judge = LlmJudge::new(provider, prompts, JudgeSettings::from_config(&config.llm));
        if let Some(ref logger) = logger {
            judge = judge.with_logger(logger.clone());
        }

        let store = open_conversation_store(config, env)?;
        ensure_store_available(store.as_ref()).await?;

        let mut runtime = Self::from_parts(Arc::new(judge), retriever, store, settings);
        if let Some(logger) = logger {
            runtime = runtime.with_logger(logger);
        }
        tracing::info!(topology = %runtime.engine.settings().topology, "runtime ready");
        Ok(runtime)
    }

    /// [`RagRuntime::initialize`], retried with exponential backoff while the
    /// failure is retryable. `attempts` counts the first try.
    pub async fn initialize_with_backoff(
        config: &Configuration,
        env: &EnvironmentLoader,
        attempts: u32,
    ) -> Result<Self, InitializationError> {
        retry_with_backoff(attempts, || Self::initialize(config, env)).await
    }

    /// Assemble a ready runtime from already-built collaborators.
    pub fn from_parts(
        judge: Arc<dyn JudgmentPort>,
        retriever: Arc<dyn RetrieverPort>,
        store: Arc<dyn ConversationStore>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            engine: TurnEngine::new(judge, retriever, store, settings),
            status: Arc::new(RwLock::new(RuntimeStatus::Ready)),
        }
    }

    pub fn with_logger(mut self, logger: Arc<Logger>) -> Self {
        self.engine = self.engine.with_logger(logger);
        self
    }

    pub fn engine(&self) -> &TurnEngine {
        &self.engine
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        self.engine.store()
    }

    pub async fn status(&self) -> RuntimeStatus {
        *self.status.read().await
    }

    async fn ensure_ready(&self) -> Result<(), InitializationError> {
        match self.status().await {
            RuntimeStatus::Ready => Ok(()),
            status => Err(InitializationError::NotReady(status)),
        }
    }

    /// Run one turn. Only fails when the runtime has been shut down.
    pub async fn run_turn(
        &self,
        conversation_id: &str,
        text: &str,
    ) -> Result<Message, InitializationError> {
        self.ensure_ready().await?;
        Ok(self.engine.run_turn(conversation_id, text).await)
    }

    /// Finish an interrupted turn, if any.
    pub async fn resume(&self, conversation_id: &str) -> Result<Option<Message>, InitializationError> {
        self.ensure_ready().await?;
        Ok(self.engine.resume(conversation_id).await)
    }

    /// Stop accepting turns. Idempotent.
    pub async fn shutdown(&self) {
        let mut status = self.status.write().await;
        if *status != RuntimeStatus::ShutDown {
            *status = RuntimeStatus::ShutDown;
            tracing::info!("runtime shut down");
        }
    }
}
