//! Command-line interface
//!
//! ```text
//! lorekeeper ask --conversation <id> <question...>
//! lorekeeper chat [--conversation <id>]
//! lorekeeper resume --conversation <id>
//! lorekeeper history --conversation <id>
//! lorekeeper conversations
//! lorekeeper config [--toml-only]
//! ```
//!
//! `--config`, `--env-file` and `--log-level` apply to every subcommand.

pub mod commands;
pub mod context;
pub mod error;
pub mod utils;

pub use context::CliContext;
pub use error::{CliError, CliResult};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::{ask, chat, config, conversations, history, resume};

/// Startup attempts while the retriever is unreachable.
pub const DEFAULT_STARTUP_ATTEMPTS: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "lorekeeper")]
#[command(about = "Conversational question answering over the Harry Potter books", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to a .env file with credentials
    #[arg(long, global = true)]
    pub env_file: Option<PathBuf>,

    /// Console log level (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask one question and print the answer
    Ask {
        /// Conversation to append the turn to
        #[arg(long, short = 'c', default_value = "default")]
        conversation: String,

        /// Startup attempts while the retriever is unreachable
        #[arg(long, default_value_t = DEFAULT_STARTUP_ATTEMPTS)]
        attempts: u32,

        /// The question
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
    },

    /// Start an interactive conversation
    Chat {
        /// Conversation to continue; a new one is created when omitted
        #[arg(long, short = 'c')]
        conversation: Option<String>,

        #[arg(long, default_value_t = DEFAULT_STARTUP_ATTEMPTS)]
        attempts: u32,
    },

    /// Finish a turn that was interrupted before it replied
    Resume {
        #[arg(long, short = 'c')]
        conversation: String,

        #[arg(long, default_value_t = DEFAULT_STARTUP_ATTEMPTS)]
        attempts: u32,
    },

    /// Show the messages of a conversation
    History {
        #[arg(long, short = 'c')]
        conversation: String,
    },

    /// List stored conversations
    Conversations,

    /// Show the resolved configuration as TOML
    Config {
        /// Print only the TOML, without the credential check
        #[arg(long)]
        toml_only: bool,
    },
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> CliResult<()> {
    let ctx = CliContext::load(cli.config.as_deref(), cli.env_file.as_deref())?;

    match cli.command {
        Commands::Ask {
            conversation,
            attempts,
            question,
        } => {
            ask::run(
                &ctx,
                ask::AskOptions {
                    conversation_id: conversation,
                    question,
                    attempts,
                },
            )
            .await
        }
        Commands::Chat {
            conversation,
            attempts,
        } => {
            chat::run(
                &ctx,
                chat::ChatOptions {
                    conversation_id: conversation,
                    attempts,
                },
            )
            .await
        }
        Commands::Resume {
            conversation,
            attempts,
        } => {
            resume::run(
                &ctx,
                resume::ResumeOptions {
                    conversation_id: conversation,
                    attempts,
                },
            )
            .await
        }
        Commands::History { conversation } => {
            history::run(
                &ctx,
                history::HistoryOptions {
                    conversation_id: conversation,
                },
            )
            .await
        }
        Commands::Conversations => conversations::run(&ctx).await,
        Commands::Config { toml_only } => config::run(&ctx, config::ConfigShowOptions { toml_only }),
    }
}
