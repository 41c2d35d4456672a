//! Chat command - interactive conversation loop

use colored::*;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::context::CliContext;
use crate::cli::error::CliResult;
use crate::orchestration::RagRuntime;

/// First line shown when a chat opens.
pub const GREETING: &str = "Hi! I'm here to help you with any questions about Harry Potter books, characters, and themes. Ask me anything!";

/// Options for the chat command
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /// Conversation to continue; a new id is generated when None
    pub conversation_id: Option<String>,
    pub attempts: u32,
}

/// Inputs that end the loop.
pub fn is_exit_command(line: &str) -> bool {
    matches!(
        line.trim().to_lowercase().as_str(),
        "exit" | "quit" | "/exit" | "/quit"
    )
}

pub async fn run(ctx: &CliContext, opts: ChatOptions) -> CliResult<()> {
    let conversation_id = opts
        .conversation_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let runtime = RagRuntime::initialize_with_backoff(&ctx.loader.config, &ctx.env, opts.attempts).await?;

    if let Some(reply) = runtime.resume(&conversation_id).await? {
        println!("{} {}", "Lorekeeper (resumed):".green().bold(), reply.content());
    }

    println!("{}", format!("Conversation {}", conversation_id).dimmed());
    println!("{} {}", "Lorekeeper:".green().bold(), GREETING);
    println!("{}", "Type 'exit' to leave.".dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", "You:".cyan().bold());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        if is_exit_command(&line) {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let reply = runtime.run_turn(&conversation_id, line.trim()).await?;
        println!("{} {}", "Lorekeeper:".green().bold(), reply.content());
    }

    runtime.shutdown().await;
    println!(
        "{}",
        format!("Continue later with: lorekeeper chat --conversation {}", conversation_id).dimmed()
    );
    Ok(())
}
