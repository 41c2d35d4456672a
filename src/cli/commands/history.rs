//! History command - render a conversation's user-visible messages

use colored::*;
use comfy_table::Table;

use crate::checkpoint::ConversationCheckpoint;
use crate::cli::context::CliContext;
use crate::cli::error::{CliError, CliResult};
use crate::cli::utils::{speaker, styled_table};
use crate::orchestration::open_conversation_store;

/// Options for the history command
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    pub conversation_id: String,
}

/// Table of the messages a user saw; internal steps are left out.
pub fn history_table(checkpoint: &ConversationCheckpoint) -> Table {
    let mut table = styled_table(["#", "Speaker", "Message"]);
    for (index, message) in checkpoint.state.visible_messages().enumerate() {
        table.add_row(vec![
            (index + 1).to_string(),
            speaker(message).to_string(),
            message.content().to_string(),
        ]);
    }
    table
}

pub async fn run(ctx: &CliContext, opts: HistoryOptions) -> CliResult<()> {
    let store = open_conversation_store(&ctx.loader.config, &ctx.env)?;
    let checkpoint = store
        .load(&opts.conversation_id)
        .await?
        .ok_or_else(|| CliError::NotFound(format!("conversation '{}'", opts.conversation_id)))?;

    println!("{}", format!("Conversation {}", checkpoint.conversation_id).cyan().bold());
    println!("{}", history_table(&checkpoint));
    if checkpoint.pending.is_some() {
        println!(
            "{}",
            "⚠️  The last turn was interrupted; it finishes on the next 'ask' or 'resume'.".yellow()
        );
    }
    Ok(())
}
