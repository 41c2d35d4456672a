//! Conversations command - list stored conversations

use colored::*;
use comfy_table::Table;

use crate::checkpoint::ConversationSummary;
use crate::cli::context::CliContext;
use crate::cli::error::CliResult;
use crate::cli::utils::{styled_table, truncate_with_ellipsis};
use crate::orchestration::open_conversation_store;

pub fn conversations_table(summaries: &[ConversationSummary]) -> Table {
    let mut table = styled_table(["Conversation", "Messages", "Retry", "Pending", "Updated"]);
    for summary in summaries {
        table.add_row(vec![
            truncate_with_ellipsis(&summary.conversation_id, 40),
            summary.message_count.to_string(),
            summary.retry_count.to_string(),
            if summary.has_pending_turn { "yes" } else { "" }.to_string(),
            summary.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ]);
    }
    table
}

pub async fn run(ctx: &CliContext) -> CliResult<()> {
    let store = open_conversation_store(&ctx.loader.config, &ctx.env)?;
    let summaries = store.list().await?;

    if summaries.is_empty() {
        println!("{}", "No conversations found.".yellow());
        return Ok(());
    }

    println!("{}", "📋 Conversations".cyan().bold());
    println!("{}", conversations_table(&summaries));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_conversations_table() {
        let summaries = vec![ConversationSummary {
            conversation_id: "conv-hogwarts".into(),
            message_count: 4,
            retry_count: 0,
            has_pending_turn: true,
            updated_at: Utc::now(),
        }];
        let rendered = conversations_table(&summaries).to_string();
        assert!(rendered.contains("conv-hogwarts"));
        assert!(rendered.contains("yes"));
    }
}
