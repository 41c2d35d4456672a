//! Shared helpers for CLI commands

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};

use crate::checkpoint::{Message, Role};

/// Display a user-friendly error message with suggestions
pub fn display_error_with_suggestions<E: std::fmt::Display>(error: &E, context: &str) {
    eprintln!("{} {}", "❌ Error:".red().bold(), context);
    eprintln!("   {}", error.to_string().red());

    let error_str = error.to_string().to_lowercase();
    if error_str.contains("openai_api_key") {
        eprintln!("{}", "💡 Suggestions:".blue());
        eprintln!("   • Export OPENAI_API_KEY or add it to a .env file");
        eprintln!("   • Pass the .env file with --env-file");
    } else if error_str.contains("retriever") || error_str.contains("weaviate") {
        eprintln!("{}", "💡 Suggestions:".blue());
        eprintln!("   • Check WEAVIATE_URL and WEAVIATE_API_KEY");
        eprintln!("   • Use [retriever] backend = \"memory\" with a corpus_path to run offline");
    } else if error_str.contains("not found") {
        eprintln!("{}", "💡 Suggestions:".blue());
        eprintln!("   • Run 'lorekeeper conversations' to see stored conversations");
        eprintln!("   • Check the conversation ID spelling");
    } else if error_str.contains("permission denied") {
        eprintln!("{}", "💡 Suggestions:".blue());
        eprintln!("   • Check permissions on the checkpoint directory");
        eprintln!("   • Set LOREKEEPER_DATA_DIR to a writable location");
    }
}

/// Truncate text with ellipsis if it exceeds `max_chars` characters
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Speaker label shown to users.
pub fn speaker(message: &Message) -> &'static str {
    match message.role() {
        Role::Human => "You",
        Role::Ai => "Lorekeeper",
        Role::Tool => "Tool",
    }
}

/// Empty table with the CLI's shared look.
pub fn styled_table<const N: usize>(header: [&str; N]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}
