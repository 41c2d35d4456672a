//! Resume command - finish a turn that was interrupted mid-graph

use colored::*;

use crate::cli::context::CliContext;
use crate::cli::error::CliResult;
use crate::orchestration::RagRuntime;

/// Options for the resume command
#[derive(Debug, Clone)]
pub struct ResumeOptions {
    pub conversation_id: String,
    pub attempts: u32,
}

pub async fn run(ctx: &CliContext, opts: ResumeOptions) -> CliResult<()> {
    let runtime = RagRuntime::initialize_with_backoff(&ctx.loader.config, &ctx.env, opts.attempts).await?;

    match runtime.resume(&opts.conversation_id).await? {
        Some(reply) => {
            println!("{}", "✓ Resumed interrupted turn".green());
            println!("{}", reply.content());
        }
        None => println!(
            "{}",
            format!("Nothing to resume for conversation '{}'.", opts.conversation_id).yellow()
        ),
    }

    runtime.shutdown().await;
    Ok(())
}
