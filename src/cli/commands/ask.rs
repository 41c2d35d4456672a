//! Ask command - one turn, answer printed to stdout

use colored::*;

use crate::cli::context::CliContext;
use crate::cli::error::{CliError, CliResult};
use crate::orchestration::RagRuntime;

/// Options for the ask command
#[derive(Debug, Clone)]
pub struct AskOptions {
    pub conversation_id: String,
    pub question: Vec<String>,
    /// Startup attempts while the retriever is unreachable
    pub attempts: u32,
}

/// Join the words of a question, rejecting a blank one.
pub fn question_text(words: &[String]) -> CliResult<String> {
    let question = words.join(" ").trim().to_string();
    if question.is_empty() {
        return Err(CliError::InvalidInput("question must not be empty".into()));
    }
    Ok(question)
}

pub async fn run(ctx: &CliContext, opts: AskOptions) -> CliResult<()> {
    let question = question_text(&opts.question)?;
    let runtime = RagRuntime::initialize_with_backoff(&ctx.loader.config, &ctx.env, opts.attempts).await?;

    let reply = runtime.run_turn(&opts.conversation_id, &question).await?;
    println!("{}", reply.content());
    eprintln!(
        "{}",
        format!("conversation: {}", opts.conversation_id).dimmed()
    );

    runtime.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_text() {
        let words = vec!["Who".to_string(), "is".to_string(), "Dobby?".to_string()];
        assert_eq!(question_text(&words).unwrap(), "Who is Dobby?");
        assert!(matches!(
            question_text(&["  ".to_string()]),
            Err(CliError::InvalidInput(_))
        ));
        assert!(question_text(&[]).is_err());
    }
}
