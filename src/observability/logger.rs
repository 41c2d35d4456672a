//! Markdown transcript of conversation turns.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Transcript logger for conversation turns.
///
/// Writes one markdown file per process: a header, then a section per turn
/// with every step, decision and recovered failure. Runtime diagnostics go
/// through `tracing`; this file is the human-readable record.
#[derive(Debug)]
pub struct Logger {
    log_file: PathBuf,
    log_level: String,
    write_lock: Mutex<()>,
}

impl Logger {
    /// Initialize logger.
    ///
    /// # Arguments
    /// * `log_file` - Path to log file. If None, creates a timestamped file in temp directory.
    /// * `log_level` - Logging level (defaults to "INFO"). At "DEBUG" prompts are included.
    pub fn new(log_file: Option<&Path>, log_level: Option<&str>) -> Result<Self> {
        let log_file = match log_file {
            Some(p) => p.to_path_buf(),
            None => std::env::temp_dir().join("lorekeeper-logs").join(format!(
                "transcript_{}_{}.md",
                Utc::now().timestamp_millis(),
                std::process::id()
            )),
        };

        if let Some(parent) = log_file.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let logger = Self {
            log_file,
            log_level: log_level.unwrap_or("INFO").to_uppercase(),
            write_lock: Mutex::new(()),
        };

        if !logger.log_file.exists() {
            logger.initialize_log_file()?;
        }

        Ok(logger)
    }

    fn initialize_log_file(&self) -> Result<()> {
        let mut file = File::create(&self.log_file)
            .with_context(|| format!("Failed to create log file: {}", self.log_file.display()))?;

        let now: DateTime<Utc> = Utc::now();

        writeln!(file, "# Lorekeeper Conversation Log\n")?;
        writeln!(file, "Log started: {}\n", now.to_rfc3339())?;
        writeln!(file, "---\n")?;

        Ok(())
    }

    fn append_to_log(&self, content: &str) -> Result<()> {
        // Concurrent turns on different conversations share the file.
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Transcript lock poisoned"))?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .with_context(|| format!("Failed to open log file: {}", self.log_file.display()))?;

        write!(file, "{}", content).with_context(|| "Failed to write to log file")?;

        Ok(())
    }

    fn is_debug(&self) -> bool {
        self.log_level == "DEBUG" || self.log_level == "TRACE"
    }

    /// Log the start of a turn.
    pub fn log_turn_start(&self, conversation_id: &str, question: &str, topology: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "## Turn - {}\n\n**Conversation:** `{}`\n**Topology:** {}\n**Question:** {}\n\n",
            now.to_rfc3339(),
            conversation_id,
            topology,
            question.trim()
        );
        self.append_to_log(&content)
    }

    /// Log a completed step.
    ///
    /// # Arguments
    /// * `step` - Node name.
    /// * `summary` - One-line description of what the step appended.
    /// * `retry_count` - Counter value after the step's patch was applied.
    pub fn log_step(&self, step: &str, summary: &str, retry_count: u32) -> Result<()> {
        let content = format!(
            "### Step `{}`\n\n{}\n\n**Retry count:** {}\n\n",
            step, summary, retry_count
        );
        self.append_to_log(&content)
    }

    /// Log a rendered prompt. Only written at DEBUG level.
    pub fn log_prompt(&self, prompt_id: &str, rendered: &str) -> Result<()> {
        if !self.is_debug() {
            return Ok(());
        }
        let content = format!("**Prompt `{}`:**\n```\n{}\n```\n\n", prompt_id, rendered);
        self.append_to_log(&content)
    }

    /// Log the router's classification.
    pub fn log_route_decision(&self, route: &str, defaulted: bool) -> Result<()> {
        let suffix = if defaulted { " (fallback)" } else { "" };
        self.append_to_log(&format!("**Route:** {}{}\n\n", route, suffix))
    }

    /// Log the grader's decision.
    pub fn log_grade_decision(&self, decision: &str, reason: &str) -> Result<()> {
        self.append_to_log(&format!("**Grade:** {} ({})\n\n", decision, reason))
    }

    /// Log a recovered port failure.
    ///
    /// # Arguments
    /// * `step` - Node in which the failure happened.
    /// * `kind` - `port_call` or `schema_violation`.
    /// * `error` - Error description.
    pub fn log_port_error(&self, step: &str, kind: &str, error: &str) -> Result<()> {
        let now: DateTime<Utc> = Utc::now();
        let content = format!(
            "### Recovered Error - {}\n\n**Step:** `{}`\n**Kind:** {}\n**Error:** {}\n\n",
            now.to_rfc3339(),
            step,
            kind,
            error
        );
        self.append_to_log(&content)
    }

    /// Log a repair applied to loaded state.
    pub fn log_state_repair(&self, conversation_id: &str, issues: &[String]) -> Result<()> {
        if issues.is_empty() {
            return Ok(());
        }
        let mut content = format!("### State Repaired\n\n**Conversation:** `{}`\n\n", conversation_id);
        for issue in issues {
            content.push_str(&format!("- {}\n", issue));
        }
        content.push('\n');
        self.append_to_log(&content)
    }

    /// Log the end of a turn.
    pub fn log_turn_complete(&self, answer: &str, steps: u32) -> Result<()> {
        let content = format!(
            "### Answer\n\n{}\n\n**Steps:** {}\n\n---\n\n",
            answer.trim(),
            steps
        );
        self.append_to_log(&content)
    }

    /// Get the log file path.
    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Get the log level.
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

#[cfg(test)]
mod tests;
