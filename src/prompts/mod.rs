//! Prompt library
//!
//! Every model call names a [`PromptId`]. Templates use `{name}`
//! placeholders; rendering fails on a placeholder with no value rather than
//! sending a half-filled prompt. A directory of `<prompt_id>.md` files can
//! replace any built-in template.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Variables bound into a template
pub type PromptVars = HashMap<String, String>;

pub type PromptResult<T> = Result<T, PromptError>;

const PLACEHOLDER_PATTERN: &str = r"\{([a-z_]+)\}";

#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("Prompt '{prompt}' needs variable '{name}' but none was provided")]
    MissingVariable { prompt: PromptId, name: String },

    #[error("Prompt '{prompt}' uses unknown variable '{name}'")]
    UnknownVariable { prompt: PromptId, name: String },

    #[error("Unknown prompt id '{0}'")]
    UnknownPrompt(String),

    #[error("Failed to read prompt override {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid placeholder pattern: {0}")]
    Pattern(String),
}

/// Closed set of prompts used by the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    Router,
    ChitChat,
    GenerateQueryOrRespond,
    Grade,
    Rewrite,
    Generate,
}

impl PromptId {
    pub const ALL: [PromptId; 6] = [
        PromptId::Router,
        PromptId::ChitChat,
        PromptId::GenerateQueryOrRespond,
        PromptId::Grade,
        PromptId::Rewrite,
        PromptId::Generate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptId::Router => "router",
            PromptId::ChitChat => "chit_chat",
            PromptId::GenerateQueryOrRespond => "generate_query_or_respond",
            PromptId::Grade => "grade",
            PromptId::Rewrite => "rewrite",
            PromptId::Generate => "generate",
        }
    }

    /// Placeholders a template for this prompt may use.
    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            PromptId::Router | PromptId::ChitChat | PromptId::GenerateQueryOrRespond => {
                &["question", "history"]
            }
            PromptId::Grade | PromptId::Generate => &["question", "context"],
            PromptId::Rewrite => &["question"],
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            PromptId::Router => ROUTER_TEMPLATE,
            PromptId::ChitChat => CHIT_CHAT_TEMPLATE,
            PromptId::GenerateQueryOrRespond => GENERATE_QUERY_OR_RESPOND_TEMPLATE,
            PromptId::Grade => GRADE_TEMPLATE,
            PromptId::Rewrite => REWRITE_TEMPLATE,
            PromptId::Generate => GENERATE_TEMPLATE,
        }
    }
}

impl fmt::Display for PromptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptId {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PromptId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| PromptError::UnknownPrompt(s.to_string()))
    }
}

const ROUTER_TEMPLATE: &str = "You route messages sent to a Harry Potter assistant.

Classify the latest user message into exactly one path:
- \"chit-chat\": greetings, thanks, small talk, or general conversation that needs no specific facts.
- \"retrieval\": questions asking for specific Harry Potter information such as characters, events, places, spells or plot details.

Conversation so far:
{history}

Latest message: {question}";

const CHIT_CHAT_TEMPLATE: &str = "You are a friendly guide to the world of Harry Potter.
Reply warmly and briefly to the user's message.
If the message has nothing to do with Harry Potter, politely explain that you can only talk about Harry Potter.

Conversation so far:
{history}

User: {question}";

const GENERATE_QUERY_OR_RESPOND_TEMPLATE: &str = "Your task is to route the user question to either:

1. \"retrieve\" - if the question is about Harry Potter specific information or details. Call the retrieve_passages tool with a search query.
2. \"respond\" - respond to greetings and general chit-chat, but do not answer queries unrelated to Harry Potter, just say \"I'm sorry, I can only provide information about Harry Potter.\"

Conversation so far:
{history}

Question: {question}";

const GRADE_TEMPLATE: &str = "You are a grader assessing relevance of retrieved docs to a user question.
Here are the retrieved docs:
 -------
{context}
 -------
Here is the user question: {question}
If the content of the docs are relevant to the users question, score them as relevant.
Give a binary score 'yes' or 'no' score to indicate whether the docs are relevant to the question.
Yes: The docs are relevant to the question.
No: The docs are not relevant to the question.";

const REWRITE_TEMPLATE: &str = "Look at the input and try to reason about the underlying semantic intent / meaning.
Here is the initial question:
 -------
{question}
 -------
Formulate an improved question:";

const GENERATE_TEMPLATE: &str = "You are an assistant for question-answering tasks.
Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know.
Use three sentences maximum and keep the answer concise.
Question: {question}
Context: {context}";

/// Resolved templates for every [`PromptId`]
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    templates: HashMap<PromptId, String>,
    placeholder: Regex,
}

impl PromptLibrary {
    /// Library of built-in templates only.
    pub fn builtin() -> PromptResult<Self> {
        let placeholder =
            Regex::new(PLACEHOLDER_PATTERN).map_err(|e| PromptError::Pattern(e.to_string()))?;
        let templates = PromptId::ALL
            .into_iter()
            .map(|id| (id, id.builtin().to_string()))
            .collect();
        Ok(Self {
            templates,
            placeholder,
        })
    }

    /// Built-ins, with any `<prompt_id>.md` in `dir` taking their place.
    ///
    /// Overrides are checked against the prompt's allowed variables at load.
    pub fn with_overrides(dir: &Path) -> PromptResult<Self> {
        let mut library = Self::builtin()?;
        for id in PromptId::ALL {
            let path = dir.join(format!("{}.md", id.as_str()));
            if !path.is_file() {
                continue;
            }
            let template = std::fs::read_to_string(&path).map_err(|source| PromptError::Io {
                path: path.clone(),
                source,
            })?;
            library.set(id, template)?;
            tracing::debug!(prompt = %id, path = %path.display(), "prompt override loaded");
        }
        Ok(library)
    }

    /// Replace one template after checking its placeholders.
    pub fn set(&mut self, id: PromptId, template: impl Into<String>) -> PromptResult<()> {
        let template = template.into();
        for name in self.placeholders(&template) {
            if !id.variables().contains(&name.as_str()) {
                return Err(PromptError::UnknownVariable { prompt: id, name });
            }
        }
        self.templates.insert(id, template);
        Ok(())
    }

    pub fn template(&self, id: PromptId) -> &str {
        self.templates
            .get(&id)
            .map(String::as_str)
            .unwrap_or_else(|| id.builtin())
    }

    fn placeholders(&self, template: &str) -> Vec<String> {
        self.placeholder
            .captures_iter(template)
            .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
            .collect()
    }

    /// Substitute `vars` into the template for `id`.
    pub fn render(&self, id: PromptId, vars: &PromptVars) -> PromptResult<String> {
        let template = self.template(id);
        if let Some(name) = self
            .placeholders(template)
            .into_iter()
            .find(|name| !vars.contains_key(name))
        {
            return Err(PromptError::MissingVariable { prompt: id, name });
        }

        let rendered = self
            .placeholder
            .replace_all(template, |caps: &regex::Captures<'_>| {
                vars.get(&caps[1]).cloned().unwrap_or_default()
            });
        Ok(rendered.into_owned())
    }
}

/// Build a [`PromptVars`] map from name/value pairs.
pub fn prompt_vars<const N: usize>(pairs: [(&str, String); N]) -> PromptVars {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_id_roundtrip() {
        for id in PromptId::ALL {
            assert_eq!(id.as_str().parse::<PromptId>().unwrap(), id);
        }
        assert!(matches!(
            "summarize".parse::<PromptId>(),
            Err(PromptError::UnknownPrompt(_))
        ));
    }

    #[test]
    fn test_builtins_only_use_declared_variables() {
        let library = PromptLibrary::builtin().unwrap();
        for id in PromptId::ALL {
            for name in library.placeholders(library.template(id)) {
                assert!(id.variables().contains(&name.as_str()), "{} uses {}", id, name);
            }
        }
    }

    #[test]
    fn test_render_generate() {
        let library = PromptLibrary::builtin().unwrap();
        let rendered = library
            .render(
                PromptId::Generate,
                &prompt_vars([
                    ("question", "Who is Dobby?".to_string()),
                    ("context", "Dobby is a house-elf.".to_string()),
                ]),
            )
            .unwrap();
        assert!(rendered.contains("Question: Who is Dobby?"));
        assert!(rendered.contains("Context: Dobby is a house-elf."));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn test_values_are_not_reexpanded() {
        let library = PromptLibrary::builtin().unwrap();
        let rendered = library
            .render(
                PromptId::Rewrite,
                &prompt_vars([("question", "what is {context}?".to_string())]),
            )
            .unwrap();
        assert!(rendered.contains("what is {context}?"));
    }

    #[test]
    fn test_missing_variable() {
        let library = PromptLibrary::builtin().unwrap();
        let err = library
            .render(
                PromptId::Grade,
                &prompt_vars([("question", "q".to_string())]),
            )
            .unwrap_err();
        match err {
            PromptError::MissingVariable { prompt, name } => {
                assert_eq!(prompt, PromptId::Grade);
                assert_eq!(name, "context");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_overrides_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("chit_chat.md"), "Say hi about {question}").unwrap();
        std::fs::write(dir.path().join("unrelated.md"), "ignored").unwrap();

        let library = PromptLibrary::with_overrides(dir.path()).unwrap();
        assert_eq!(library.template(PromptId::ChitChat), "Say hi about {question}");
        assert_eq!(library.template(PromptId::Generate), GENERATE_TEMPLATE);
    }

    #[test]
    fn test_override_with_unknown_variable_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rewrite.md"), "Improve {question} using {context}").unwrap();

        let err = PromptLibrary::with_overrides(dir.path()).unwrap_err();
        assert!(matches!(
            err,
            PromptError::UnknownVariable { prompt: PromptId::Rewrite, .. }
        ));
    }
}
