//! Structured output schemas and their coercion rules.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

use super::port::{JudgmentError, JudgmentResult};
use crate::provider::InternalToolDefinition;

/// Intent classification produced by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteDecision {
    #[serde(rename = "chit-chat")]
    ChitChat,
    #[serde(rename = "retrieval")]
    Retrieval,
}

impl RouteDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteDecision::ChitChat => "chit-chat",
            RouteDecision::Retrieval => "retrieval",
        }
    }

    /// Lenient parse: case-insensitive, accepts the common spellings.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "chit-chat" | "chitchat" | "chit_chat" => Some(RouteDecision::ChitChat),
            "retrieval" | "retrieve" => Some(RouteDecision::Retrieval),
            _ => None,
        }
    }
}

impl fmt::Display for RouteDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which structured shape a call must return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// `{"path": "chit-chat" | "retrieval"}`
    Route,
    /// `{"binary_score": bool}`
    Relevance,
}

/// A validated structured value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredValue {
    Route(RouteDecision),
    Relevance(bool),
}

impl StructuredValue {
    pub fn as_route(&self) -> Option<RouteDecision> {
        match self {
            StructuredValue::Route(route) => Some(*route),
            _ => None,
        }
    }

    pub fn as_relevance(&self) -> Option<bool> {
        match self {
            StructuredValue::Relevance(relevant) => Some(*relevant),
            _ => None,
        }
    }
}

/// Output contract for a structured judgment call.
///
/// Exposed to the model as a function whose arguments are the structured
/// value, then checked by [`OutputSchema::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSchema {
    pub kind: SchemaKind,
    pub name: &'static str,
    pub description: &'static str,
}

impl OutputSchema {
    pub fn route() -> Self {
        Self {
            kind: SchemaKind::Route,
            name: "route",
            description: "Route to either 'chit-chat' for greetings/general conversation or 'retrieval' for specific Harry Potter queries",
        }
    }

    pub fn relevance() -> Self {
        Self {
            kind: SchemaKind::Relevance,
            name: "grade_documents",
            description: "Binary relevance score for the retrieved documents",
        }
    }

    /// JSON Schema of the function arguments.
    pub fn parameters(&self) -> Value {
        match self.kind {
            SchemaKind::Route => json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "enum": ["chit-chat", "retrieval"],
                        "description": self.description,
                    }
                },
                "required": ["path"]
            }),
            SchemaKind::Relevance => json!({
                "type": "object",
                "properties": {
                    "binary_score": {
                        "type": "boolean",
                        "description": "true if the documents are relevant to the question, false otherwise",
                    }
                },
                "required": ["binary_score"]
            }),
        }
    }

    pub fn tool_definition(&self) -> InternalToolDefinition {
        InternalToolDefinition::new(self.name, self.description, self.parameters())
    }

    fn violation(&self, message: impl Into<String>) -> JudgmentError {
        JudgmentError::SchemaViolation {
            schema: self.name.to_string(),
            message: message.into(),
        }
    }

    /// Coerce a model value into this schema.
    ///
    /// Accepts the canonical object, or the bare field value. Routes parse
    /// with [`RouteDecision::parse`]. Relevance takes JSON booleans, or the
    /// strings `yes`/`true` and `no`/`false` (trimmed, case-insensitive).
    /// Anything else is a [`JudgmentError::SchemaViolation`].
    pub fn validate(&self, value: &Value) -> JudgmentResult<StructuredValue> {
        match self.kind {
            SchemaKind::Route => {
                let raw = value.get("path").unwrap_or(value);
                let text = raw
                    .as_str()
                    .ok_or_else(|| self.violation(format!("'path' must be a string, got {}", raw)))?;
                RouteDecision::parse(text)
                    .map(StructuredValue::Route)
                    .ok_or_else(|| self.violation(format!("unknown route '{}'", text)))
            }
            SchemaKind::Relevance => {
                let raw = value.get("binary_score").unwrap_or(value);
                let relevant = match raw {
                    Value::Bool(b) => Some(*b),
                    Value::String(s) => match s.trim().to_lowercase().as_str() {
                        "yes" | "true" => Some(true),
                        "no" | "false" => Some(false),
                        _ => None,
                    },
                    _ => None,
                };
                relevant
                    .map(StructuredValue::Relevance)
                    .ok_or_else(|| self.violation(format!("'binary_score' is not boolean-like: {}", raw)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_spellings() {
        let schema = OutputSchema::route();
        for (input, expected) in [
            (json!({"path": "chit-chat"}), RouteDecision::ChitChat),
            (json!({"path": "ChitChat"}), RouteDecision::ChitChat),
            (json!({"path": " chit_chat "}), RouteDecision::ChitChat),
            (json!({"path": "retrieval"}), RouteDecision::Retrieval),
            (json!({"path": "RETRIEVE"}), RouteDecision::Retrieval),
            (json!("retrieval"), RouteDecision::Retrieval),
        ] {
            assert_eq!(
                schema.validate(&input).unwrap(),
                StructuredValue::Route(expected),
                "input {}",
                input
            );
        }
    }

    #[test]
    fn test_route_violations() {
        let schema = OutputSchema::route();
        for input in [json!({"path": "search"}), json!({"path": 1}), json!({}), json!(null)] {
            let err = schema.validate(&input).unwrap_err();
            assert!(err.is_schema_violation(), "input {}", input);
        }
    }

    #[test]
    fn test_relevance_coercion() {
        let schema = OutputSchema::relevance();
        for (input, expected) in [
            (json!({"binary_score": true}), true),
            (json!({"binary_score": false}), false),
            (json!({"binary_score": "yes"}), true),
            (json!({"binary_score": " No "}), false),
            (json!({"binary_score": "TRUE"}), true),
            (json!("no"), false),
        ] {
            assert_eq!(
                schema.validate(&input).unwrap().as_relevance(),
                Some(expected),
                "input {}",
                input
            );
        }
    }

    #[test]
    fn test_relevance_violations() {
        let schema = OutputSchema::relevance();
        for input in [
            json!({"binary_score": "maybe"}),
            json!({"binary_score": 1}),
            json!({"score": "yes"}),
        ] {
            match schema.validate(&input) {
                Err(JudgmentError::SchemaViolation { schema, .. }) => {
                    assert_eq!(schema, "grade_documents")
                }
                other => panic!("input {} gave {:?}", input, other),
            }
        }
    }

    #[test]
    fn test_tool_definitions_are_valid() {
        assert!(OutputSchema::route().tool_definition().validate().is_ok());
        assert!(OutputSchema::relevance().tool_definition().validate().is_ok());
    }
}
