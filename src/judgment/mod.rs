//! Judgment port
//!
//! Model calls the graph makes: free text, schema-validated structured
//! values (route, relevance), and tool-enabled replies. [`LlmJudge`] is the
//! production implementation over an [`crate::provider::LlmProvider`].

pub mod llm_judge;
pub mod port;
pub mod schema;

pub use llm_judge::{extract_json_object, JudgeSettings, LlmJudge};
pub use port::{JudgmentError, JudgmentPort, JudgmentResult, ModelReply};
pub use schema::{OutputSchema, RouteDecision, SchemaKind, StructuredValue};
