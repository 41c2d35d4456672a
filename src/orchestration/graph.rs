//! Graph topologies as explicit transition tables.
//!
//! Each topology is a [`GraphSpec`]: an entry node and one outgoing [`Edge`]
//! per node. Conditional edges are plain functions of the step's
//! [`StepOutcome`] and the state after its patch was applied, so a topology
//! can be inspected and tested without running any step.

use std::fmt;
use std::str::FromStr;

use super::state::StatePatch;
use crate::checkpoint::ConversationState;
use crate::judgment::RouteDecision;

/// Rewrite cycles allowed per turn before grading is skipped.
pub const MAX_RETRIES: u32 = 2;

/// Steps of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Router,
    ChitChat,
    Generate,
    GenerateQueryOrRespond,
    Retrieve,
    GradeDocuments,
    Rewrite,
}

impl Node {
    pub const ALL: [Node; 7] = [
        Node::Router,
        Node::ChitChat,
        Node::Generate,
        Node::GenerateQueryOrRespond,
        Node::Retrieve,
        Node::GradeDocuments,
        Node::Rewrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Router => "router",
            Node::ChitChat => "chit_chat",
            Node::Generate => "generate",
            Node::GenerateQueryOrRespond => "generate_query_or_respond",
            Node::Retrieve => "retrieve",
            Node::GradeDocuments => "grade_documents",
            Node::Rewrite => "rewrite",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Node {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Node::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| format!("unknown node '{}'", s))
    }
}

/// Which graph shape a runtime drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Topology {
    /// Router, then chit-chat or retrieve-and-generate
    TwoPath,
    /// Tool-driven retrieval with relevance grading and bounded rewrites
    #[default]
    GradedRetry,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::TwoPath => "two_path",
            Topology::GradedRetry => "graded_retry",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topology {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "two_path" => Ok(Topology::TwoPath),
            "graded_retry" => Ok(Topology::GradedRetry),
            other => Err(format!("unknown topology '{}'", other)),
        }
    }
}

/// Grader verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeDecision {
    Generate,
    Rewrite,
}

impl GradeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GradeDecision::Generate => "generate",
            GradeDecision::Rewrite => "rewrite",
        }
    }
}

/// Out-of-band control value a step hands to its outgoing edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Route(RouteDecision),
    Grade(GradeDecision),
}

/// What a step produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub patch: StatePatch,
    pub decision: Option<Decision>,
    /// One line for the transcript
    pub summary: String,
}

impl StepOutcome {
    pub fn new(patch: StatePatch, summary: impl Into<String>) -> Self {
        Self {
            patch,
            decision: None,
            summary: summary.into(),
        }
    }

    pub fn with_decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Node(Node),
    End,
}

pub type RouteFn = fn(&StepOutcome, &ConversationState) -> Target;

#[derive(Clone, Copy)]
pub enum Edge {
    Always(Target),
    Conditional(RouteFn),
}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Always(target) => write!(f, "Always({:?})", target),
            Edge::Conditional(_) => f.write_str("Conditional"),
        }
    }
}

/// Router edge: retrieval goes to generate, anything else to chit-chat.
fn after_router(outcome: &StepOutcome, _state: &ConversationState) -> Target {
    match outcome.decision {
        Some(Decision::Route(RouteDecision::Retrieval)) => Target::Node(Node::Generate),
        _ => Target::Node(Node::ChitChat),
    }
}

/// Retrieve only when the message just appended carries tool requests.
fn should_retrieve(_outcome: &StepOutcome, state: &ConversationState) -> Target {
    match state.last_message() {
        Some(message) if message.has_tool_calls() => Target::Node(Node::Retrieve),
        _ => Target::End,
    }
}

/// Rewrite only on an explicit rewrite verdict.
fn after_grading(outcome: &StepOutcome, _state: &ConversationState) -> Target {
    match outcome.decision {
        Some(Decision::Grade(GradeDecision::Rewrite)) => Target::Node(Node::Rewrite),
        _ => Target::Node(Node::Generate),
    }
}

/// Transition table for one topology
#[derive(Debug, Clone)]
pub struct GraphSpec {
    topology: Topology,
    entry: Node,
    edges: Vec<(Node, Edge)>,
}

impl GraphSpec {
    pub fn for_topology(topology: Topology) -> Self {
        match topology {
            Topology::TwoPath => Self {
                topology,
                entry: Node::Router,
                edges: vec![
                    (Node::Router, Edge::Conditional(after_router)),
                    (Node::ChitChat, Edge::Always(Target::End)),
                    (Node::Generate, Edge::Always(Target::End)),
                ],
            },
            Topology::GradedRetry => Self {
                topology,
                entry: Node::GenerateQueryOrRespond,
                edges: vec![
                    (Node::GenerateQueryOrRespond, Edge::Conditional(should_retrieve)),
                    (Node::Retrieve, Edge::Always(Target::Node(Node::GradeDocuments))),
                    (Node::GradeDocuments, Edge::Conditional(after_grading)),
                    (Node::Rewrite, Edge::Always(Target::Node(Node::GenerateQueryOrRespond))),
                    (Node::Generate, Edge::Always(Target::End)),
                ],
            },
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn entry(&self) -> Node {
        self.entry
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.edges.iter().map(|(node, _)| *node).collect()
    }

    pub fn edges(&self) -> &[(Node, Edge)] {
        &self.edges
    }

    pub fn contains(&self, node: Node) -> bool {
        self.edges.iter().any(|(n, _)| *n == node)
    }

    /// Whether `name` is a node of this topology (for checkpoint repair).
    pub fn is_known_node(&self, name: &str) -> bool {
        name.parse::<Node>().map(|n| self.contains(n)).unwrap_or(false)
    }

    /// Where to go after `node` produced `outcome`. Nodes outside the
    /// topology end the turn.
    pub fn next(&self, node: Node, outcome: &StepOutcome, state: &ConversationState) -> Target {
        match self.edges.iter().find(|(n, _)| *n == node) {
            Some((_, Edge::Always(target))) => *target,
            Some((_, Edge::Conditional(route))) => route(outcome, state),
            None => Target::End,
        }
    }
}
