//! Graph payload type definitions
//!
//! These are the shapes accepted from graph files and from the HTTP layer.
//! They are validated into a [`GraphDefinition`](super::GraphDefinition).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::predicate::LoopUntil;
use crate::loopgraph::workflow::state::StateSchema;

/// A graph definition payload
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct GraphSpec {
    /// Name of the graph
    pub name: String,
    /// Description of the graph
    #[serde(default)]
    pub description: String,
    /// Node definitions keyed by node id
    pub nodes: BTreeMap<String, NodeSpec>,
    /// Edges: node id -> its single successor
    #[serde(default)]
    pub edges: BTreeMap<String, String>,
    /// Node the run starts at
    pub entry_node: String,
    /// Stop rule applied before following any edge
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_until: Option<LoopUntil>,
    /// Optional state schema (types, defaults, reducers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateSchema>,
}

/// A node in the graph
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct NodeSpec {
    /// Registered function name; defaults to the node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Kind of node
    #[serde(rename = "type", default)]
    pub kind: NodeKind,
}

impl NodeSpec {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            function: Some(name.into()),
            kind: NodeKind::Function,
        }
    }
}

/// Kind of node
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Invokes a registered function
    #[default]
    Function,
}
