// SPDX-License-Identifier: MIT

//! Typed error handling for loopgraph-rs
//!
//! Graph validation problems surface synchronously as [`GraphError`]. Failures
//! that happen while a run is executing never become an `Err`; they are
//! recorded on the run record instead.

use thiserror::Error;

/// Top-level error type for loopgraph-rs
#[derive(Debug, Error)]
pub enum LoopGraphError {
    /// Graph definition failed validation
    #[error("Invalid graph: {0}")]
    Graph(#[from] GraphError),

    /// No graph stored under this id
    #[error("Graph '{id}' not found")]
    GraphNotFound { id: String },

    /// No run stored under this id
    #[error("Run '{id}' not found")]
    RunNotFound { id: String },

    /// Configuration errors (bad env vars, invalid config values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error wrapper
    #[error("{0}")]
    Other(String),
}

/// Graph validation errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Graph has no nodes at all
    #[error("Graph must contain at least one node")]
    Empty,

    /// Entry node id is blank
    #[error("Entry node is required")]
    MissingEntry,

    /// Entry node id does not name a node
    #[error("Entry node '{0}' not found in nodes")]
    EntryNotFound(String),

    /// Edge starts at a node that does not exist
    #[error("Edge from '{from}' references non-existent node '{from}'")]
    UnknownEdgeSource { from: String, to: String },

    /// Edge points to a node that does not exist
    #[error("Edge from '{from}' to '{to}' references non-existent node '{to}'")]
    UnknownEdgeTarget { from: String, to: String },

    /// Node declares a blank function identifier
    #[error("Node '{0}' has an empty function identifier")]
    EmptyFunction(String),
}

impl LoopGraphError {
    pub fn graph_not_found(id: impl Into<String>) -> Self {
        Self::GraphNotFound { id: id.into() }
    }

    pub fn run_not_found(id: impl Into<String>) -> Self {
        Self::RunNotFound { id: id.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<String> for LoopGraphError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for LoopGraphError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoopGraphError>;
