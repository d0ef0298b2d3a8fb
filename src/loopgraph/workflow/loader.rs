//! Graph loader - YAML/JSON file loading and parsing
//!
//! JSON is a subset of YAML, so both formats go through the same parser.

use super::graph::GraphSpec;
use crate::sdk::Result;
use std::fs;
use std::path::Path;

/// Loads graph payloads from files
pub struct GraphLoader;

impl GraphLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a graph payload from a YAML or JSON file
    pub fn load_graph<P: AsRef<Path>>(&self, path: P) -> Result<GraphSpec> {
        let path = path.as_ref();
        log::debug!("Loading graph from {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a graph payload from a YAML or JSON string
    pub fn parse(content: &str) -> Result<GraphSpec> {
        let spec: GraphSpec = serde_yaml::from_str(content)?;
        Ok(spec)
    }
}

impl Default for GraphLoader {
    fn default() -> Self {
        Self::new()
    }
}
