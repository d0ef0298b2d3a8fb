// SPDX-License-Identifier: MIT

//! Validated, immutable graph definitions

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::predicate::{LoopPredicate, ThresholdPredicate};
use super::types::{GraphSpec, NodeKind, NodeSpec};
use crate::loopgraph::workflow::state::StateSchema;
use crate::sdk::GraphError;

/// A node after validation, with its function identifier resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub function: String,
    pub kind: NodeKind,
}

/// A validated graph. Cheap to share behind an `Arc`; never mutated.
pub struct GraphDefinition {
    id: String,
    name: String,
    description: String,
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<String, String>,
    entry: String,
    predicate: Arc<dyn LoopPredicate>,
    schema: Arc<StateSchema>,
    created_at: DateTime<Utc>,
}

/// Summary of a stored graph
#[derive(Debug, Clone, Serialize)]
pub struct GraphInfo {
    pub graph_id: String,
    pub name: String,
    pub description: String,
    pub entry_node: String,
    pub node_count: usize,
    pub edge_count: usize,
    pub loop_until: String,
    pub created_at: DateTime<Utc>,
}

impl GraphDefinition {
    /// Validate and build a graph using the default loop predicate
    pub fn build(
        name: impl Into<String>,
        nodes: BTreeMap<String, NodeSpec>,
        edges: BTreeMap<String, String>,
        entry: impl Into<String>,
    ) -> Result<Self, GraphError> {
        let entry = entry.into();
        if nodes.is_empty() {
            return Err(GraphError::Empty);
        }
        if entry.trim().is_empty() {
            return Err(GraphError::MissingEntry);
        }
        if !nodes.contains_key(&entry) {
            return Err(GraphError::EntryNotFound(entry));
        }
        for (from, to) in &edges {
            if !nodes.contains_key(from) {
                return Err(GraphError::UnknownEdgeSource {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
            if !nodes.contains_key(to) {
                return Err(GraphError::UnknownEdgeTarget {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        let mut resolved = BTreeMap::new();
        for (id, spec) in nodes {
            let function = spec.function.unwrap_or_else(|| id.clone());
            if function.trim().is_empty() {
                return Err(GraphError::EmptyFunction(id));
            }
            resolved.insert(
                id.clone(),
                Node {
                    id,
                    function,
                    kind: spec.kind,
                },
            );
        }

        let name = name.into();
        if resolved.keys().all(|id| edges.contains_key(id)) {
            log::warn!(
                "Graph '{}' has no terminal node; runs end only via the loop predicate or the step ceiling",
                name
            );
        }

        Ok(Self {
            id: String::new(),
            name,
            description: String::new(),
            nodes: resolved,
            edges,
            entry,
            predicate: Arc::new(ThresholdPredicate::default()),
            schema: Arc::new(StateSchema::default()),
            created_at: Utc::now(),
        })
    }

    /// Validate and build a graph from a payload
    pub fn from_spec(spec: GraphSpec) -> Result<Self, GraphError> {
        let GraphSpec {
            name,
            description,
            nodes,
            edges,
            entry_node,
            loop_until,
            state,
        } = spec;

        let mut graph = Self::build(name, nodes, edges, entry_node)?;
        graph.description = description;
        if let Some(cfg) = &loop_until {
            graph.predicate = Arc::new(ThresholdPredicate::from(cfg));
        }
        if let Some(schema) = state {
            graph.schema = Arc::new(schema);
        }
        Ok(graph)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replace the loop-continuation predicate
    pub fn with_predicate(mut self, predicate: impl LoopPredicate + 'static) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = Arc::new(schema);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// The single successor of `id`, if it has an outgoing edge
    pub fn successor(&self, id: &str) -> Option<&str> {
        self.edges.get(id).map(String::as_str)
    }

    pub fn edges(&self) -> &BTreeMap<String, String> {
        &self.edges
    }

    pub fn predicate(&self) -> &dyn LoopPredicate {
        self.predicate.as_ref()
    }

    pub fn schema(&self) -> Arc<StateSchema> {
        self.schema.clone()
    }

    pub fn info(&self) -> GraphInfo {
        GraphInfo {
            graph_id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            entry_node: self.entry.clone(),
            node_count: self.nodes.len(),
            edge_count: self.edges.len(),
            loop_until: self.predicate.describe(),
            created_at: self.created_at,
        }
    }
}

impl fmt::Debug for GraphDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("edges", &self.edges)
            .field("entry", &self.entry)
            .field("predicate", &self.predicate.describe())
            .finish()
    }
}
