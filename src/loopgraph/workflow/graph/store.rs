// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::definition::{GraphDefinition, GraphInfo};

/// Keyed in-memory store of validated graphs
#[derive(Clone, Default)]
pub struct GraphStore {
    graphs: Arc<RwLock<HashMap<String, Arc<GraphDefinition>>>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a graph under its id, replacing any graph with the same id
    pub async fn insert(&self, graph: GraphDefinition) -> Arc<GraphDefinition> {
        let graph = Arc::new(graph);
        let mut graphs = self.graphs.write().await;
        graphs.insert(graph.id().to_string(), graph.clone());
        graph
    }

    pub async fn get(&self, id: &str) -> Option<Arc<GraphDefinition>> {
        let graphs = self.graphs.read().await;
        graphs.get(id).cloned()
    }

    /// Summaries of all graphs, oldest first
    pub async fn list(&self) -> Vec<GraphInfo> {
        let graphs = self.graphs.read().await;
        let mut infos: Vec<GraphInfo> = graphs.values().map(|g| g.info()).collect();
        infos.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.graph_id.cmp(&b.graph_id))
        });
        infos
    }

    pub async fn remove(&self, id: &str) -> bool {
        let mut graphs = self.graphs.write().await;
        graphs.remove(id).is_some()
    }
}
