// SPDX-License-Identifier: MIT

//! Keyed in-memory store of run records
//!
//! Each run lives in its own slot. The map lock is only held to insert or
//! look up a slot, so reading one run never waits on another run's engine.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::record::{RunRecord, RunSummary};

/// Shared cancel request for one run
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Published copy of one run plus its cancel flag
#[derive(Clone)]
pub struct RunSlot {
    record: Arc<RwLock<RunRecord>>,
    cancel: CancelFlag,
}

impl RunSlot {
    fn new(record: RunRecord) -> Self {
        Self {
            record: Arc::new(RwLock::new(record)),
            cancel: CancelFlag::new(),
        }
    }

    /// Publish the engine's latest progress
    pub async fn publish(&self, source: &RunRecord) {
        let mut published = self.record.write().await;
        published.sync_from(source);
    }

    /// Owned copy of the published record
    pub async fn snapshot(&self) -> RunRecord {
        self.record.read().await.clone()
    }

    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }
}

#[derive(Clone, Default)]
pub struct RunStore {
    runs: Arc<RwLock<HashMap<String, RunSlot>>>,
}

impl RunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run and return the slot its engine publishes to
    pub async fn insert(&self, record: RunRecord) -> RunSlot {
        let id = record.run_id().to_string();
        let slot = RunSlot::new(record);
        let mut runs = self.runs.write().await;
        runs.insert(id, slot.clone());
        slot
    }

    pub async fn slot(&self, run_id: &str) -> Option<RunSlot> {
        let runs = self.runs.read().await;
        runs.get(run_id).cloned()
    }

    /// Owned copy of a run's latest published record
    pub async fn get(&self, run_id: &str) -> Option<RunRecord> {
        let slot = self.slot(run_id).await?;
        Some(slot.snapshot().await)
    }

    /// Summaries of runs, optionally filtered by graph, newest first
    pub async fn list(&self, graph_id: Option<&str>) -> Vec<RunSummary> {
        let slots: Vec<RunSlot> = {
            let runs = self.runs.read().await;
            runs.values().cloned().collect()
        };

        let mut summaries = Vec::with_capacity(slots.len());
        for slot in slots {
            let record = slot.record.read().await;
            if graph_id.map_or(true, |id| record.graph_id() == id) {
                summaries.push(record.summary());
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        summaries
    }

    pub async fn remove(&self, run_id: &str) -> bool {
        let mut runs = self.runs.write().await;
        runs.remove(run_id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopgraph::workflow::graph::{GraphDefinition, NodeSpec};
    use crate::loopgraph::workflow::run::RunStatus;
    use serde_json::Map;
    use std::collections::BTreeMap;

    fn graph(id: &str) -> GraphDefinition {
        let mut nodes = BTreeMap::new();
        nodes.insert("a".to_string(), NodeSpec::function("fa"));
        GraphDefinition::build("g", nodes, BTreeMap::new(), "a")
            .unwrap()
            .with_id(id)
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let flag = CancelFlag::new();
        let cloned = flag.clone();
        assert!(!flag.is_cancelled());
        cloned.cancel();
        assert!(flag.is_cancelled());
    }

    #[tokio::test]
    async fn test_insert_get_and_publish() {
        let store = RunStore::new();
        let g = graph("g1");
        let mut record = RunRecord::new("run_1", &g, Map::new());
        let slot = store.insert(record.clone()).await;

        assert_eq!(store.get("run_1").await.unwrap().status(), RunStatus::Pending);

        record.begin("a");
        record.record_step("a", None);
        slot.publish(&record).await;

        let published = store.get("run_1").await.unwrap();
        assert_eq!(published.status(), RunStatus::Running);
        assert_eq!(published.log().len(), 1);
        assert!(store.get("run_2").await.is_none());
    }

    #[tokio::test]
    async fn test_list_filters_by_graph() {
        let store = RunStore::new();
        let g1 = graph("g1");
        let g2 = graph("g2");
        store.insert(RunRecord::new("run_1", &g1, Map::new())).await;
        store.insert(RunRecord::new("run_2", &g2, Map::new())).await;
        store.insert(RunRecord::new("run_3", &g1, Map::new())).await;

        assert_eq!(store.list(None).await.len(), 3);
        let only_g1 = store.list(Some("g1")).await;
        assert_eq!(only_g1.len(), 2);
        assert!(only_g1.iter().all(|s| s.graph_id == "g1"));
    }

    #[tokio::test]
    async fn test_remove() {
        let store = RunStore::new();
        store.insert(RunRecord::new("run_1", &graph("g"), Map::new())).await;
        assert!(store.remove("run_1").await);
        assert!(store.get("run_1").await.is_none());
    }
}
