// SPDX-License-Identifier: MIT

//! Run manager - owns the graph and run stores and starts runs
//!
//! This is the surface the HTTP layer and the CLI talk to.

use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::record::{RunRecord, RunSummary};
use super::store::{RunSlot, RunStore};
use crate::loopgraph::config::EngineConfig;
use crate::loopgraph::workflow::graph::{
    Engine, GraphDefinition, GraphInfo, GraphSpec, GraphStore, RunEvent, RunHooks,
};
use crate::loopgraph::workflow::registry::Resolver;
use crate::sdk::{LoopGraphError, Result};

#[derive(Clone)]
pub struct RunManager {
    graphs: GraphStore,
    runs: RunStore,
    engine: Arc<Engine>,
}

impl RunManager {
    pub fn new(resolver: Arc<dyn Resolver>, config: EngineConfig) -> Self {
        Self {
            graphs: GraphStore::new(),
            runs: RunStore::new(),
            engine: Arc::new(Engine::new(resolver, config)),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Validate a graph payload and store it; returns the new graph id
    pub async fn create_graph(&self, spec: GraphSpec) -> Result<String> {
        let graph = GraphDefinition::from_spec(spec)?;
        Ok(self.register_graph(graph).await)
    }

    /// Store an already-built graph under a fresh id
    pub async fn register_graph(&self, graph: GraphDefinition) -> String {
        let id = Uuid::new_v4().to_string();
        let graph = graph.with_id(id.clone());
        log::info!(
            "Created graph '{}' ({}) with {} nodes",
            graph.name(),
            id,
            graph.nodes().count()
        );
        self.graphs.insert(graph).await;
        id
    }

    pub async fn get_graph(&self, graph_id: &str) -> Result<Arc<GraphDefinition>> {
        self.graphs
            .get(graph_id)
            .await
            .ok_or_else(|| LoopGraphError::graph_not_found(graph_id))
    }

    pub async fn list_graphs(&self) -> Vec<GraphInfo> {
        self.graphs.list().await
    }

    /// Remove a stored graph. Runs already started keep their own handle to it.
    pub async fn delete_graph(&self, graph_id: &str) -> Result<()> {
        if !self.graphs.remove(graph_id).await {
            return Err(LoopGraphError::graph_not_found(graph_id));
        }
        log::info!("Deleted graph {}", graph_id);
        Ok(())
    }

    /// Run a graph to completion and return the finished record.
    ///
    /// The result is `Err` only when the graph does not exist; run failures
    /// are reported through the record's status.
    pub async fn run(&self, graph_id: &str, initial: Map<String, Value>) -> Result<RunRecord> {
        let (graph, mut record, slot) = self.prepare(graph_id, initial).await?;
        let hooks = RunHooks::default()
            .with_cancel(slot.cancel_flag().clone())
            .with_slot(slot);
        self.engine.execute(&graph, &mut record, &hooks).await;
        Ok(record)
    }

    /// Start a run in the background; poll it with [`RunManager::get_run`]
    pub async fn spawn(&self, graph_id: &str, initial: Map<String, Value>) -> Result<String> {
        self.spawn_with_events(graph_id, initial, None).await
    }

    /// Start a run in the background, streaming its events into `events`
    pub async fn run_stream(
        &self,
        graph_id: &str,
        initial: Map<String, Value>,
        events: mpsc::Sender<RunEvent>,
    ) -> Result<String> {
        self.spawn_with_events(graph_id, initial, Some(events)).await
    }

    async fn spawn_with_events(
        &self,
        graph_id: &str,
        initial: Map<String, Value>,
        events: Option<mpsc::Sender<RunEvent>>,
    ) -> Result<String> {
        let (graph, mut record, slot) = self.prepare(graph_id, initial).await?;
        let run_id = record.run_id().to_string();

        let mut hooks = RunHooks::default()
            .with_cancel(slot.cancel_flag().clone())
            .with_slot(slot);
        hooks.events = events;

        let engine = self.engine.clone();
        tokio::spawn(async move {
            engine.execute(&graph, &mut record, &hooks).await;
        });

        Ok(run_id)
    }

    async fn prepare(
        &self,
        graph_id: &str,
        initial: Map<String, Value>,
    ) -> Result<(Arc<GraphDefinition>, RunRecord, RunSlot)> {
        let graph = self.get_graph(graph_id).await?;
        let run_id = new_run_id();
        let record = RunRecord::new(run_id, &graph, initial);
        let slot = self.runs.insert(record.clone()).await;
        Ok((graph, record, slot))
    }

    /// Latest published copy of a run
    pub async fn get_run(&self, run_id: &str) -> Result<RunRecord> {
        self.runs
            .get(run_id)
            .await
            .ok_or_else(|| LoopGraphError::run_not_found(run_id))
    }

    pub async fn list_runs(&self, graph_id: Option<&str>) -> Vec<RunSummary> {
        self.runs.list(graph_id).await
    }

    /// Request cancellation; the run stops before its next step.
    /// Returns false if the run had already finished.
    pub async fn cancel(&self, run_id: &str) -> Result<bool> {
        let slot = self
            .runs
            .slot(run_id)
            .await
            .ok_or_else(|| LoopGraphError::run_not_found(run_id))?;
        if slot.snapshot().await.status().is_terminal() {
            return Ok(false);
        }
        log::info!("Cancel requested for run {}", run_id);
        slot.cancel_flag().cancel();
        Ok(true)
    }

    /// Forget a run. A run still executing is cancelled first.
    pub async fn delete_run(&self, run_id: &str) -> Result<()> {
        let slot = self
            .runs
            .slot(run_id)
            .await
            .ok_or_else(|| LoopGraphError::run_not_found(run_id))?;
        slot.cancel_flag().cancel();
        self.runs.remove(run_id).await;
        log::info!("Deleted run {}", run_id);
        Ok(())
    }
}

fn new_run_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("run_{}", &id[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopgraph::workflow::graph::{Never, NodeSpec};
    use crate::loopgraph::workflow::registry::FunctionRegistry;
    use crate::loopgraph::workflow::run::{FailureKind, RunStatus};
    use crate::sdk::{BoxError, FnFunction, PartialState};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::time::Duration;

    async fn manager() -> RunManager {
        let registry = FunctionRegistry::new();
        registry
            .register(Arc::new(FnFunction::new(
                "bump",
                "Adds 10 to quality_score",
                |state: &Map<String, Value>| -> std::result::Result<PartialState, BoxError> {
                    let score = state
                        .get("quality_score")
                        .and_then(Value::as_i64)
                        .unwrap_or(0);
                    let mut out = Map::new();
                    out.insert("quality_score".to_string(), json!(score + 10));
                    Ok(out)
                },
            )))
            .await;
        RunManager::new(Arc::new(registry), EngineConfig { max_steps: 50 })
    }

    fn looping_spec() -> GraphSpec {
        let mut nodes = BTreeMap::new();
        nodes.insert("bump".to_string(), NodeSpec::default());
        let mut edges = BTreeMap::new();
        edges.insert("bump".to_string(), "bump".to_string());
        GraphSpec {
            name: "bumper".to_string(),
            nodes,
            edges,
            entry_node: "bump".to_string(),
            ..GraphSpec::default()
        }
    }

    #[test]
    fn test_run_id_format() {
        let id = new_run_id();
        assert!(id.starts_with("run_"));
        assert_eq!(id.len(), 12);
    }

    #[tokio::test]
    async fn test_create_and_run_graph() {
        let manager = manager().await;
        let graph_id = manager.create_graph(looping_spec()).await.unwrap();

        let record = manager.run(&graph_id, Map::new()).await.unwrap();

        assert_eq!(record.status(), RunStatus::Completed);
        assert_eq!(record.log().len(), 8);
        assert_eq!(record.state().get("quality_score"), Some(&json!(80)));

        let stored = manager.get_run(record.run_id()).await.unwrap();
        assert_eq!(stored.status(), RunStatus::Completed);
        assert_eq!(stored.log().len(), 8);
    }

    #[tokio::test]
    async fn test_invalid_graph_is_rejected() {
        let manager = manager().await;
        let mut spec = looping_spec();
        spec.entry_node = "missing".to_string();

        let err = manager.create_graph(spec).await.unwrap_err();
        assert!(matches!(err, LoopGraphError::Graph(_)));
        assert!(manager.list_graphs().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_graph_and_run() {
        let manager = manager().await;
        assert!(matches!(
            manager.run("nope", Map::new()).await,
            Err(LoopGraphError::GraphNotFound { .. })
        ));
        assert!(matches!(
            manager.get_run("run_nope").await,
            Err(LoopGraphError::RunNotFound { .. })
        ));
        assert!(manager.cancel("run_nope").await.is_err());
    }

    #[tokio::test]
    async fn test_spawned_run_finishes() {
        let manager = manager().await;
        let graph_id = manager.create_graph(looping_spec()).await.unwrap();

        let run_id = manager.spawn(&graph_id, Map::new()).await.unwrap();

        let mut record = manager.get_run(&run_id).await.unwrap();
        for _ in 0..100 {
            if record.status().is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            record = manager.get_run(&run_id).await.unwrap();
        }
        assert_eq!(record.status(), RunStatus::Completed);
        assert_eq!(manager.list_runs(Some(&graph_id)).await.len(), 1);

        // Finished runs cannot be cancelled
        assert!(!manager.cancel(&run_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_run_stream_emits_events() {
        let manager = manager().await;
        let graph_id = manager.create_graph(looping_spec()).await.unwrap();
        let (tx, mut rx) = mpsc::channel(64);

        manager.run_stream(&graph_id, Map::new(), tx).await.unwrap();

        let mut steps = 0;
        let mut finished = None;
        while let Some(event) = rx.recv().await {
            match event {
                RunEvent::StepCompleted { .. } => steps += 1,
                RunEvent::Finished { status, .. } => finished = Some(status),
                RunEvent::Started { .. } => {}
            }
        }
        assert_eq!(steps, 8);
        assert_eq!(finished, Some(RunStatus::Completed));
    }

    async fn wait_terminal(manager: &RunManager, run_id: &str) -> RunRecord {
        let mut record = manager.get_run(run_id).await.unwrap();
        for _ in 0..200 {
            if record.status().is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            record = manager.get_run(run_id).await.unwrap();
        }
        record
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_spawned_run() {
        let registry = FunctionRegistry::new();
        registry
            .register(Arc::new(FnFunction::new(
                "spin",
                "Sleeps briefly",
                |_: &Map<String, Value>| -> std::result::Result<PartialState, BoxError> {
                    std::thread::sleep(Duration::from_millis(5));
                    Ok(Map::new())
                },
            )))
            .await;
        let manager = RunManager::new(Arc::new(registry), EngineConfig { max_steps: 100_000 });
        let graph = GraphDefinition::build(
            "spin",
            BTreeMap::from([("spin".to_string(), NodeSpec::default())]),
            BTreeMap::from([("spin".to_string(), "spin".to_string())]),
            "spin",
        )
        .unwrap()
        .with_predicate(Never);
        let graph_id = manager.register_graph(graph).await;

        let run_id = manager.spawn(&graph_id, Map::new()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(manager.cancel(&run_id).await.unwrap());

        let record = wait_terminal(&manager, &run_id).await;
        assert_eq!(record.status(), RunStatus::Cancelled);
        assert!(record.steps() < 100_000);
        assert!(!manager.cancel(&run_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_spawned_run_with_panicking_node_fails() {
        let registry = FunctionRegistry::new();
        registry
            .register(Arc::new(FnFunction::new(
                "explode",
                "Indexes an empty list",
                |_: &Map<String, Value>| -> std::result::Result<PartialState, BoxError> {
                    let items: Vec<i64> = Vec::new();
                    let mut out = Map::new();
                    out.insert("first".to_string(), json!(items[0]));
                    Ok(out)
                },
            )))
            .await;
        let manager = RunManager::new(Arc::new(registry), EngineConfig::default());
        let mut spec = looping_spec();
        spec.nodes = BTreeMap::from([("explode".to_string(), NodeSpec::default())]);
        spec.edges = BTreeMap::new();
        spec.entry_node = "explode".to_string();
        let graph_id = manager.create_graph(spec).await.unwrap();

        let run_id = manager.spawn(&graph_id, Map::new()).await.unwrap();
        let record = wait_terminal(&manager, &run_id).await;

        assert_eq!(record.status(), RunStatus::Failed);
        let failure = record.failure().unwrap();
        assert_eq!(failure.kind, FailureKind::NodeExecution);
        assert_eq!(failure.node, "explode");
    }

    #[tokio::test]
    async fn test_delete_graph_and_run() {
        let manager = manager().await;
        let graph_id = manager.create_graph(looping_spec()).await.unwrap();
        let record = manager.run(&graph_id, Map::new()).await.unwrap();

        manager.delete_run(record.run_id()).await.unwrap();
        assert!(matches!(
            manager.get_run(record.run_id()).await,
            Err(LoopGraphError::RunNotFound { .. })
        ));
        assert!(manager.list_runs(None).await.is_empty());
        assert!(manager.delete_run(record.run_id()).await.is_err());

        manager.delete_graph(&graph_id).await.unwrap();
        assert!(manager.list_graphs().await.is_empty());
        assert!(matches!(
            manager.delete_graph(&graph_id).await,
            Err(LoopGraphError::GraphNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_runs_are_independent() {
        let manager = manager().await;
        let graph_id = manager.create_graph(looping_spec()).await.unwrap();

        let mut initial = Map::new();
        initial.insert("quality_score".to_string(), json!(60));

        let (a, b) = tokio::join!(
            manager.run(&graph_id, Map::new()),
            manager.run(&graph_id, initial)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.run_id(), b.run_id());
        assert_eq!(a.log().len(), 8);
        assert_eq!(b.log().len(), 2);
        assert_eq!(manager.list_runs(None).await.len(), 2);
    }
}
