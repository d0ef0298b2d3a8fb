//! Graph workflow executor

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::definition::GraphDefinition;
use crate::loopgraph::config::EngineConfig;
use crate::loopgraph::workflow::registry::Resolver;
use crate::loopgraph::workflow::run::{
    CancelFlag, LogEntry, RunFailure, RunRecord, RunSlot, RunStatus,
};
use crate::loopgraph::workflow::state::StateSnapshot;

/// Progress events emitted while a run executes
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Started {
        run_id: String,
        graph_id: String,
        entry_node: String,
    },
    StepCompleted {
        run_id: String,
        entry: LogEntry,
    },
    Finished {
        run_id: String,
        status: RunStatus,
        steps: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        failure: Option<RunFailure>,
        final_state: StateSnapshot,
    },
}

/// Optional side channels for a run: cancellation, publishing and events
#[derive(Clone, Default)]
pub struct RunHooks {
    pub cancel: CancelFlag,
    pub slot: Option<RunSlot>,
    pub events: Option<mpsc::Sender<RunEvent>>,
}

impl RunHooks {
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_slot(mut self, slot: RunSlot) -> Self {
        self.slot = Some(slot);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<RunEvent>) -> Self {
        self.events = Some(events);
        self
    }

    async fn publish(&self, record: &RunRecord) {
        if let Some(slot) = &self.slot {
            slot.publish(record).await;
        }
    }

    async fn emit(&self, event: RunEvent) {
        if let Some(tx) = &self.events {
            // A dropped receiver must not stop the run
            if tx.send(event).await.is_err() {
                log::debug!("Run event receiver dropped");
            }
        }
    }
}

/// Why the step loop stopped
enum Stop {
    Done(RunStatus),
    Failed(RunFailure),
}

/// Walks a graph one node at a time until a terminal status is reached
pub struct Engine {
    resolver: Arc<dyn Resolver>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(resolver: Arc<dyn Resolver>, config: EngineConfig) -> Self {
        Self { resolver, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `graph` against a pending record, driving it to a terminal status.
    ///
    /// Never returns an error: unresolved functions and node errors end the
    /// run as `Failed`, with the log kept up to the last successful step.
    pub async fn execute(&self, graph: &GraphDefinition, record: &mut RunRecord, hooks: &RunHooks) {
        record.begin(graph.entry());
        log::info!(
            "Run {} started on graph '{}' at node '{}'",
            record.run_id(),
            graph.name(),
            graph.entry()
        );
        hooks.publish(record).await;
        hooks
            .emit(RunEvent::Started {
                run_id: record.run_id().to_string(),
                graph_id: graph.id().to_string(),
                entry_node: graph.entry().to_string(),
            })
            .await;

        match self.step_loop(graph, record, hooks).await {
            Stop::Done(status) => record.finish(status),
            Stop::Failed(failure) => {
                log::error!("Run {} failed: {}", record.run_id(), failure.message);
                record.fail(failure);
            }
        }

        log::info!(
            "Run {} finished as {} after {} steps",
            record.run_id(),
            record.status(),
            record.steps()
        );
        hooks.publish(record).await;
        hooks
            .emit(RunEvent::Finished {
                run_id: record.run_id().to_string(),
                status: record.status(),
                steps: record.steps(),
                failure: record.failure().cloned(),
                final_state: record.state().snapshot(),
            })
            .await;
    }

    async fn step_loop(&self, graph: &GraphDefinition, record: &mut RunRecord, hooks: &RunHooks) -> Stop {
        let max_steps = self.config.max_steps;
        let mut current = graph.entry().to_string();

        loop {
            if hooks.cancel.is_cancelled() {
                log::warn!("Run {} cancelled before node '{}'", record.run_id(), current);
                return Stop::Done(RunStatus::Cancelled);
            }
            if record.steps() >= max_steps {
                log::warn!(
                    "Run {} hit the step ceiling ({}) before node '{}'",
                    record.run_id(),
                    max_steps,
                    current
                );
                return Stop::Done(RunStatus::MaxStepsExceeded);
            }

            record.set_current_node(&current);
            let Some(node) = graph.node(&current) else {
                // Unreachable for validated graphs
                return Stop::Failed(RunFailure::unresolved(&current, &current));
            };

            let Some(function) = self.resolver.resolve(&node.function).await else {
                return Stop::Failed(RunFailure::unresolved(&node.id, &node.function));
            };

            log::debug!("Executing node: {} ({})", node.id, node.function);
            let result = AssertUnwindSafe(function.call(record.state().as_map()))
                .catch_unwind()
                .await;
            match result {
                Ok(Ok(partial)) => record.state_mut().merge(partial),
                Ok(Err(e)) => {
                    return Stop::Failed(RunFailure::node_execution(&node.id, &node.function, e));
                }
                Err(payload) => {
                    let message = format!("panicked: {}", panic_message(payload.as_ref()));
                    return Stop::Failed(RunFailure::node_execution(
                        &node.id,
                        &node.function,
                        message,
                    ));
                }
            }

            let entry = record
                .record_step(
                    &node.id,
                    Some(format!("Node '{}' executed successfully", node.id)),
                )
                .clone();
            hooks.publish(record).await;
            hooks
                .emit(RunEvent::StepCompleted {
                    run_id: record.run_id().to_string(),
                    entry,
                })
                .await;

            let Some(next) = graph.successor(&node.id) else {
                log::debug!("Node '{}' has no outgoing edge", node.id);
                return Stop::Done(RunStatus::Completed);
            };

            if graph.predicate().is_satisfied(record.state()) {
                log::info!(
                    "Run {}: loop predicate satisfied after '{}', not following edge to '{}'",
                    record.run_id(),
                    node.id,
                    next
                );
                return Stop::Done(RunStatus::Completed);
            }

            current = next.to_string();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "unknown panic"
    }
}
