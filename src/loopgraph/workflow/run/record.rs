// SPDX-License-Identifier: MIT

//! Run records and the execution log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::loopgraph::workflow::graph::GraphDefinition;
use crate::loopgraph::workflow::state::{StateSnapshot, WorkflowState};

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, first node not yet executed
    Pending,
    Running,
    Completed,
    Failed,
    /// Stopped by the step ceiling
    MaxStepsExceeded,
    /// Stopped by a cancel request
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Pending | RunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::MaxStepsExceeded => "max_steps_exceeded",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a run failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No callable registered for the node's function identifier
    UnresolvedFunction,
    /// The callable returned an error
    NodeExecution,
}

/// Failure detail attached to a failed run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RunFailure {
    pub kind: FailureKind,
    pub node: String,
    pub function: String,
    pub message: String,
}

impl RunFailure {
    pub fn unresolved(node: &str, function: &str) -> Self {
        Self {
            kind: FailureKind::UnresolvedFunction,
            node: node.to_string(),
            function: function.to_string(),
            message: format!("Function '{}' not found for node '{}'", function, node),
        }
    }

    pub fn node_execution(node: &str, function: &str, error: impl fmt::Display) -> Self {
        Self {
            kind: FailureKind::NodeExecution,
            node: node.to_string(),
            function: function.to_string(),
            message: format!("Error in node '{}': {}", node, error),
        }
    }
}

/// One executed step. Never modified after it is appended.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
    /// 1-based step number
    pub step: usize,
    pub node: String,
    pub timestamp: DateTime<Utc>,
    /// State as it was right after this node's output was merged
    pub state_snapshot: StateSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Record of one run: live state, execution log and status.
///
/// Only the engine mutates a record; everyone else sees it through `&`
/// accessors or an owned copy handed out by the run store.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    run_id: String,
    graph_id: String,
    graph_name: String,
    status: RunStatus,
    current_node: Option<String>,
    steps: usize,
    state: WorkflowState,
    execution_log: Vec<LogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<RunFailure>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// New pending record; the initial values are layered over the graph's state defaults
    pub fn new(run_id: impl Into<String>, graph: &GraphDefinition, initial: Map<String, Value>) -> Self {
        let now = Utc::now();
        Self {
            run_id: run_id.into(),
            graph_id: graph.id().to_string(),
            graph_name: graph.name().to_string(),
            status: RunStatus::Pending,
            current_node: None,
            steps: 0,
            state: WorkflowState::with_initial(graph.schema(), initial),
            execution_log: Vec::new(),
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn graph_name(&self) -> &str {
        &self.graph_name
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn current_node(&self) -> Option<&str> {
        self.current_node.as_deref()
    }

    /// Number of node executions so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.execution_log
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            graph_id: self.graph_id.clone(),
            status: self.status,
            steps: self.steps,
            log_entry_count: self.execution_log.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    pub(crate) fn begin(&mut self, entry: &str) {
        debug_assert_eq!(self.status, RunStatus::Pending);
        self.status = RunStatus::Running;
        self.current_node = Some(entry.to_string());
        self.touch();
    }

    pub(crate) fn set_current_node(&mut self, node: &str) {
        self.current_node = Some(node.to_string());
    }

    pub(crate) fn state_mut(&mut self) -> &mut WorkflowState {
        &mut self.state
    }

    /// Append a log entry with a snapshot of the current state
    pub(crate) fn record_step(&mut self, node: &str, message: Option<String>) -> &LogEntry {
        self.steps += 1;
        self.execution_log.push(LogEntry {
            step: self.steps,
            node: node.to_string(),
            timestamp: Utc::now(),
            state_snapshot: self.state.snapshot(),
            message,
        });
        self.touch();
        &self.execution_log[self.execution_log.len() - 1]
    }

    /// Move to a terminal status. Has no effect once the run is terminal.
    pub(crate) fn finish(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            log::warn!(
                "Run {} already finished as {}; ignoring {}",
                self.run_id,
                self.status,
                status
            );
            return;
        }
        self.status = status;
        self.touch();
    }

    pub(crate) fn fail(&mut self, failure: RunFailure) {
        if self.status.is_terminal() {
            return;
        }
        self.failure = Some(failure);
        self.finish(RunStatus::Failed);
    }

    /// Bring a published copy up to date with the engine's record.
    /// Only new log entries are cloned.
    pub(crate) fn sync_from(&mut self, source: &RunRecord) {
        let known = self.execution_log.len();
        if known <= source.execution_log.len() {
            self.execution_log
                .extend(source.execution_log[known..].iter().cloned());
        }
        self.status = source.status;
        self.current_node = source.current_node.clone();
        self.steps = source.steps;
        self.state = source.state.clone();
        self.failure = source.failure.clone();
        self.updated_at = source.updated_at;
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Light-weight listing entry for a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub graph_id: String,
    pub status: RunStatus,
    pub steps: usize,
    pub log_entry_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
