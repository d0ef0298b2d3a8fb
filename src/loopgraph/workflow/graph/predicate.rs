// SPDX-License-Identifier: MIT

//! Loop-continuation predicates
//!
//! Edges carry no conditions of their own. After a node runs and before its
//! outgoing edge is followed, the graph's predicate is checked; once it is
//! satisfied the run completes instead of following the edge.

use serde::{Deserialize, Serialize};

use crate::loopgraph::workflow::state::WorkflowState;

pub const DEFAULT_METRIC_KEY: &str = "quality_score";
pub const DEFAULT_THRESHOLD_KEY: &str = "threshold";
pub const DEFAULT_THRESHOLD: f64 = 80.0;

/// Decides whether a run is done before following the next edge
pub trait LoopPredicate: Send + Sync {
    /// True when the run should stop instead of following the edge
    fn is_satisfied(&self, state: &WorkflowState) -> bool;

    /// Short human-readable form, used in logs and graph listings
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> LoopPredicate for F
where
    F: Fn(&WorkflowState) -> bool + Send + Sync,
{
    fn is_satisfied(&self, state: &WorkflowState) -> bool {
        self(state)
    }
}

/// Satisfied when `state[metric] >= state[threshold_key]`.
///
/// A missing threshold key falls back to `default_threshold`; a missing or
/// non-numeric metric is never satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPredicate {
    metric_key: String,
    threshold_key: String,
    default_threshold: f64,
}

impl ThresholdPredicate {
    pub fn new(metric_key: impl Into<String>, threshold_key: impl Into<String>) -> Self {
        Self {
            metric_key: metric_key.into(),
            threshold_key: threshold_key.into(),
            default_threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_default_threshold(mut self, threshold: f64) -> Self {
        self.default_threshold = threshold;
        self
    }

    /// Threshold currently in effect for `state`
    pub fn threshold(&self, state: &WorkflowState) -> f64 {
        state
            .get_f64(&self.threshold_key)
            .unwrap_or(self.default_threshold)
    }
}

impl Default for ThresholdPredicate {
    fn default() -> Self {
        Self::new(DEFAULT_METRIC_KEY, DEFAULT_THRESHOLD_KEY)
    }
}

impl LoopPredicate for ThresholdPredicate {
    fn is_satisfied(&self, state: &WorkflowState) -> bool {
        match state.get_f64(&self.metric_key) {
            Some(metric) => metric >= self.threshold(state),
            None => false,
        }
    }

    fn describe(&self) -> String {
        format!(
            "{} >= {} (default {})",
            self.metric_key, self.threshold_key, self.default_threshold
        )
    }
}

/// Never satisfied: only terminal nodes or the step ceiling end the run
#[derive(Debug, Clone, Copy, Default)]
pub struct Never;

impl LoopPredicate for Never {
    fn is_satisfied(&self, _state: &WorkflowState) -> bool {
        false
    }

    fn describe(&self) -> String {
        "never".to_string()
    }
}

/// Serializable configuration of a [`ThresholdPredicate`]
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct LoopUntil {
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_threshold_key")]
    pub threshold_key: String,
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,
}

fn default_metric() -> String {
    DEFAULT_METRIC_KEY.to_string()
}

fn default_threshold_key() -> String {
    DEFAULT_THRESHOLD_KEY.to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

impl Default for LoopUntil {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            threshold_key: default_threshold_key(),
            default_threshold: default_threshold(),
        }
    }
}

impl From<&LoopUntil> for ThresholdPredicate {
    fn from(cfg: &LoopUntil) -> Self {
        ThresholdPredicate::new(&cfg.metric, &cfg.threshold_key)
            .with_default_threshold(cfg.default_threshold)
    }
}
