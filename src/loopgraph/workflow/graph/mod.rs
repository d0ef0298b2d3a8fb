// SPDX-License-Identifier: MIT

//! Graph-based workflow execution
//!
//! A graph maps node ids to functions, each node to at most one successor,
//! and carries a loop predicate that decides when following edges stops.
//! The executor walks it one node at a time.

mod definition;
pub mod executor;
pub mod predicate;
mod store;
pub mod types;

pub use definition::{GraphDefinition, GraphInfo, Node};
pub use executor::{Engine, RunEvent, RunHooks};
pub use predicate::{LoopPredicate, LoopUntil, Never, ThresholdPredicate};
pub use store::GraphStore;
pub use types::{GraphSpec, NodeKind, NodeSpec};
