// SPDX-License-Identifier: MIT

//! State management for workflow runs
//!
//! This module provides:
//! - `StateSchema` - optional per-key types, defaults and reducers
//! - `WorkflowState` - the single live, ordered state of a run
//! - `StateSnapshot` - immutable deep copies kept in the execution log

mod schema;
mod store;

pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema};
pub use store::{StateSnapshot, WorkflowState};
