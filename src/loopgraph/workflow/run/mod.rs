// SPDX-License-Identifier: MIT

//! Runs: records, the execution log, the run store and the manager

mod manager;
mod record;
mod store;

pub use manager::RunManager;
pub use record::{FailureKind, LogEntry, RunFailure, RunRecord, RunStatus, RunSummary};
pub use store::{CancelFlag, RunSlot, RunStore};
