// SPDX-License-Identifier: MIT

//! Building blocks shared by the engine and by node function authors.

pub mod error;
pub mod function;

pub use error::{GraphError, LoopGraphError, Result};
pub use function::{partial_from, BoxError, FnFunction, NodeFunction, PartialState};
