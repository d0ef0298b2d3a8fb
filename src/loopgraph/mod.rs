// SPDX-License-Identifier: MIT

pub mod config;
pub mod functions;
pub mod server;
pub mod workflow;
