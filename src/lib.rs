// SPDX-License-Identifier: MIT

pub mod loopgraph;
pub mod sdk;
