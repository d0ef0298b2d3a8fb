// SPDX-License-Identifier: MIT

//! Standalone smell detector, usable as an extra node in review graphs

use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::code_review::wrap;
use crate::sdk::{partial_from, BoxError, NodeFunction, PartialState};

const MAX_LINES: usize = 50;
const MAX_CONDITIONALS: usize = 5;

pub fn create_functions() -> Vec<Arc<dyn NodeFunction>> {
    vec![wrap("detect_smells", "Detect code smells", detect_smells)]
}

/// Reads `code`; writes `smells` and `smell_count`
pub fn detect_smells(state: &Map<String, Value>) -> Result<PartialState, BoxError> {
    let code = state.get("code").and_then(Value::as_str).unwrap_or("");
    let mut smells = Vec::new();

    if code.split('\n').count() > MAX_LINES {
        smells.push("Long function detected");
    }
    // "elif" lines count twice
    if code.matches("if").count() + code.matches("elif").count() > MAX_CONDITIONALS {
        smells.push("High cyclomatic complexity");
    }
    if code.contains("pass") && code.contains("def") {
        smells.push("Empty function detected");
    }

    let count = smells.len();
    Ok(partial_from(json!({
        "smells": smells,
        "smell_count": count,
    })))
}
