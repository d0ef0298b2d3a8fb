// SPDX-License-Identifier: MIT

//! Code review mini-agent
//!
//! Four functions meant to be wired as
//! `extract_functions -> check_complexity -> detect_issues -> suggest_improvements`
//! with `suggest_improvements` looping back to `check_complexity` until
//! `quality_score` reaches the threshold. They analyse Python source held in
//! the `code` state key using line-based heuristics.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::sdk::{partial_from, BoxError, FnFunction, NodeFunction, PartialState};

static DEF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<indent>[ \t]*)(?:async\s+)?def\s+(?P<name>\w+)\s*\((?P<args>[^)]*)")
        .expect("function definition pattern is valid")
});

pub fn create_functions() -> Vec<Arc<dyn NodeFunction>> {
    vec![
        wrap(
            "extract_functions",
            "Extract function definitions from code",
            extract_functions,
        ),
        wrap(
            "check_complexity",
            "Check code complexity metrics",
            check_complexity,
        ),
        wrap("detect_issues", "Detect code quality issues", detect_issues),
        wrap(
            "suggest_improvements",
            "Suggest code improvements",
            suggest_improvements,
        ),
    ]
}

pub(super) fn wrap<F>(name: &str, description: &str, func: F) -> Arc<dyn NodeFunction>
where
    F: Fn(&Map<String, Value>) -> Result<PartialState, BoxError> + Send + Sync + 'static,
{
    Arc::new(FnFunction::new(name, description, func))
}

fn code(state: &Map<String, Value>) -> &str {
    state.get("code").and_then(Value::as_str).unwrap_or("")
}

fn list<'a>(state: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    state
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Reads `code`; writes `functions` and `function_count`
pub fn extract_functions(state: &Map<String, Value>) -> Result<PartialState, BoxError> {
    let lines: Vec<&str> = code(state).lines().collect();
    let mut functions = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let Some(caps) = DEF_RE.captures(line) else {
            continue;
        };
        let indent = caps["indent"].len();
        let args_count = caps["args"]
            .split(',')
            .filter(|a| !a.trim().is_empty())
            .count();

        let body: Vec<&str> = lines[i + 1..]
            .iter()
            .filter(|l| !l.trim().is_empty())
            .take_while(|l| indent_of(l) > indent)
            .map(|l| l.trim())
            .filter(|l| !l.starts_with('#'))
            .collect();

        let has_docstring = body
            .first()
            .is_some_and(|l| l.starts_with("\"\"\"") || l.starts_with("'''"));

        functions.push(json!({
            "name": &caps["name"],
            "line_number": i + 1,
            "args_count": args_count,
            "has_docstring": has_docstring,
            "body_lines": body.len(),
        }));
    }

    let count = functions.len();
    Ok(partial_from(json!({
        "functions": functions,
        "function_count": count,
    })))
}

/// Reads `code` and `functions`; writes `complexity`
pub fn check_complexity(state: &Map<String, Value>) -> Result<PartialState, BoxError> {
    let code = code(state);
    let total_functions = list(state, "functions").len();
    let total_lines = code.split('\n').count();

    let control_flow: usize = [" if ", " elif ", " for ", " while "]
        .iter()
        .map(|kw| code.matches(kw).count())
        .sum();
    let cyclomatic = 1 + control_flow;
    let average = cyclomatic as f64 / total_functions.max(1) as f64;

    let level = if average < 5.0 {
        "low"
    } else if average < 10.0 {
        "medium"
    } else {
        "high"
    };

    Ok(partial_from(json!({
        "complexity": {
            "cyclomatic_complexity": cyclomatic,
            "average_complexity": average,
            "complexity_level": level,
            "total_lines": total_lines,
            "control_flow_statements": control_flow,
        }
    })))
}

/// Reads `functions` and `complexity`; writes `issues` and `issue_count`
pub fn detect_issues(state: &Map<String, Value>) -> Result<PartialState, BoxError> {
    let functions = list(state, "functions");
    let complexity = state.get("complexity");
    let mut issues = Vec::new();

    let name_of = |f: &Value| f.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let number = |f: &Value, key: &str| f.get(key).and_then(Value::as_u64).unwrap_or(0);

    for func in functions {
        if !func.get("has_docstring").and_then(Value::as_bool).unwrap_or(false) {
            let name = name_of(func);
            issues.push(json!({
                "type": "missing_docstring",
                "severity": "low",
                "function": name,
                "message": format!("Function '{}' is missing a docstring", name),
            }));
        }
    }

    let level = complexity
        .and_then(|c| c.get("complexity_level"))
        .and_then(Value::as_str);
    if level == Some("high") {
        let cyclomatic = complexity
            .and_then(|c| c.get("cyclomatic_complexity"))
            .cloned()
            .unwrap_or(Value::Null);
        issues.push(json!({
            "type": "high_complexity",
            "severity": "medium",
            "message": format!("High cyclomatic complexity detected: {}", cyclomatic),
        }));
    }

    for func in functions {
        let body_lines = number(func, "body_lines");
        if body_lines > 50 {
            let name = name_of(func);
            issues.push(json!({
                "type": "long_function",
                "severity": "medium",
                "function": name,
                "message": format!("Function '{}' is too long ({} lines)", name, body_lines),
            }));
        }
    }

    for func in functions {
        let args = number(func, "args_count");
        if args > 5 {
            let name = name_of(func);
            issues.push(json!({
                "type": "too_many_arguments",
                "severity": "low",
                "function": name,
                "message": format!("Function '{}' has too many arguments ({})", name, args),
            }));
        }
    }

    for func in functions {
        if number(func, "body_lines") == 0 {
            let name = name_of(func);
            issues.push(json!({
                "type": "empty_function",
                "severity": "low",
                "function": name,
                "message": format!("Function '{}' appears to be empty", name),
            }));
        }
    }

    let count = issues.len();
    Ok(partial_from(json!({
        "issues": issues,
        "issue_count": count,
    })))
}

/// Reads `issues`, `complexity` and `functions`; writes `suggestions`,
/// `suggestion_count` and `quality_score` (0..=100)
pub fn suggest_improvements(state: &Map<String, Value>) -> Result<PartialState, BoxError> {
    let issues = list(state, "issues");
    let functions = list(state, "functions");
    let level = state
        .get("complexity")
        .and_then(|c| c.get("complexity_level"))
        .and_then(Value::as_str);

    let mut suggestions = Vec::new();
    let mut score: i64 = 100;

    for issue in issues {
        score -= match issue.get("severity").and_then(Value::as_str) {
            Some("high") => 10,
            Some("medium") => 5,
            _ => 2,
        };

        let function = issue.get("function").and_then(Value::as_str).unwrap_or("");
        let suggestion = match issue.get("type").and_then(Value::as_str) {
            Some("missing_docstring") => json!({
                "type": "add_docstring",
                "function": function,
                "suggestion": format!(
                    "Add a docstring to function '{}' describing its purpose, parameters, and return value",
                    function
                ),
            }),
            Some("high_complexity") => json!({
                "type": "refactor_complexity",
                "suggestion": "Break down complex functions into smaller, more manageable functions",
            }),
            Some("long_function") => json!({
                "type": "split_function",
                "function": function,
                "suggestion": format!("Split function '{}' into smaller functions", function),
            }),
            Some("too_many_arguments") => json!({
                "type": "use_data_class",
                "function": function,
                "suggestion": format!(
                    "Consider using a data class or dictionary for function '{}' arguments",
                    function
                ),
            }),
            Some("empty_function") => json!({
                "type": "implement_or_remove",
                "function": function,
                "suggestion": format!(
                    "Either implement function '{}' or remove it if not needed",
                    function
                ),
            }),
            _ => continue,
        };
        suggestions.push(suggestion);
    }

    let all_documented = functions
        .iter()
        .all(|f| f.get("has_docstring").and_then(Value::as_bool).unwrap_or(false));
    if all_documented {
        score += 5;
    }
    if level == Some("low") {
        score += 5;
    }

    let count = suggestions.len();
    Ok(partial_from(json!({
        "suggestions": suggestions,
        "quality_score": score.clamp(0, 100),
        "suggestion_count": count,
    })))
}
