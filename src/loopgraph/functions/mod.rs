// SPDX-License-Identifier: MIT

//! Built-in node functions

pub mod code_review;
pub mod smells;

use std::sync::Arc;

use crate::loopgraph::workflow::registry::FunctionRegistry;
use crate::sdk::NodeFunction;

/// Every built-in function
pub fn create_functions() -> Vec<Arc<dyn NodeFunction>> {
    let mut functions = code_review::create_functions();
    functions.extend(smells::create_functions());
    functions
}

/// A registry pre-loaded with the built-in functions
pub async fn builtin_registry() -> FunctionRegistry {
    let registry = FunctionRegistry::new();
    for function in create_functions() {
        registry.register(function).await;
    }
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builtin_registry() {
        let registry = builtin_registry().await;
        let names: Vec<_> = registry.list().await.into_iter().map(|f| f.name).collect();
        assert_eq!(
            names,
            vec![
                "check_complexity",
                "detect_issues",
                "detect_smells",
                "extract_functions",
                "suggest_improvements"
            ]
        );
    }
}
