// SPDX-License-Identifier: MIT

use crate::sdk::NodeFunction;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Looks up the callable bound to a node's function identifier
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, function_id: &str) -> Option<Arc<dyn NodeFunction>>;
}

/// Name and description of a registered function
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub description: String,
}

#[derive(Clone)]
pub struct FunctionRegistry {
    functions: Arc<RwLock<HashMap<String, Arc<dyn NodeFunction>>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, function: Arc<dyn NodeFunction>) {
        let mut functions = self.functions.write().await;
        functions.insert(function.name().to_string(), function);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn NodeFunction>> {
        let functions = self.functions.read().await;
        functions.get(name).cloned()
    }

    pub async fn unregister(&self, name: &str) -> bool {
        let mut functions = self.functions.write().await;
        functions.remove(name).is_some()
    }

    pub async fn exists(&self, name: &str) -> bool {
        let functions = self.functions.read().await;
        functions.contains_key(name)
    }

    /// All registered functions, sorted by name
    pub async fn list(&self) -> Vec<FunctionInfo> {
        let functions = self.functions.read().await;
        let mut infos: Vec<FunctionInfo> = functions
            .values()
            .map(|f| FunctionInfo {
                name: f.name().to_string(),
                description: f.description().to_string(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for FunctionRegistry {
    async fn resolve(&self, function_id: &str) -> Option<Arc<dyn NodeFunction>> {
        self.get(function_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::{BoxError, PartialState};
    use serde_json::{json, Map, Value};

    /// A mock function for testing
    struct MockFunction {
        name: String,
        description: String,
    }

    impl MockFunction {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                description: format!("Mock function: {}", name),
            }
        }
    }

    #[async_trait]
    impl NodeFunction for MockFunction {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        async fn call(&self, _state: &Map<String, Value>) -> Result<PartialState, BoxError> {
            let mut out = Map::new();
            out.insert("result".to_string(), json!("mock"));
            Ok(out)
        }
    }

    #[tokio::test]
    async fn test_register_and_get_function() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(MockFunction::new("test_fn"))).await;

        let retrieved = registry.get("test_fn").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "test_fn");
    }

    #[tokio::test]
    async fn test_resolve_missing_function() {
        let registry = FunctionRegistry::new();
        assert!(registry.resolve("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_unregister_and_exists() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(MockFunction::new("f"))).await;
        assert!(registry.exists("f").await);

        assert!(registry.unregister("f").await);
        assert!(!registry.exists("f").await);
        assert!(!registry.unregister("f").await);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let registry = FunctionRegistry::new();
        registry.register(Arc::new(MockFunction::new("zeta"))).await;
        registry.register(Arc::new(MockFunction::new("alpha"))).await;

        let names: Vec<_> = registry.list().await.into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = FunctionRegistry::new();
        let cloned = registry.clone();

        // Registering on clone should be visible to original
        cloned.register(Arc::new(MockFunction::new("f2"))).await;
        assert!(registry.get("f2").await.is_some());

        let resolved = registry.resolve("f2").await.unwrap();
        let out = resolved.call(&Map::new()).await.unwrap();
        assert_eq!(out.get("result"), Some(&json!("mock")));
    }
}
