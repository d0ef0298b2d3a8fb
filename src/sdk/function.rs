use async_trait::async_trait;
use serde_json::{Map, Value};
use std::error::Error;

/// Error type returned by node functions
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Partial state returned by a node; merged into the live run state
pub type PartialState = Map<String, Value>;

/// A unit of behavior a graph node is bound to.
///
/// # Contract
/// - `call()` receives a read-only view of the current run state
/// - The returned map only needs to contain the keys the function changed;
///   untouched keys survive the merge
/// - Returning `Err` fails the run and is recorded against the node
#[async_trait]
pub trait NodeFunction: Send + Sync {
    /// Returns the function name (must be unique within a registry)
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the function does
    fn description(&self) -> &str;

    /// Execute the function against the current state
    async fn call(&self, state: &Map<String, Value>) -> Result<PartialState, BoxError>;
}

/// Turn a JSON object into a partial state. Non-object values yield an empty map.
pub fn partial_from(value: Value) -> PartialState {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Adapter turning a plain closure into a [`NodeFunction`]
pub struct FnFunction<F> {
    name: String,
    description: String,
    func: F,
}

impl<F> FnFunction<F>
where
    F: Fn(&Map<String, Value>) -> Result<PartialState, BoxError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, description: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            func,
        }
    }
}

#[async_trait]
impl<F> NodeFunction for FnFunction<F>
where
    F: Fn(&Map<String, Value>) -> Result<PartialState, BoxError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, state: &Map<String, Value>) -> Result<PartialState, BoxError> {
        (self.func)(state)
    }
}
