// SPDX-License-Identifier: MIT

//! Runtime state storage for workflow runs

use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

use super::schema::{ReducerType, StateSchema};
use crate::sdk::PartialState;

/// Live state of a single run.
///
/// Keys keep their insertion order. Node output is folded in with
/// [`WorkflowState::merge`], which applies the schema's reducer per key and
/// leaves keys the node did not return untouched.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    fields: Map<String, Value>,
    schema: Arc<StateSchema>,
}

impl WorkflowState {
    /// Create a state holding the schema's defaults
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let fields = schema
            .defaults()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self { fields, schema }
    }

    /// Create a state from caller-supplied values layered over the schema defaults
    pub fn with_initial(schema: Arc<StateSchema>, initial: Map<String, Value>) -> Self {
        let mut state = Self::new(schema);
        for (key, value) in initial {
            state.fields.insert(key, value);
        }
        state
    }

    /// Create an empty state without a schema
    pub fn empty() -> Self {
        Self::default()
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get a nested field value using dot notation (e.g., "complexity.complexity_level")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        get_path(&self.fields, path)
    }

    /// Get a numeric field as f64
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.fields.get(key).and_then(Value::as_f64)
    }

    /// Set a field, bypassing reducers
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Update a field using the reducer declared for it
    pub fn update(&mut self, key: &str, value: Value) {
        let def = self.schema.fields.get(key);
        if let Some(def) = def {
            if !def.field_type.accepts(&value) {
                log::warn!(
                    "State key '{}' expects {:?}, got {}",
                    key,
                    def.field_type,
                    value
                );
            }
        }
        let reducer = def.map(|d| d.reducer).unwrap_or_default();

        match reducer {
            ReducerType::Overwrite => {
                self.fields.insert(key.to_string(), value);
            }
            ReducerType::Append => {
                let slot = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Array(vec![]));
                match (slot, value) {
                    (Value::Array(items), Value::Array(new_items)) => items.extend(new_items),
                    (Value::Array(items), other) => items.push(other),
                    (slot, other) => *slot = other,
                }
            }
            ReducerType::Max => self.keep_if(key, value, |new, cur| new > cur),
            ReducerType::Min => self.keep_if(key, value, |new, cur| new < cur),
            ReducerType::Merge => {
                let slot = self
                    .fields
                    .entry(key.to_string())
                    .or_insert(Value::Object(Map::new()));
                match (slot, value) {
                    (Value::Object(current), Value::Object(new_obj)) => {
                        for (k, v) in new_obj {
                            current.insert(k, v);
                        }
                    }
                    (slot, other) => *slot = other,
                }
            }
        }
    }

    fn keep_if(&mut self, key: &str, value: Value, better: impl Fn(f64, f64) -> bool) {
        let Some(new) = value.as_f64() else {
            log::warn!("Ignoring non-numeric value for numeric reducer on '{}'", key);
            return;
        };
        match self.get_f64(key) {
            Some(current) if !better(new, current) => {}
            _ => {
                self.fields.insert(key.to_string(), value);
            }
        }
    }

    /// Merge a node's partial output into the state
    pub fn merge(&mut self, partial: PartialState) {
        for (key, value) in partial {
            self.update(&key, value);
        }
    }

    /// Deep copy of the current values
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot(self.fields.clone())
    }

    /// Borrow the underlying ordered map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    /// Get all field names, in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for WorkflowState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

/// Immutable deep copy of a run's state at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StateSnapshot(Map<String, Value>);

impl StateSnapshot {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_path(&self, path: &str) -> Option<&Value> {
        get_path(&self.0, path)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.0.clone())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn get_path<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut parts = path.split('.');
    let mut current = fields.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            other => other.get(part)?,
        };
    }
    Some(current)
}
