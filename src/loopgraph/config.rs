// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! Values come from an optional YAML file and are then overridden by
//! environment variables (a `.env` file is loaded by the binary):
//! - `LOOPGRAPH_MAX_STEPS` - step ceiling per run (default 1000)
//! - `LOOPGRAPH_HOST` / `LOOPGRAPH_PORT` - HTTP bind address

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::sdk::{LoopGraphError, Result};

pub const DEFAULT_MAX_STEPS: usize = 1000;
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Engine limits. Applies to every run; not settable per run.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Maximum node executions before a run ends as `max_steps_exceeded`
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_max_steps() -> usize {
    DEFAULT_MAX_STEPS
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
        }
    }
}

impl AppConfig {
    /// Load from a YAML file (if given), then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Self::parse_yaml(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn parse_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply overrides from a variable lookup (normally the process env)
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("LOOPGRAPH_MAX_STEPS") {
            self.engine.max_steps = parse_var("LOOPGRAPH_MAX_STEPS", &v)?;
        }
        if let Some(v) = lookup("LOOPGRAPH_HOST") {
            self.server.host = v;
        }
        if let Some(v) = lookup("LOOPGRAPH_PORT") {
            self.server.port = parse_var("LOOPGRAPH_PORT", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.max_steps == 0 {
            return Err(LoopGraphError::config("max_steps must be at least 1"));
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| LoopGraphError::config(format!("{} has invalid value '{}'", key, value)))
}
