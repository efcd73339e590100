//! File-backed `data` capability.
//!
//! Stands in for the managed query backend: the file holds either a full
//! data-capability object (`{status, data, ...}`) or a bare table, which is
//! wrapped as a successful result.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

use super::contract;
use super::{CapabilityName, CapabilityResult, Specialist};

/// Serves the same data payload for every request.
#[derive(Debug, Clone)]
pub struct FixtureData {
    path: PathBuf,
}

impl FixtureData {
    /// Serve the JSON file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Fixture file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and interpret the fixture.
    pub fn load(&self) -> CapabilityResult {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) => {
                return CapabilityResult::Error {
                    message: "data source unavailable".to_owned(),
                    details: Some(format!("{}: {e}", self.path.display())),
                }
            }
        };
        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                return CapabilityResult::Error {
                    message: contract::MALFORMED_OUTPUT.to_owned(),
                    details: Some(e.to_string()),
                }
            }
        };
        match wrap(value) {
            Value::Object(object) => contract::interpret(CapabilityName::Data, object),
            _ => CapabilityResult::error(contract::MALFORMED_OUTPUT),
        }
    }
}

/// Wrap a bare table into the data-capability result shape.
pub fn wrap(value: Value) -> Value {
    let is_result = value.as_object().is_some_and(|o| o.contains_key("status"));
    if is_result {
        return value;
    }
    json!({
        "status": "SUCCESS",
        "sql": null,
        "assumptions": [],
        "data": value,
        "notes": [],
        "error": null,
    })
}

#[async_trait]
impl Specialist for FixtureData {
    async fn call(&self, _request: &str) -> CapabilityResult {
        info!(path = %self.path.display(), "serving data fixture");
        self.load()
    }
}
