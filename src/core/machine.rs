//! The top-level state machine container.

use crate::core::branch::Branch;
use crate::core::state::StateRef;
use crate::error::{BuildError, ValidationError};
use serde_json::{Map, Value};
use tracing::debug;

/// A complete state machine: a start state plus machine-wide metadata,
/// rendered to a states-language document.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{PassBuilder, StateMachineBuilder, WaitBuilder};
///
/// let wait = WaitBuilder::new("Wait1").seconds(2).end().build().unwrap();
/// let pass = PassBuilder::new("Pass1")
///     .result(serde_json::json!({"foo": "bar"}))
///     .next(&wait)
///     .build()
///     .unwrap();
///
/// let machine = StateMachineBuilder::new()
///     .comment("This is a test")
///     .start_state(&pass)
///     .build()
///     .unwrap();
/// machine.validate().unwrap();
///
/// let document = machine.to_document().unwrap();
/// assert_eq!(document["StartAt"], "Pass1");
/// assert_eq!(document["States"]["Wait1"]["Seconds"], 2);
/// ```
#[derive(Clone, Debug)]
pub struct StateMachine {
    comment: String,
    version: String,
    timeout_seconds: Option<u32>,
    branch: Branch,
}

impl StateMachine {
    /// A machine starting at `start` with default metadata.
    pub fn new(start: &StateRef) -> Self {
        Self {
            comment: String::new(),
            version: "1.0".to_string(),
            timeout_seconds: None,
            branch: Branch::new(start),
        }
    }

    pub fn start_state(&self) -> &StateRef {
        self.branch.start_state()
    }

    pub fn set_start_state(&mut self, start: &StateRef) {
        self.branch = Branch::new(start);
    }

    pub fn comment(&self) -> &str {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<String>) {
        self.comment = comment.into();
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Only `"1.0"` is accepted.
    pub fn set_version(&mut self, version: impl Into<String>) -> Result<(), BuildError> {
        let version = version.into();
        if version != "1.0" {
            return Err(BuildError::UnsupportedVersion(version));
        }
        self.version = version;
        Ok(())
    }

    pub fn timeout_seconds(&self) -> Option<u32> {
        self.timeout_seconds
    }

    pub fn set_timeout_seconds(&mut self, timeout_seconds: u32) {
        self.timeout_seconds = Some(timeout_seconds);
    }

    /// Validate every state reachable from the start state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        debug!(start = %self.branch.start_state().name(), "validating state machine");
        self.branch.validate()
    }

    /// Render the full document. Reachability and per-state invariants are
    /// enforced here independently of `validate()`.
    pub fn to_document(&self) -> Result<Value, ValidationError> {
        debug!(start = %self.branch.start_state().name(), "rendering state machine document");
        let branch_json = self.branch.to_json()?;
        let mut json: Map<String, Value> = match branch_json {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        json.insert("Comment".to_string(), Value::String(self.comment.clone()));
        json.insert("Version".to_string(), Value::String(self.version.clone()));
        if let Some(timeout) = self.timeout_seconds {
            json.insert("TimeoutSeconds".to_string(), Value::from(timeout));
        }
        Ok(Value::Object(json))
    }

    /// Validate, then render the document as pretty-printed JSON with
    /// sorted keys.
    pub fn to_json_string(&self) -> Result<String, ValidationError> {
        self.validate()?;
        let document = self.to_document()?;
        Ok(serde_json::to_string_pretty(&document)
            .expect("a JSON value always renders to a string"))
    }
}
