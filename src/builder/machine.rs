//! Builder for the top-level state machine.

use crate::core::machine::StateMachine;
use crate::core::state::StateRef;
use crate::error::BuildError;

/// Builder for a [`StateMachine`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{StateMachineBuilder, SucceedBuilder};
///
/// let done = SucceedBuilder::new("Done").build().unwrap();
/// let machine = StateMachineBuilder::new()
///     .comment("Trivial machine")
///     .timeout_seconds(300)
///     .start_state(&done)
///     .build()
///     .unwrap();
/// assert_eq!(machine.comment(), "Trivial machine");
/// ```
#[derive(Default)]
pub struct StateMachineBuilder {
    comment: String,
    version: Option<String>,
    timeout_seconds: Option<u32>,
    start: Option<StateRef>,
}

impl StateMachineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Only `"1.0"` is accepted; that is also the default.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn timeout_seconds(mut self, timeout_seconds: u32) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// The starting state of the machine's main branch. Required.
    pub fn start_state(mut self, start: &StateRef) -> Self {
        self.start = Some(start.clone());
        self
    }

    pub fn build(self) -> Result<StateMachine, BuildError> {
        let start = self.start.ok_or(BuildError::MissingStartState)?;
        let mut machine = StateMachine::new(&start);
        machine.set_comment(self.comment);
        if let Some(version) = self.version {
            machine.set_version(version)?;
        }
        if let Some(timeout_seconds) = self.timeout_seconds {
            machine.set_timeout_seconds(timeout_seconds);
        }
        Ok(machine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SucceedBuilder;

    #[test]
    fn builder_requires_a_start_state() {
        let result = StateMachineBuilder::new().build();
        assert!(matches!(result, Err(BuildError::MissingStartState)));
    }

    #[test]
    fn builder_rejects_unsupported_versions() {
        let done = SucceedBuilder::new("Done").build().unwrap();
        let result = StateMachineBuilder::new()
            .start_state(&done)
            .version("0.9")
            .build();
        assert!(matches!(result, Err(BuildError::UnsupportedVersion(_))));
    }

    #[test]
    fn fluent_api_builds_a_machine() {
        let done = SucceedBuilder::new("Done").build().unwrap();
        let machine = StateMachineBuilder::new()
            .comment("demo")
            .version("1.0")
            .timeout_seconds(30)
            .start_state(&done)
            .build()
            .unwrap();
        assert_eq!(machine.start_state().name(), "Done");
        assert_eq!(machine.timeout_seconds(), Some(30));
    }
}
