//! Declarative retry and catch specifications for fallible states.

use crate::core::state::StateRef;
use crate::error::{BuildError, ValidationError};
use serde_json::{json, Value};

fn check_error_names(error_names: &[String]) -> Result<(), BuildError> {
    if error_names.is_empty() {
        return Err(BuildError::EmptyErrorNameList);
    }
    if error_names.iter().any(|n| n.is_empty()) {
        return Err(BuildError::EmptyErrorName);
    }
    Ok(())
}

/// A retry rule for a task or parallel state.
///
/// Error names are carried opaquely; which names match which runtime errors
/// (including the catch-all token) is defined by the execution engine.
///
/// # Example
///
/// ```rust
/// use statecraft::core::Retrier;
///
/// let retrier = Retrier::new(["States.Timeout"]).unwrap()
///     .with_interval_seconds(5).unwrap()
///     .with_max_attempts(2)
///     .with_backoff_rate(1.5).unwrap();
/// assert_eq!(retrier.interval_seconds(), 5);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Retrier {
    error_names: Vec<String>,
    interval_seconds: u32,
    max_attempts: u32,
    backoff_rate: f64,
}

impl Retrier {
    /// Build a retrier with the default backoff policy: retry after 1
    /// second, at most 3 attempts, doubling the interval each time.
    pub fn new<I, S>(error_names: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let error_names: Vec<String> = error_names.into_iter().map(Into::into).collect();
        check_error_names(&error_names)?;
        Ok(Self {
            error_names,
            interval_seconds: 1,
            max_attempts: 3,
            backoff_rate: 2.0,
        })
    }

    /// Seconds before the first retry. Must be at least 1.
    pub fn with_interval_seconds(mut self, interval_seconds: u32) -> Result<Self, BuildError> {
        if interval_seconds < 1 {
            return Err(BuildError::InvalidRetryInterval(interval_seconds));
        }
        self.interval_seconds = interval_seconds;
        Ok(self)
    }

    /// Maximum retry attempts. Zero means no retry is attempted.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Growth rate applied to the interval after each retry. Must be at
    /// least 1.0.
    pub fn with_backoff_rate(mut self, backoff_rate: f64) -> Result<Self, BuildError> {
        if backoff_rate < 1.0 {
            return Err(BuildError::InvalidBackoffRate(backoff_rate));
        }
        self.backoff_rate = backoff_rate;
        Ok(self)
    }

    pub fn error_names(&self) -> &[String] {
        &self.error_names
    }

    pub fn interval_seconds(&self) -> u32 {
        self.interval_seconds
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff_rate(&self) -> f64 {
        self.backoff_rate
    }

    pub(crate) fn validate(&self, state_name: &str) -> Result<(), ValidationError> {
        if self.error_names.is_empty() {
            return Err(ValidationError::EmptyRetrierErrorList(state_name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn to_json(&self) -> Value {
        json!({
            "ErrorEquals": self.error_names,
            "IntervalSeconds": self.interval_seconds,
            "MaxAttempts": self.max_attempts,
            "BackoffRate": self.backoff_rate,
        })
    }
}

/// A catch rule routing matching errors to a fallback state.
///
/// The next state is held as a shared handle; only its name is written into
/// the document.
#[derive(Clone, Debug)]
pub struct Catcher {
    error_names: Vec<String>,
    next: StateRef,
}

impl Catcher {
    pub fn new<I, S>(error_names: I, next: &StateRef) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let error_names: Vec<String> = error_names.into_iter().map(Into::into).collect();
        check_error_names(&error_names)?;
        Ok(Self {
            error_names,
            next: next.clone(),
        })
    }

    pub fn error_names(&self) -> &[String] {
        &self.error_names
    }

    pub fn next_state(&self) -> &StateRef {
        &self.next
    }

    pub(crate) fn set_next_state(&mut self, next: &StateRef) {
        self.next = next.clone();
    }

    pub(crate) fn validate(&self, state_name: &str) -> Result<(), ValidationError> {
        if self.error_names.is_empty() {
            return Err(ValidationError::EmptyCatcherErrorList(state_name.to_string()));
        }
        Ok(())
    }

    pub(crate) fn to_json(&self) -> Value {
        json!({
            "ErrorEquals": self.error_names,
            "Next": self.next.name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SucceedBuilder;

    #[test]
    fn retrier_defaults_match_the_backoff_policy() {
        let retrier = Retrier::new(["States.TaskFailed"]).unwrap();
        assert_eq!(retrier.interval_seconds(), 1);
        assert_eq!(retrier.max_attempts(), 3);
        assert_eq!(retrier.backoff_rate(), 2.0);
    }

    #[test]
    fn retrier_requires_error_names() {
        let err = Retrier::new(Vec::<String>::new()).unwrap_err();
        assert!(matches!(err, BuildError::EmptyErrorNameList));

        let err = Retrier::new([""]).unwrap_err();
        assert!(matches!(err, BuildError::EmptyErrorName));
    }

    #[test]
    fn retrier_rejects_out_of_range_values() {
        let retrier = Retrier::new(["X"]).unwrap();
        assert!(retrier.clone().with_interval_seconds(0).is_err());
        assert!(retrier.clone().with_backoff_rate(0.5).is_err());
        // Zero attempts is a legal way of disabling retries.
        assert_eq!(retrier.with_max_attempts(0).max_attempts(), 0);
    }

    #[test]
    fn retrier_serializes_all_fields() {
        let retrier = Retrier::new(["A", "B"])
            .unwrap()
            .with_interval_seconds(10)
            .unwrap();
        let json = retrier.to_json();
        assert_eq!(json["ErrorEquals"], serde_json::json!(["A", "B"]));
        assert_eq!(json["IntervalSeconds"], 10);
        assert_eq!(json["MaxAttempts"], 3);
        assert_eq!(json["BackoffRate"], 2.0);
    }

    #[test]
    fn catcher_serializes_target_by_name() {
        let fallback = SucceedBuilder::new("Recovered").build().unwrap();
        let catcher = Catcher::new(["States.ALL"], &fallback).unwrap();
        let json = catcher.to_json();
        assert_eq!(json["ErrorEquals"], serde_json::json!(["States.ALL"]));
        assert_eq!(json["Next"], "Recovered");
    }

    #[test]
    fn catcher_requires_error_names() {
        let fallback = SucceedBuilder::new("Recovered").build().unwrap();
        assert!(Catcher::new(Vec::<String>::new(), &fallback).is_err());
    }
}
