//! Fluent builders for the seven primitive state kinds.
//!
//! Each builder collects fields, checks them in `build()` and hands back a
//! [`StateRef`]. Transition configuration is mutually exclusive by
//! construction: `next()` clears an earlier `end()` and vice versa.
//! A builder without either is accepted — the transition invariant is a
//! cross-field rule enforced at validation and serialization time, so a
//! state can be built first and wired afterwards.

use crate::core::choice_rule::ChoiceRule;
use crate::core::retry::{Catcher, Retrier};
use crate::core::state::{
    check_timestamp, ChoiceKind, FailKind, FaultHandling, IoPaths, ParallelKind, PassKind, State,
    StateKind, StateRef, SucceedKind, TaskKind, Transition, WaitKind, WaitTrigger,
};
use crate::core::Branch;
use crate::error::BuildError;
use serde_json::Value;

pub(crate) fn checked_name(name: &str) -> Result<(), BuildError> {
    if name.is_empty() {
        return Err(BuildError::EmptyStateName);
    }
    Ok(())
}

pub(crate) fn checked_io(name: &str, input: &str, output: &str) -> Result<IoPaths, BuildError> {
    if input.is_empty() || output.is_empty() {
        return Err(BuildError::EmptyDataPath(name.to_string()));
    }
    Ok(IoPaths {
        input: input.to_string(),
        output: output.to_string(),
    })
}

pub(crate) fn checked_fault(
    name: &str,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
) -> Result<FaultHandling, BuildError> {
    let mut fault = FaultHandling::default();
    if let Some(retriers) = retriers {
        if retriers.is_empty() {
            return Err(BuildError::EmptyRetryList(name.to_string()));
        }
        fault.retriers = retriers;
    }
    if let Some(catchers) = catchers {
        if catchers.is_empty() {
            return Err(BuildError::EmptyCatcherList(name.to_string()));
        }
        fault.catchers = catchers;
    }
    Ok(fault)
}

pub(crate) fn transition_of(next: Option<StateRef>, end: bool) -> Transition {
    Transition { next, end }
}

/// Builds a pass state, which forwards its input or injects a literal
/// result.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::PassBuilder;
///
/// let hello = PassBuilder::new("HelloWorld")
///     .result(serde_json::json!({"Hello": "World!"}))
///     .end()
///     .build()
///     .unwrap();
/// assert_eq!(hello.to_json().unwrap()["Result"]["Hello"], "World!");
/// ```
pub struct PassBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    result: Option<Value>,
    next: Option<StateRef>,
    end: bool,
}

impl PassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            result_path: "$".to_string(),
            result: None,
            next: None,
            end: false,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = path.into();
        self
    }

    /// Literal payload injected into the output. Must be a JSON object or
    /// array.
    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    pub fn next(mut self, next: &StateRef) -> Self {
        self.next = Some(next.clone());
        self.end = false;
        self
    }

    pub fn end(mut self) -> Self {
        self.end = true;
        self.next = None;
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.result_path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name));
        }
        if let Some(result) = &self.result {
            if !matches!(result, Value::Object(_) | Value::Array(_)) {
                return Err(BuildError::InvalidResultPayload(self.name));
            }
        }
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Pass(PassKind {
                io,
                transition: transition_of(self.next, self.end),
                result_path: self.result_path,
                result: self.result,
            }),
        }))
    }
}

/// Builds a task state, which invokes an external resource identified by an
/// opaque reference string.
pub struct TaskBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    resource: Option<String>,
    timeout_seconds: Option<u32>,
    heartbeat_seconds: Option<u32>,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
    next: Option<StateRef>,
    end: bool,
}

impl TaskBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            result_path: "$".to_string(),
            resource: None,
            timeout_seconds: None,
            heartbeat_seconds: None,
            retriers: None,
            catchers: None,
            next: None,
            end: false,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = path.into();
        self
    }

    /// The invocation reference of the function or activity to run.
    /// Required.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn timeout_seconds(mut self, seconds: u32) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn heartbeat_seconds(mut self, seconds: u32) -> Self {
        self.heartbeat_seconds = Some(seconds);
        self
    }

    /// Retry rules in evaluation order; the list must be non-empty.
    pub fn retry(mut self, retriers: Vec<Retrier>) -> Self {
        self.retriers = Some(retriers);
        self
    }

    /// Catch rules in evaluation order; the list must be non-empty.
    pub fn catch(mut self, catchers: Vec<Catcher>) -> Self {
        self.catchers = Some(catchers);
        self
    }

    pub fn next(mut self, next: &StateRef) -> Self {
        self.next = Some(next.clone());
        self.end = false;
        self
    }

    pub fn end(mut self) -> Self {
        self.end = true;
        self.next = None;
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.result_path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name));
        }
        let resource = match self.resource {
            Some(resource) if !resource.is_empty() => resource,
            _ => return Err(BuildError::MissingResource(self.name)),
        };
        if self.timeout_seconds == Some(0) {
            return Err(BuildError::InvalidTimeoutSeconds(self.name));
        }
        if self.heartbeat_seconds == Some(0) {
            return Err(BuildError::InvalidHeartbeatSeconds(self.name));
        }
        let fault = checked_fault(&self.name, self.retriers, self.catchers)?;
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Task(TaskKind {
                io,
                transition: transition_of(self.next, self.end),
                result_path: self.result_path,
                fault,
                resource,
                timeout_seconds: self.timeout_seconds,
                heartbeat_seconds: self.heartbeat_seconds,
            }),
        }))
    }
}

/// Builds a wait state. Exactly one wait specification is required by
/// validation; each setter replaces the previous one.
pub struct WaitBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    trigger: Option<WaitTrigger>,
    next: Option<StateRef>,
    end: bool,
}

impl WaitBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            trigger: None,
            next: None,
            end: false,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Wait a fixed number of seconds.
    pub fn seconds(mut self, seconds: u32) -> Self {
        self.trigger = Some(WaitTrigger::Seconds(seconds));
        self
    }

    /// Wait the number of seconds found at `path` in the input document.
    pub fn seconds_path(mut self, path: impl Into<String>) -> Self {
        self.trigger = Some(WaitTrigger::SecondsPath(path.into()));
        self
    }

    /// Wait until a fixed UTC timestamp of the form `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.trigger = Some(WaitTrigger::Timestamp(timestamp.into()));
        self
    }

    /// Wait until the timestamp found at `path` in the input document.
    pub fn timestamp_path(mut self, path: impl Into<String>) -> Self {
        self.trigger = Some(WaitTrigger::TimestampPath(path.into()));
        self
    }

    pub fn next(mut self, next: &StateRef) -> Self {
        self.next = Some(next.clone());
        self.end = false;
        self
    }

    pub fn end(mut self) -> Self {
        self.end = true;
        self.next = None;
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        match &self.trigger {
            Some(WaitTrigger::Seconds(seconds)) if *seconds < 1 => {
                return Err(BuildError::InvalidWaitSeconds(self.name));
            }
            Some(WaitTrigger::Timestamp(timestamp)) => {
                check_timestamp(timestamp, &self.name)?;
            }
            Some(WaitTrigger::SecondsPath(path)) | Some(WaitTrigger::TimestampPath(path))
                if path.is_empty() =>
            {
                return Err(BuildError::EmptyWaitPath(self.name));
            }
            _ => {}
        }
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Wait(WaitKind {
                io,
                transition: transition_of(self.next, self.end),
                trigger: self.trigger,
            }),
        }))
    }
}

/// Builds a choice state from an ordered, non-empty list of rules and an
/// optional default target.
pub struct ChoiceBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    rules: Vec<ChoiceRule>,
    default: Option<StateRef>,
}

impl ChoiceBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            rules: Vec::new(),
            default: None,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Append a rule; rules are evaluated in the order added.
    pub fn rule(mut self, rule: ChoiceRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(mut self, rules: Vec<ChoiceRule>) -> Self {
        self.rules.extend(rules);
        self
    }

    /// The state chosen when no rule matches.
    pub fn default(mut self, default: &StateRef) -> Self {
        self.default = Some(default.clone());
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.rules.is_empty() {
            return Err(BuildError::EmptyChoiceList(self.name));
        }
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Choice(ChoiceKind {
                io,
                rules: self.rules,
                default: self.default,
            }),
        }))
    }
}

/// Builds a succeed state, which terminates its branch successfully.
pub struct SucceedBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
}

impl SucceedBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Succeed(SucceedKind { io }),
        }))
    }
}

/// Builds a fail state, which terminates the machine with an error code.
pub struct FailBuilder {
    name: String,
    comment: String,
    error: String,
    cause: String,
}

impl FailBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            error: String::new(),
            cause: String::new(),
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// A code identifying the error.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = error.into();
        self
    }

    /// Human-readable detail on the cause of the error.
    pub fn cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = cause.into();
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Fail(FailKind {
                error: self.error,
                cause: self.cause,
            }),
        }))
    }
}

/// Builds a parallel state from an ordered, non-empty list of branch start
/// states. Each branch is an independent name namespace.
pub struct ParallelBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    branches: Vec<StateRef>,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
    next: Option<StateRef>,
    end: bool,
}

impl ParallelBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            result_path: "$".to_string(),
            branches: Vec::new(),
            retriers: None,
            catchers: None,
            next: None,
            end: false,
        }
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn input_path(mut self, path: impl Into<String>) -> Self {
        self.input_path = path.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<String>) -> Self {
        self.output_path = path.into();
        self
    }

    pub fn result_path(mut self, path: impl Into<String>) -> Self {
        self.result_path = path.into();
        self
    }

    /// Append a concurrent branch starting at `start`.
    pub fn branch(mut self, start: &StateRef) -> Self {
        self.branches.push(start.clone());
        self
    }

    pub fn branches(mut self, starts: Vec<StateRef>) -> Self {
        self.branches.extend(starts);
        self
    }

    /// Retry rules applying to the entire set of branches.
    pub fn retry(mut self, retriers: Vec<Retrier>) -> Self {
        self.retriers = Some(retriers);
        self
    }

    pub fn catch(mut self, catchers: Vec<Catcher>) -> Self {
        self.catchers = Some(catchers);
        self
    }

    pub fn next(mut self, next: &StateRef) -> Self {
        self.next = Some(next.clone());
        self.end = false;
        self
    }

    pub fn end(mut self) -> Self {
        self.end = true;
        self.next = None;
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.result_path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name));
        }
        if self.branches.is_empty() {
            return Err(BuildError::EmptyBranchList(self.name));
        }
        let fault = checked_fault(&self.name, self.retriers, self.catchers)?;
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Parallel(ParallelKind {
                io,
                transition: transition_of(self.next, self.end),
                result_path: self.result_path,
                fault,
                branches: self.branches.iter().map(Branch::new).collect(),
            }),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_reject_empty_names() {
        assert!(matches!(
            PassBuilder::new("").build(),
            Err(BuildError::EmptyStateName)
        ));
        assert!(matches!(
            FailBuilder::new("").build(),
            Err(BuildError::EmptyStateName)
        ));
    }

    #[test]
    fn task_requires_a_resource() {
        let err = TaskBuilder::new("Work").end().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingResource(name) if name == "Work"));

        let err = TaskBuilder::new("Work").resource("").end().build().unwrap_err();
        assert!(matches!(err, BuildError::MissingResource(_)));
    }

    #[test]
    fn task_rejects_zero_timeouts() {
        let base = || TaskBuilder::new("Work").resource("arn:x").end();
        assert!(matches!(
            base().timeout_seconds(0).build(),
            Err(BuildError::InvalidTimeoutSeconds(_))
        ));
        assert!(matches!(
            base().heartbeat_seconds(0).build(),
            Err(BuildError::InvalidHeartbeatSeconds(_))
        ));
    }

    #[test]
    fn task_rejects_empty_fault_lists() {
        let err = TaskBuilder::new("Work")
            .resource("arn:x")
            .retry(vec![])
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyRetryList(_)));

        let err = TaskBuilder::new("Work")
            .resource("arn:x")
            .catch(vec![])
            .end()
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::EmptyCatcherList(_)));
    }

    #[test]
    fn wait_builder_checks_its_trigger() {
        assert!(matches!(
            WaitBuilder::new("Hold").seconds(0).end().build(),
            Err(BuildError::InvalidWaitSeconds(_))
        ));
        assert!(matches!(
            WaitBuilder::new("Hold").timestamp("not-a-time").end().build(),
            Err(BuildError::InvalidTimestamp(_))
        ));
        assert!(WaitBuilder::new("Hold")
            .timestamp("2026-08-06T10:00:00Z")
            .end()
            .build()
            .is_ok());
        assert!(WaitBuilder::new("Hold")
            .seconds_path("$.delay")
            .end()
            .build()
            .is_ok());
    }

    #[test]
    fn choice_requires_at_least_one_rule() {
        let err = ChoiceBuilder::new("Route").build().unwrap_err();
        assert!(matches!(err, BuildError::EmptyChoiceList(name) if name == "Route"));
    }

    #[test]
    fn parallel_requires_at_least_one_branch() {
        let err = ParallelBuilder::new("Fan").end().build().unwrap_err();
        assert!(matches!(err, BuildError::EmptyBranchList(name) if name == "Fan"));
    }

    #[test]
    fn next_and_end_displace_each_other() {
        let target = SucceedBuilder::new("Done").build().unwrap();
        let ends = PassBuilder::new("Step").next(&target).end().build().unwrap();
        assert!(ends.is_end_state());

        let continues = PassBuilder::new("Step").end().next(&target).build().unwrap();
        assert!(!continues.is_end_state());
        assert_eq!(continues.next_state().unwrap().name(), "Done");
    }

    #[test]
    fn builders_reject_empty_paths() {
        assert!(matches!(
            PassBuilder::new("Step").input_path("").end().build(),
            Err(BuildError::EmptyDataPath(_))
        ));
        assert!(matches!(
            PassBuilder::new("Step").result_path("").end().build(),
            Err(BuildError::EmptyDataPath(_))
        ));
    }
}
