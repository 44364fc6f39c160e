//! The state model: one tagged-union state record behind a shared handle.
//!
//! Every workflow node is a [`State`] held behind a [`StateRef`], a cheaply
//! cloneable shared handle. Handles alias freely during graph construction —
//! a state may be the target of any number of transitions — while
//! [`StateRef::clone_subgraph`] produces deep, independent copies when a
//! subgraph must be replicated.
//!
//! Capability groups (input/output filtering, the next-or-end transition,
//! result placement, retry/catch) are plain field structs embedded into the
//! kinds that support them, so the availability matrix lives in the type
//! rather than in an inheritance chain.

use crate::core::choice_rule::ChoiceRule;
use crate::core::clone::{deep_clone, NameTemplate};
use crate::core::retry::{Catcher, Retrier};
use crate::error::{BuildError, ValidationError};
use crate::ext::Composite;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The state kinds of the states language, as serialized in `"Type"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StateType {
    Pass,
    Task,
    Wait,
    Choice,
    Succeed,
    Fail,
    Parallel,
}

impl StateType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Task => "Task",
            Self::Wait => "Wait",
            Self::Choice => "Choice",
            Self::Succeed => "Succeed",
            Self::Fail => "Fail",
            Self::Parallel => "Parallel",
        }
    }
}

impl fmt::Display for StateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input/output document filters. `"$"` selects the whole document.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IoPaths {
    pub input: String,
    pub output: String,
}

impl Default for IoPaths {
    fn default() -> Self {
        Self {
            input: "$".to_string(),
            output: "$".to_string(),
        }
    }
}

impl IoPaths {
    fn emit(&self, json: &mut Map<String, Value>) {
        json.insert("InputPath".to_string(), Value::String(self.input.clone()));
        json.insert("OutputPath".to_string(), Value::String(self.output.clone()));
    }
}

/// Exactly one of a next-state reference or the end flag. Setting either
/// side clears the other, so both-set is unrepresentable through the API;
/// neither-set is the freshly-built configuration and is rejected by
/// validation and serialization.
#[derive(Clone, Debug, Default)]
pub(crate) struct Transition {
    pub next: Option<StateRef>,
    pub end: bool,
}

impl Transition {
    pub fn set_next(&mut self, next: &StateRef) {
        self.next = Some(next.clone());
        self.end = false;
    }

    pub fn set_end(&mut self) {
        self.next = None;
        self.end = true;
    }

    fn validate(&self, state_name: &str) -> Result<(), ValidationError> {
        match (&self.next, self.end) {
            (Some(_), true) => Err(ValidationError::ConflictingTransition(
                state_name.to_string(),
            )),
            (None, false) => Err(ValidationError::MissingTransition(state_name.to_string())),
            _ => Ok(()),
        }
    }

    fn emit(&self, json: &mut Map<String, Value>, state_name: &str) -> Result<(), ValidationError> {
        self.validate(state_name)?;
        match &self.next {
            Some(next) => {
                json.insert("Next".to_string(), Value::String(next.name()));
            }
            None => {
                json.insert("End".to_string(), Value::Bool(true));
            }
        }
        Ok(())
    }
}

/// Ordered retry and catch declarations. Empty lists mean "not declared";
/// the setters reject an explicitly supplied empty list.
#[derive(Clone, Debug, Default)]
pub(crate) struct FaultHandling {
    pub retriers: Vec<Retrier>,
    pub catchers: Vec<Catcher>,
}

impl FaultHandling {
    fn validate(&self, state_name: &str) -> Result<(), ValidationError> {
        for retrier in &self.retriers {
            retrier.validate(state_name)?;
        }
        for catcher in &self.catchers {
            catcher.validate(state_name)?;
        }
        Ok(())
    }

    fn emit(&self, json: &mut Map<String, Value>) {
        if !self.retriers.is_empty() {
            let retriers: Vec<Value> = self.retriers.iter().map(Retrier::to_json).collect();
            json.insert("Retry".to_string(), Value::Array(retriers));
        }
        if !self.catchers.is_empty() {
            let catchers: Vec<Value> = self.catchers.iter().map(Catcher::to_json).collect();
            json.insert("Catch".to_string(), Value::Array(catchers));
        }
    }
}

/// The single wait specification of a wait state.
#[derive(Clone, Debug, PartialEq)]
pub enum WaitTrigger {
    /// Fixed number of seconds.
    Seconds(u32),
    /// Seconds resolved from the input document.
    SecondsPath(String),
    /// Fixed UTC timestamp, `YYYY-MM-DDTHH:MM:SSZ`.
    Timestamp(String),
    /// Timestamp resolved from the input document.
    TimestampPath(String),
}

impl WaitTrigger {
    fn emit(&self, json: &mut Map<String, Value>) {
        match self {
            Self::Seconds(seconds) => {
                json.insert("Seconds".to_string(), Value::from(*seconds));
            }
            Self::SecondsPath(path) => {
                json.insert("SecondsPath".to_string(), Value::String(path.clone()));
            }
            Self::Timestamp(timestamp) => {
                json.insert("Timestamp".to_string(), Value::String(timestamp.clone()));
            }
            Self::TimestampPath(path) => {
                json.insert("TimestampPath".to_string(), Value::String(path.clone()));
            }
        }
    }
}

/// Check a fixed wait timestamp against the accepted UTC profile.
pub(crate) fn check_timestamp(timestamp: &str, state_name: &str) -> Result<(), BuildError> {
    chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%SZ")
        .map(|_| ())
        .map_err(|_| BuildError::InvalidTimestamp(state_name.to_string()))
}

#[derive(Clone, Debug)]
pub(crate) struct PassKind {
    pub io: IoPaths,
    pub transition: Transition,
    pub result_path: String,
    pub result: Option<Value>,
}

#[derive(Clone, Debug)]
pub(crate) struct TaskKind {
    pub io: IoPaths,
    pub transition: Transition,
    pub result_path: String,
    pub fault: FaultHandling,
    pub resource: String,
    pub timeout_seconds: Option<u32>,
    pub heartbeat_seconds: Option<u32>,
}

#[derive(Clone, Debug)]
pub(crate) struct WaitKind {
    pub io: IoPaths,
    pub transition: Transition,
    pub trigger: Option<WaitTrigger>,
}

#[derive(Clone, Debug)]
pub(crate) struct ChoiceKind {
    pub io: IoPaths,
    pub rules: Vec<ChoiceRule>,
    pub default: Option<StateRef>,
}

#[derive(Clone, Debug)]
pub(crate) struct SucceedKind {
    pub io: IoPaths,
}

#[derive(Clone, Debug)]
pub(crate) struct FailKind {
    pub error: String,
    pub cause: String,
}

#[derive(Clone, Debug)]
pub(crate) struct ParallelKind {
    pub io: IoPaths,
    pub transition: Transition,
    pub result_path: String,
    pub fault: FaultHandling,
    pub branches: Vec<crate::core::branch::Branch>,
}

/// The tagged union over the seven primitive kinds plus the derived
/// composites, which expand into primitive subgraphs on demand.
#[derive(Clone, Debug)]
pub(crate) enum StateKind {
    Pass(PassKind),
    Task(TaskKind),
    Wait(WaitKind),
    Choice(ChoiceKind),
    Succeed(SucceedKind),
    Fail(FailKind),
    Parallel(ParallelKind),
    Composite(Composite),
}

/// One node of the workflow graph.
#[derive(Clone, Debug)]
pub(crate) struct State {
    pub name: String,
    pub comment: String,
    pub kind: StateKind,
}

impl State {
    fn state_type(&self) -> StateType {
        match &self.kind {
            StateKind::Pass(_) => StateType::Pass,
            StateKind::Task(_) => StateType::Task,
            StateKind::Wait(_) => StateType::Wait,
            StateKind::Choice(_) => StateType::Choice,
            StateKind::Succeed(_) => StateType::Succeed,
            StateKind::Fail(_) => StateType::Fail,
            StateKind::Parallel(_) => StateType::Parallel,
            StateKind::Composite(composite) => composite.state_type(),
        }
    }

    fn io_mut(&mut self) -> Option<&mut IoPaths> {
        match &mut self.kind {
            StateKind::Pass(k) => Some(&mut k.io),
            StateKind::Task(k) => Some(&mut k.io),
            StateKind::Wait(k) => Some(&mut k.io),
            StateKind::Choice(k) => Some(&mut k.io),
            StateKind::Succeed(k) => Some(&mut k.io),
            StateKind::Parallel(k) => Some(&mut k.io),
            StateKind::Composite(c) => Some(&mut c.core_mut().io),
            StateKind::Fail(_) => None,
        }
    }

    fn transition_mut(&mut self) -> Option<&mut Transition> {
        match &mut self.kind {
            StateKind::Pass(k) => Some(&mut k.transition),
            StateKind::Task(k) => Some(&mut k.transition),
            StateKind::Wait(k) => Some(&mut k.transition),
            StateKind::Parallel(k) => Some(&mut k.transition),
            StateKind::Composite(c) => Some(&mut c.core_mut().transition),
            StateKind::Choice(_) | StateKind::Succeed(_) | StateKind::Fail(_) => None,
        }
    }

    fn transition(&self) -> Option<&Transition> {
        match &self.kind {
            StateKind::Pass(k) => Some(&k.transition),
            StateKind::Task(k) => Some(&k.transition),
            StateKind::Wait(k) => Some(&k.transition),
            StateKind::Parallel(k) => Some(&k.transition),
            StateKind::Composite(c) => Some(&c.core().transition),
            StateKind::Choice(_) | StateKind::Succeed(_) | StateKind::Fail(_) => None,
        }
    }

    fn result_path_mut(&mut self) -> Option<&mut String> {
        match &mut self.kind {
            StateKind::Pass(k) => Some(&mut k.result_path),
            StateKind::Task(k) => Some(&mut k.result_path),
            StateKind::Parallel(k) => Some(&mut k.result_path),
            StateKind::Composite(c) => Some(&mut c.core_mut().result_path),
            _ => None,
        }
    }

    fn fault_mut(&mut self) -> Option<&mut FaultHandling> {
        match &mut self.kind {
            StateKind::Task(k) => Some(&mut k.fault),
            StateKind::Parallel(k) => Some(&mut k.fault),
            StateKind::Composite(c) => Some(&mut c.core_mut().fault),
            _ => None,
        }
    }

    fn unsupported(&self, capability: &'static str) -> BuildError {
        BuildError::UnsupportedCapability {
            name: self.name.clone(),
            state_type: self.state_type().as_str(),
            capability,
        }
    }
}

/// Shared handle to a state.
///
/// Cloning the handle aliases the same node; use
/// [`clone_subgraph`](StateRef::clone_subgraph) for an independent copy of
/// the reachable graph.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::{PassBuilder, WaitBuilder};
///
/// let done = WaitBuilder::new("Cooldown").seconds(2).end().build().unwrap();
/// let start = PassBuilder::new("Inject")
///     .result(serde_json::json!({"foo": "bar"}))
///     .next(&done)
///     .build()
///     .unwrap();
/// assert_eq!(start.next_state().unwrap().name(), "Cooldown");
/// ```
#[derive(Clone)]
pub struct StateRef(pub(crate) Rc<RefCell<State>>);

impl StateRef {
    pub(crate) fn from_state(state: State) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    /// Stable identity key for visited sets and clone memoization.
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Whether two handles alias the same state.
    pub fn ptr_eq(&self, other: &StateRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn comment(&self) -> String {
        self.0.borrow().comment.clone()
    }

    pub fn state_type(&self) -> StateType {
        self.0.borrow().state_type()
    }

    pub fn is_end_state(&self) -> bool {
        self.0.borrow().transition().map(|t| t.end).unwrap_or(false)
    }

    pub fn next_state(&self) -> Option<StateRef> {
        self.0.borrow().transition().and_then(|t| t.next.clone())
    }

    pub fn set_comment(&self, comment: impl Into<String>) {
        self.0.borrow_mut().comment = comment.into();
    }

    pub fn set_input_path(&self, path: impl Into<String>) -> Result<(), BuildError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match state.io_mut() {
            Some(io) => {
                io.input = path;
                Ok(())
            }
            None => Err(state.unsupported("input/output paths")),
        }
    }

    pub fn set_output_path(&self, path: impl Into<String>) -> Result<(), BuildError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match state.io_mut() {
            Some(io) => {
                io.output = path;
                Ok(())
            }
            None => Err(state.unsupported("input/output paths")),
        }
    }

    pub fn set_result_path(&self, path: impl Into<String>) -> Result<(), BuildError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match state.result_path_mut() {
            Some(result_path) => {
                *result_path = path;
                Ok(())
            }
            None => Err(state.unsupported("a result path")),
        }
    }

    /// Make this state transition into `next`, clearing any end flag.
    pub fn set_next(&self, next: &StateRef) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match state.transition_mut() {
            Some(transition) => {
                transition.set_next(next);
                Ok(())
            }
            None => Err(state.unsupported("a next/end transition")),
        }
    }

    /// Make this state terminate its branch, clearing any next reference.
    pub fn set_end(&self) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match state.transition_mut() {
            Some(transition) => {
                transition.set_end();
                Ok(())
            }
            None => Err(state.unsupported("a next/end transition")),
        }
    }

    /// Declare the retry rules, in evaluation order. The list must be
    /// non-empty; use [`clear_retriers`](StateRef::clear_retriers) to remove
    /// a declaration.
    pub fn set_retriers(&self, retriers: Vec<Retrier>) -> Result<(), BuildError> {
        if retriers.is_empty() {
            return Err(BuildError::EmptyRetryList(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match state.fault_mut() {
            Some(fault) => {
                fault.retriers = retriers;
                Ok(())
            }
            None => Err(state.unsupported("retry rules")),
        }
    }

    pub fn clear_retriers(&self) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match state.fault_mut() {
            Some(fault) => {
                fault.retriers.clear();
                Ok(())
            }
            None => Err(state.unsupported("retry rules")),
        }
    }

    /// Declare the catch rules, in evaluation order. The list must be
    /// non-empty; use [`clear_catchers`](StateRef::clear_catchers) to remove
    /// a declaration.
    pub fn set_catchers(&self, catchers: Vec<Catcher>) -> Result<(), BuildError> {
        if catchers.is_empty() {
            return Err(BuildError::EmptyCatcherList(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match state.fault_mut() {
            Some(fault) => {
                fault.catchers = catchers;
                Ok(())
            }
            None => Err(state.unsupported("catch rules")),
        }
    }

    pub fn clear_catchers(&self) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match state.fault_mut() {
            Some(fault) => {
                fault.catchers.clear();
                Ok(())
            }
            None => Err(state.unsupported("catch rules")),
        }
    }

    /// Set the literal result injected by a pass state. Must be a JSON
    /// object or array.
    pub fn set_result(&self, result: Value) -> Result<(), BuildError> {
        if !matches!(result, Value::Object(_) | Value::Array(_)) {
            return Err(BuildError::InvalidResultPayload(self.name()));
        }
        let mut state = self.0.borrow_mut();
        match &mut state.kind {
            StateKind::Pass(k) => {
                k.result = Some(result);
                Ok(())
            }
            _ => Err(state.unsupported("a literal result")),
        }
    }

    /// Wait for a fixed number of seconds, replacing any previous wait
    /// specification.
    pub fn set_wait_seconds(&self, seconds: u32) -> Result<(), BuildError> {
        if seconds < 1 {
            return Err(BuildError::InvalidWaitSeconds(self.name()));
        }
        self.set_wait_trigger(WaitTrigger::Seconds(seconds))
    }

    /// Wait for a number of seconds found in the input document, replacing
    /// any previous wait specification.
    pub fn set_wait_seconds_path(&self, path: impl Into<String>) -> Result<(), BuildError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BuildError::EmptyWaitPath(self.name()));
        }
        self.set_wait_trigger(WaitTrigger::SecondsPath(path))
    }

    /// Wait until a fixed UTC timestamp of the form `YYYY-MM-DDTHH:MM:SSZ`,
    /// replacing any previous wait specification.
    pub fn set_wait_timestamp(&self, timestamp: impl Into<String>) -> Result<(), BuildError> {
        let timestamp = timestamp.into();
        check_timestamp(&timestamp, &self.name())?;
        self.set_wait_trigger(WaitTrigger::Timestamp(timestamp))
    }

    /// Wait until a timestamp found in the input document, replacing any
    /// previous wait specification.
    pub fn set_wait_timestamp_path(&self, path: impl Into<String>) -> Result<(), BuildError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BuildError::EmptyWaitPath(self.name()));
        }
        self.set_wait_trigger(WaitTrigger::TimestampPath(path))
    }

    fn set_wait_trigger(&self, trigger: WaitTrigger) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match &mut state.kind {
            StateKind::Wait(k) => {
                k.trigger = Some(trigger);
                Ok(())
            }
            _ => Err(state.unsupported("a wait specification")),
        }
    }

    /// Append a rule to a choice state.
    pub fn add_rule(&self, rule: ChoiceRule) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match &mut state.kind {
            StateKind::Choice(k) => {
                k.rules.push(rule);
                Ok(())
            }
            _ => Err(state.unsupported("choice rules")),
        }
    }

    /// Set the default target of a choice state.
    pub fn set_default(&self, default: &StateRef) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match &mut state.kind {
            StateKind::Choice(k) => {
                k.default = Some(default.clone());
                Ok(())
            }
            _ => Err(state.unsupported("a default target")),
        }
    }

    /// Append a concurrent branch starting at `start`.
    pub fn add_branch(&self, start: &StateRef) -> Result<(), BuildError> {
        let mut state = self.0.borrow_mut();
        match &mut state.kind {
            StateKind::Parallel(k) => {
                k.branches.push(crate::core::branch::Branch::new(start));
                Ok(())
            }
            StateKind::Composite(c) => match c.branches_mut() {
                Some(branches) => {
                    branches.push(start.clone());
                    Ok(())
                }
                None => Err(state.unsupported("concurrent branches")),
            },
            _ => Err(state.unsupported("concurrent branches")),
        }
    }

    /// Deep-copy everything reachable from this state along outgoing edges,
    /// renaming every node through `template`. Aliasing and cycles in the
    /// source graph are preserved in the copy, and contained retriers,
    /// catchers, comparisons and result payloads are copied by value.
    pub fn clone_subgraph(&self, template: &NameTemplate) -> StateRef {
        let mut memo: HashMap<usize, StateRef> = HashMap::new();
        deep_clone(self, template, &mut memo)
    }

    /// Replace a composite state with its expansion; primitive states
    /// resolve to themselves.
    pub(crate) fn resolve(&self) -> Result<StateRef, ValidationError> {
        let expansion = {
            let state = self.0.borrow();
            match &state.kind {
                StateKind::Composite(composite) => {
                    Some(composite.expand(&state.name, &state.comment))
                }
                _ => None,
            }
        };
        match expansion {
            Some(expanded) => expanded,
            None => Ok(self.clone()),
        }
    }

    /// The states this node links to within its own namespace: the next
    /// edge, choice rule targets plus the default, and catcher targets.
    /// Parallel inner branches are separate namespaces and are not listed.
    pub(crate) fn child_states(&self) -> Vec<StateRef> {
        let state = self.0.borrow();
        let mut children = Vec::new();
        if let Some(transition) = state.transition() {
            if let Some(next) = &transition.next {
                children.push(next.clone());
            }
        }
        match &state.kind {
            StateKind::Choice(k) => {
                for rule in &k.rules {
                    children.push(rule.next_state().clone());
                }
                if let Some(default) = &k.default {
                    children.push(default.clone());
                }
            }
            StateKind::Task(k) => {
                for catcher in &k.fault.catchers {
                    children.push(catcher.next_state().clone());
                }
            }
            StateKind::Parallel(k) => {
                for catcher in &k.fault.catchers {
                    children.push(catcher.next_state().clone());
                }
            }
            _ => {}
        }
        children
    }

    /// Validate this state's own invariants. Graph-wide validation is
    /// performed by [`Branch::validate`](crate::core::Branch::validate),
    /// which covers every reachable state, including the inner branches of
    /// parallel states.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let resolved = self.resolve()?;
        let state = resolved.0.borrow();
        match &state.kind {
            StateKind::Pass(k) => k.transition.validate(&state.name),
            StateKind::Task(k) => {
                k.transition.validate(&state.name)?;
                if k.resource.is_empty() {
                    return Err(ValidationError::MissingResource(state.name.clone()));
                }
                k.fault.validate(&state.name)
            }
            StateKind::Wait(k) => {
                k.transition.validate(&state.name)?;
                if k.trigger.is_none() {
                    return Err(ValidationError::MissingWaitTrigger(state.name.clone()));
                }
                Ok(())
            }
            StateKind::Choice(k) => {
                if k.rules.is_empty() {
                    return Err(ValidationError::EmptyChoiceList(state.name.clone()));
                }
                for rule in &k.rules {
                    rule.validate(&state.name)?;
                }
                Ok(())
            }
            StateKind::Succeed(_) | StateKind::Fail(_) => Ok(()),
            StateKind::Parallel(k) => {
                k.transition.validate(&state.name)?;
                k.fault.validate(&state.name)?;
                if k.branches.is_empty() {
                    return Err(ValidationError::EmptyBranchList(state.name.clone()));
                }
                for branch in &k.branches {
                    branch.validate()?;
                }
                Ok(())
            }
            StateKind::Composite(_) => unreachable!("composites resolve to primitive states"),
        }
    }

    /// Render this state's definition object. Local invariants are
    /// re-checked here even if `validate()` was never called.
    pub fn to_json(&self) -> Result<Value, ValidationError> {
        let resolved = self.resolve()?;
        let state = resolved.0.borrow();
        let mut json = Map::new();
        json.insert(
            "Type".to_string(),
            Value::String(state.state_type().as_str().to_string()),
        );
        json.insert("Comment".to_string(), Value::String(state.comment.clone()));
        match &state.kind {
            StateKind::Pass(k) => {
                k.io.emit(&mut json);
                k.transition.emit(&mut json, &state.name)?;
                json.insert(
                    "ResultPath".to_string(),
                    Value::String(k.result_path.clone()),
                );
                if let Some(result) = &k.result {
                    json.insert("Result".to_string(), result.clone());
                }
            }
            StateKind::Task(k) => {
                k.io.emit(&mut json);
                k.transition.emit(&mut json, &state.name)?;
                json.insert(
                    "ResultPath".to_string(),
                    Value::String(k.result_path.clone()),
                );
                k.fault.validate(&state.name)?;
                k.fault.emit(&mut json);
                if k.resource.is_empty() {
                    return Err(ValidationError::MissingResource(state.name.clone()));
                }
                json.insert("Resource".to_string(), Value::String(k.resource.clone()));
                if let Some(timeout) = k.timeout_seconds {
                    json.insert("TimeoutSeconds".to_string(), Value::from(timeout));
                }
                if let Some(heartbeat) = k.heartbeat_seconds {
                    json.insert("HeartbeatSeconds".to_string(), Value::from(heartbeat));
                }
            }
            StateKind::Wait(k) => {
                k.io.emit(&mut json);
                k.transition.emit(&mut json, &state.name)?;
                match &k.trigger {
                    Some(trigger) => trigger.emit(&mut json),
                    None => {
                        return Err(ValidationError::MissingWaitTrigger(state.name.clone()));
                    }
                }
            }
            StateKind::Choice(k) => {
                k.io.emit(&mut json);
                if k.rules.is_empty() {
                    return Err(ValidationError::EmptyChoiceList(state.name.clone()));
                }
                let rules: Vec<Value> = k.rules.iter().map(ChoiceRule::to_json).collect();
                json.insert("Choices".to_string(), Value::Array(rules));
                if let Some(default) = &k.default {
                    json.insert("Default".to_string(), Value::String(default.name()));
                }
            }
            StateKind::Succeed(k) => {
                k.io.emit(&mut json);
            }
            StateKind::Fail(k) => {
                json.insert("Error".to_string(), Value::String(k.error.clone()));
                json.insert("Cause".to_string(), Value::String(k.cause.clone()));
            }
            StateKind::Parallel(k) => {
                k.io.emit(&mut json);
                k.transition.emit(&mut json, &state.name)?;
                json.insert(
                    "ResultPath".to_string(),
                    Value::String(k.result_path.clone()),
                );
                k.fault.validate(&state.name)?;
                k.fault.emit(&mut json);
                if k.branches.is_empty() {
                    return Err(ValidationError::EmptyBranchList(state.name.clone()));
                }
                let mut branches = Vec::new();
                for branch in &k.branches {
                    branches.push(branch.to_json()?);
                }
                json.insert("Branches".to_string(), Value::Array(branches));
            }
            StateKind::Composite(_) => unreachable!("composites resolve to primitive states"),
        }
        Ok(Value::Object(json))
    }
}

impl fmt::Debug for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(state) => write!(f, "StateRef({} '{}')", state.state_type(), state.name),
            Err(_) => f.write_str("StateRef(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{
        ChoiceBuilder, FailBuilder, ParallelBuilder, PassBuilder, SucceedBuilder, TaskBuilder,
        WaitBuilder,
    };
    use crate::core::{Comparator, Comparison};
    use serde_json::json;

    #[test]
    fn setting_next_clears_end_and_vice_versa() {
        let target = SucceedBuilder::new("Done").build().unwrap();
        let pass = PassBuilder::new("Step").end().build().unwrap();
        assert!(pass.is_end_state());

        pass.set_next(&target).unwrap();
        assert!(!pass.is_end_state());
        assert_eq!(pass.next_state().unwrap().name(), "Done");

        pass.set_end().unwrap();
        assert!(pass.is_end_state());
        assert!(pass.next_state().is_none());
    }

    #[test]
    fn transition_is_required_at_validation_time() {
        let pass = PassBuilder::new("Step").build().unwrap();
        let err = pass.validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingTransition(name) if name == "Step"));
    }

    #[test]
    fn fail_state_has_no_io_paths() {
        let fail = FailBuilder::new("Broken")
            .error("X")
            .cause("Y")
            .build()
            .unwrap();
        let err = fail.set_input_path("$.data").unwrap_err();
        assert!(matches!(err, BuildError::UnsupportedCapability { .. }));
    }

    #[test]
    fn succeed_state_has_no_transition() {
        let succeed = SucceedBuilder::new("Done").build().unwrap();
        let other = SucceedBuilder::new("Other").build().unwrap();
        assert!(succeed.set_next(&other).is_err());
        assert!(succeed.set_end().is_err());
    }

    #[test]
    fn pass_serializes_result_and_paths() {
        let pass = PassBuilder::new("Inject")
            .result(json!({"foo": "bar"}))
            .end()
            .build()
            .unwrap();
        let json = pass.to_json().unwrap();
        assert_eq!(json["Type"], "Pass");
        assert_eq!(json["InputPath"], "$");
        assert_eq!(json["OutputPath"], "$");
        assert_eq!(json["ResultPath"], "$");
        assert_eq!(json["Result"]["foo"], "bar");
        assert_eq!(json["End"], true);
        assert!(json.get("Next").is_none());
    }

    #[test]
    fn pass_result_must_be_object_or_array() {
        let pass = PassBuilder::new("Inject").end().build().unwrap();
        let err = pass.set_result(json!("scalar")).unwrap_err();
        assert!(matches!(err, BuildError::InvalidResultPayload(name) if name == "Inject"));
        assert!(pass.set_result(json!([1, 2])).is_ok());
    }

    #[test]
    fn task_serializes_resource_and_optional_timeouts() {
        let task = TaskBuilder::new("Work")
            .resource("arn:aws:lambda:eu-west-1:1234:function:work")
            .timeout_seconds(30)
            .end()
            .build()
            .unwrap();
        let json = task.to_json().unwrap();
        assert_eq!(json["Type"], "Task");
        assert_eq!(
            json["Resource"],
            "arn:aws:lambda:eu-west-1:1234:function:work"
        );
        assert_eq!(json["TimeoutSeconds"], 30);
        assert!(json.get("HeartbeatSeconds").is_none());
        assert!(json.get("Retry").is_none());
        assert!(json.get("Catch").is_none());
    }

    #[test]
    fn wait_requires_exactly_one_trigger() {
        let wait = WaitBuilder::new("Hold").end().build().unwrap();
        assert!(matches!(
            wait.validate(),
            Err(ValidationError::MissingWaitTrigger(_))
        ));

        wait.set_wait_seconds(5).unwrap();
        assert_eq!(wait.to_json().unwrap()["Seconds"], 5);

        // A different specification replaces the previous one.
        wait.set_wait_timestamp("2026-03-01T12:00:00Z").unwrap();
        let json = wait.to_json().unwrap();
        assert!(json.get("Seconds").is_none());
        assert_eq!(json["Timestamp"], "2026-03-01T12:00:00Z");
    }

    #[test]
    fn wait_rejects_malformed_timestamps() {
        let wait = WaitBuilder::new("Hold").end().build().unwrap();
        assert!(wait.set_wait_timestamp("tomorrow").is_err());
        assert!(wait.set_wait_timestamp("2026-03-01 12:00:00").is_err());
        assert!(wait.set_wait_seconds(0).is_err());
    }

    #[test]
    fn choice_serializes_rules_in_order_with_default() {
        let a = SucceedBuilder::new("A").build().unwrap();
        let b = SucceedBuilder::new("B").build().unwrap();
        let fallback = FailBuilder::new("NoMatch").build().unwrap();
        let choice = ChoiceBuilder::new("Route")
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::NumericEquals, 1).unwrap(),
                &a,
            ))
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::NumericEquals, 2).unwrap(),
                &b,
            ))
            .default(&fallback)
            .build()
            .unwrap();
        let json = choice.to_json().unwrap();
        let rules = json["Choices"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0]["Next"], "A");
        assert_eq!(rules[1]["Next"], "B");
        assert_eq!(json["Default"], "NoMatch");
        assert!(json.get("Next").is_none());
        assert!(json.get("End").is_none());
    }

    #[test]
    fn parallel_serializes_nested_branches() {
        let left = SucceedBuilder::new("Left").build().unwrap();
        let right = SucceedBuilder::new("Right").build().unwrap();
        let parallel = ParallelBuilder::new("Fan")
            .branch(&left)
            .branch(&right)
            .end()
            .build()
            .unwrap();
        let json = parallel.to_json().unwrap();
        let branches = json["Branches"].as_array().unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0]["StartAt"], "Left");
        assert_eq!(branches[1]["StartAt"], "Right");
        assert!(branches[0]["States"].get("Left").is_some());
    }

    #[test]
    fn retry_and_catch_keep_declaration_order() {
        let fallback = SucceedBuilder::new("Fallback").build().unwrap();
        let task = TaskBuilder::new("Fragile")
            .resource("arn:fragile")
            .retry(vec![
                Retrier::new(["First"]).unwrap(),
                Retrier::new(["Second"]).unwrap(),
            ])
            .catch(vec![Catcher::new(["States.ALL"], &fallback).unwrap()])
            .end()
            .build()
            .unwrap();
        let json = task.to_json().unwrap();
        let retriers = json["Retry"].as_array().unwrap();
        assert_eq!(retriers[0]["ErrorEquals"][0], "First");
        assert_eq!(retriers[1]["ErrorEquals"][0], "Second");
        assert_eq!(json["Catch"][0]["Next"], "Fallback");
    }

    #[test]
    fn empty_retry_list_is_rejected_but_absent_is_fine() {
        let task = TaskBuilder::new("Fragile")
            .resource("arn:fragile")
            .end()
            .build()
            .unwrap();
        assert!(matches!(
            task.set_retriers(vec![]),
            Err(BuildError::EmptyRetryList(_))
        ));
        assert!(task.validate().is_ok());
        task.set_retriers(vec![Retrier::new(["X"]).unwrap()])
            .unwrap();
        task.clear_retriers().unwrap();
        assert!(task.to_json().unwrap().get("Retry").is_none());
    }

    #[test]
    fn wait_setters_reject_other_kinds() {
        let pass = PassBuilder::new("Step").end().build().unwrap();
        assert!(pass.set_wait_seconds(2).is_err());
    }

    #[test]
    fn comment_is_always_emitted() {
        let succeed = SucceedBuilder::new("Done").build().unwrap();
        assert_eq!(succeed.to_json().unwrap()["Comment"], "");
        succeed.set_comment("all good");
        assert_eq!(succeed.to_json().unwrap()["Comment"], "all good");
    }

    #[test]
    fn aliased_handles_share_one_state() {
        let pass = PassBuilder::new("Step").end().build().unwrap();
        let alias = pass.clone();
        alias.set_comment("via alias");
        assert_eq!(pass.comment(), "via alias");
        assert!(pass.ptr_eq(&alias));
    }
}
