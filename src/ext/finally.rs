//! Finally-wrapped task and parallel states.
//!
//! The finally branch runs after the underlying state succeeds, and also
//! runs — with its own errors trapped — before any *declared* catcher
//! fires. An error that no declared catcher traps skips the finally branch
//! entirely; callers that need the finally branch unconditionally should
//! declare a catch-all catcher.
//!
//! The expansion routes the underlying state into a post-parallel that
//! carries the original result through one branch while the finally
//! subgraph runs in the other, then an extractor pass restores the original
//! result. Each declared catcher is rewritten to route through its own deep
//! clone of that machinery before the caller's handler sees the error.

use crate::builder::states::{checked_fault, checked_io, checked_name, transition_of};
use crate::builder::{ParallelBuilder, PassBuilder, TaskBuilder};
use crate::core::state::{State, StateKind, StateRef};
use crate::core::{Catcher, NameTemplate, Retrier};
use crate::error::{BuildError, ValidationError};
use crate::ext::{apply_transition, Composite, CompositeCore};
use serde_json::json;
use tracing::debug;

#[derive(Clone, Debug)]
pub(crate) struct TaskFinallyKind {
    pub core: CompositeCore,
    pub resource: String,
    pub timeout_seconds: Option<u32>,
    pub heartbeat_seconds: Option<u32>,
    pub finally_state: Option<StateRef>,
}

#[derive(Clone, Debug)]
pub(crate) struct ParallelFinallyKind {
    pub core: CompositeCore,
    pub branches: Vec<StateRef>,
    pub finally_state: Option<StateRef>,
}

/// Apply a composite's identity and capability fields to its underlying
/// state, then graft on the finally machinery when a finally branch is
/// declared.
///
/// `underlying` arrives as a bare state carrying the composite's name and
/// no transition; it leaves carrying the composite's io paths, result path,
/// retriers, and either the composite's own catchers and transition (no
/// finally branch) or the rewritten catcher list and a transition into the
/// post-parallel.
pub(crate) fn wrap_with_finally(
    name: &str,
    comment: &str,
    core: &CompositeCore,
    underlying: StateRef,
    finally_state: Option<&StateRef>,
) -> Result<StateRef, ValidationError> {
    underlying.set_comment(comment);
    underlying.set_input_path(&core.io.input)?;
    underlying.set_output_path(&core.io.output)?;
    underlying.set_result_path(&core.result_path)?;
    if !core.fault.retriers.is_empty() {
        underlying.set_retriers(core.fault.retriers.clone())?;
    }

    let finally_start = match finally_state {
        None => {
            if !core.fault.catchers.is_empty() {
                underlying.set_catchers(core.fault.catchers.clone())?;
            }
            apply_transition(&underlying, &core.transition)?;
            return Ok(underlying);
        }
        Some(finally_start) => finally_start,
    };
    debug!(state = name, "expanding finally machinery");

    // The finally branch must never contribute results downstream.
    let terminator = PassBuilder::new(format!("{name}-FinallyTerminator"))
        .comment("Finally branch should never return any results")
        .result(json!({}))
        .end()
        .build()?;
    let trap = Catcher::new(["States.ALL"], &terminator)?;
    let finally_parallel = ParallelBuilder::new(format!("{name}-Finally"))
        .comment("Parallel to allow error catching on arbitrary finally processing")
        .branch(finally_start)
        .catch(vec![trap])
        .next(&terminator)
        .build()?;

    let pass_through = PassBuilder::new(format!("{name}-PassThrough"))
        .comment("Ensures that the original result is preserved")
        .end()
        .build()?;
    let extractor = PassBuilder::new(format!("{name}-Extractor"))
        .comment("Ensures the original result from the state is returned")
        .output_path("$.[0]")
        .build()?;
    apply_transition(&extractor, &core.transition)?;

    let post_parallel = ParallelBuilder::new(format!("{name}-PostParallel"))
        .branch(&pass_through)
        .branch(&finally_parallel)
        .end()
        .build()?;

    // Each declared catcher gets its own clone of the machinery, taken
    // while the post-parallel is still an end state.
    if !core.fault.catchers.is_empty() {
        let mut rewritten = Vec::new();
        for (offset, catcher) in core.fault.catchers.iter().enumerate() {
            let catcher_extractor = PassBuilder::new(format!("{name}-Extractor-Catcher-{offset}"))
                .comment(
                    "Ensures the original result from the state is passed to the supplied \
                     catcher, after the finally branch has completed",
                )
                .output_path("$.[0]")
                .next(catcher.next_state())
                .build()?;
            let template = NameTemplate::new(format!("{{}}-Catcher-{offset}"))?;
            let catcher_parallel = post_parallel.clone_subgraph(&template);
            catcher_parallel
                .set_comment("Parallel to manage finally, before supplied catcher is executed");
            catcher_parallel.set_next(&catcher_extractor)?;
            rewritten.push(Catcher::new(
                catcher.error_names().to_vec(),
                &catcher_parallel,
            )?);
        }
        underlying.set_catchers(rewritten)?;
    }

    post_parallel.set_comment("Parallel to manage finally, for successful completion of state");
    post_parallel.set_next(&extractor)?;
    underlying.set_next(&post_parallel)?;
    Ok(underlying)
}

pub(crate) fn expand_task(
    kind: &TaskFinallyKind,
    name: &str,
    comment: &str,
) -> Result<StateRef, ValidationError> {
    let mut builder = TaskBuilder::new(name).resource(&kind.resource);
    if let Some(timeout) = kind.timeout_seconds {
        builder = builder.timeout_seconds(timeout);
    }
    if let Some(heartbeat) = kind.heartbeat_seconds {
        builder = builder.heartbeat_seconds(heartbeat);
    }
    let underlying = builder.build()?;
    wrap_with_finally(name, comment, &kind.core, underlying, kind.finally_state.as_ref())
}

pub(crate) fn expand_parallel(
    kind: &ParallelFinallyKind,
    name: &str,
    comment: &str,
) -> Result<StateRef, ValidationError> {
    let underlying = ParallelBuilder::new(name)
        .branches(kind.branches.clone())
        .build()?;
    wrap_with_finally(name, comment, &kind.core, underlying, kind.finally_state.as_ref())
}

/// Builds a task with an optional finally branch.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TaskBuilder;
/// use statecraft::ext::TaskWithFinallyBuilder;
///
/// let cleanup = TaskBuilder::new("Cleanup").resource("arn:cleanup").end().build().unwrap();
/// let task = TaskWithFinallyBuilder::new("Process")
///     .resource("arn:process")
///     .finally_state(&cleanup)
///     .end()
///     .build()
///     .unwrap();
/// assert!(task.validate().is_ok());
/// ```
pub struct TaskWithFinallyBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
    next: Option<StateRef>,
    end: bool,
    resource: Option<String>,
    timeout_seconds: Option<u32>,
    heartbeat_seconds: Option<u32>,
    finally_state: Option<StateRef>,
}

impl TaskWithFinallyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            result_path: "$".to_string(),
            retriers: None,
            catchers: None,
            next: None,
            end: false,
            resource: None,
            timeout_seconds: None,
            heartbeat_seconds: None,
            finally_state: None,
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

    /// The subgraph to run after success, or before a *declared* catcher
    /// fires. Declare a catch-all catcher if the finally branch must run
    /// for every error.
    pub fn finally_state(mut self, finally_state: &StateRef) -> Self {
        self.finally_state = Some(finally_state.clone());
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
            kind: StateKind::Composite(Composite::TaskWithFinally(TaskFinallyKind {
                core: CompositeCore {
                    io,
                    transition: transition_of(self.next, self.end),
                    result_path: self.result_path,
                    fault,
                },
                resource,
                timeout_seconds: self.timeout_seconds,
                heartbeat_seconds: self.heartbeat_seconds,
                finally_state: self.finally_state,
            })),
        }))
    }
}

/// Builds a parallel state with an optional finally branch.
pub struct ParallelWithFinallyBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
    next: Option<StateRef>,
    end: bool,
    branches: Vec<StateRef>,
    finally_state: Option<StateRef>,
}

impl ParallelWithFinallyBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            input_path: "$".to_string(),
            output_path: "$".to_string(),
            result_path: "$".to_string(),
            retriers: None,
            catchers: None,
            next: None,
            end: false,
            branches: Vec::new(),
            finally_state: None,
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

    /// Append a concurrent branch starting at `start`.
    pub fn branch(mut self, start: &StateRef) -> Self {
        self.branches.push(start.clone());
        self
    }

    pub fn branches(mut self, starts: Vec<StateRef>) -> Self {
        self.branches.extend(starts);
        self
    }

    /// The subgraph to run after success, or before a *declared* catcher
    /// fires. Declare a catch-all catcher if the finally branch must run
    /// for every error.
    pub fn finally_state(mut self, finally_state: &StateRef) -> Self {
        self.finally_state = Some(finally_state.clone());
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
            kind: StateKind::Composite(Composite::ParallelWithFinally(ParallelFinallyKind {
                core: CompositeCore {
                    io,
                    transition: transition_of(self.next, self.end),
                    result_path: self.result_path,
                    fault,
                },
                branches: self.branches,
                finally_state: self.finally_state,
            })),
        }))
    }
}
