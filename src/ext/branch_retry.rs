//! The `BranchRetryParallel` composite: per-branch retry scopes.
//!
//! A plain parallel state retries at the state level, so one branch's
//! transient failure re-executes every sibling. When a branch retry list is
//! given, each branch is wrapped in its own single-branch parallel carrying
//! the retry list, followed by a pass that unpacks the single-element
//! result; without one the expansion degenerates to a plain parallel.
//! An optional finally branch is supported through the shared finally
//! machinery.

use crate::builder::states::{checked_fault, checked_io, checked_name, transition_of};
use crate::builder::{ParallelBuilder, PassBuilder};
use crate::core::state::{State, StateKind, StateRef};
use crate::core::{Catcher, Retrier};
use crate::error::{BuildError, ValidationError};
use crate::ext::finally::wrap_with_finally;
use crate::ext::{Composite, CompositeCore};
use tracing::debug;

#[derive(Clone, Debug)]
pub(crate) struct BranchRetryKind {
    pub core: CompositeCore,
    pub branches: Vec<StateRef>,
    pub branch_retriers: Vec<Retrier>,
    pub finally_state: Option<StateRef>,
}

pub(crate) fn expand(
    kind: &BranchRetryKind,
    name: &str,
    comment: &str,
) -> Result<StateRef, ValidationError> {
    debug!(state = name, branches = kind.branches.len(), "expanding branch-retry parallel");
    let branches = if kind.branch_retriers.is_empty() {
        // No per-branch retries requested, so skip the extra wrapping.
        kind.branches.clone()
    } else {
        let mut wrapped = Vec::new();
        for branch in &kind.branches {
            let branch_name = branch.name();
            let unpacker = PassBuilder::new(format!("{name}-Finalizer-{branch_name}"))
                .comment(format!(
                    "Unpacking of results from executing '{branch_name}'"
                ))
                .output_path("$.[0]")
                .end()
                .build()?;
            let processor = ParallelBuilder::new(format!("{name}-Processor-{branch_name}"))
                .comment(format!(
                    "Wrapping of branch starting at '{branch_name}' to enable retry"
                ))
                .branch(branch)
                .retry(kind.branch_retriers.clone())
                .next(&unpacker)
                .build()?;
            wrapped.push(processor);
        }
        wrapped
    };
    let underlying = ParallelBuilder::new(name)
        .branches(branches)
        .build()?;
    wrap_with_finally(
        name,
        comment,
        &kind.core,
        underlying,
        kind.finally_state.as_ref(),
    )
}

/// Builds a parallel state whose branches retry independently.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::SucceedBuilder;
/// use statecraft::core::Retrier;
/// use statecraft::ext::BranchRetryParallelBuilder;
///
/// let left = SucceedBuilder::new("Left").build().unwrap();
/// let right = SucceedBuilder::new("Right").build().unwrap();
/// let parallel = BranchRetryParallelBuilder::new("Fan")
///     .branch(&left)
///     .branch(&right)
///     .branch_retriers(vec![Retrier::new(["States.TaskFailed"]).unwrap()])
///     .end()
///     .build()
///     .unwrap();
/// assert!(parallel.validate().is_ok());
/// ```
pub struct BranchRetryParallelBuilder {
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
    branch_retriers: Option<Vec<Retrier>>,
    finally_state: Option<StateRef>,
}

impl BranchRetryParallelBuilder {
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
            branch_retriers: None,
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

    /// Append a concurrent branch starting at `start`.
    pub fn branch(mut self, start: &StateRef) -> Self {
        self.branches.push(start.clone());
        self
    }

    pub fn branches(mut self, starts: Vec<StateRef>) -> Self {
        self.branches.extend(starts);
        self
    }

    /// Retry rules applied to each branch separately. Without them this
    /// state behaves exactly like a plain parallel.
    pub fn branch_retriers(mut self, retriers: Vec<Retrier>) -> Self {
        self.branch_retriers = Some(retriers);
        self
    }

    /// A subgraph that runs after the branches succeed, and before any
    /// *declared* catcher fires. An error no declared catcher traps skips
    /// the finally branch.
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
        let branch_retriers = match self.branch_retriers {
            Some(retriers) if retriers.is_empty() => {
                return Err(BuildError::EmptyRetryList(self.name));
            }
            Some(retriers) => retriers,
            None => Vec::new(),
        };
        let fault = checked_fault(&self.name, self.retriers, self.catchers)?;
        Ok(StateRef::from_state(State {
            name: self.name,
            comment: self.comment,
            kind: StateKind::Composite(Composite::BranchRetry(BranchRetryKind {
                core: CompositeCore {
                    io,
                    transition: transition_of(self.next, self.end),
                    result_path: self.result_path,
                    fault,
                },
                branches: self.branches,
                branch_retriers,
                finally_state: self.finally_state,
            })),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SucceedBuilder;

    fn branch(name: &str) -> StateRef {
        SucceedBuilder::new(name).build().unwrap()
    }

    #[test]
    fn without_retriers_it_expands_to_a_plain_parallel() {
        let parallel = BranchRetryParallelBuilder::new("Fan")
            .branch(&branch("Left"))
            .branch(&branch("Right"))
            .end()
            .build()
            .unwrap();
        let json = parallel.to_json().unwrap();
        assert_eq!(json["Type"], "Parallel");
        let branches = json["Branches"].as_array().unwrap();
        assert_eq!(branches[0]["StartAt"], "Left");
        assert_eq!(branches[1]["StartAt"], "Right");
        assert!(json.get("Retry").is_none());
    }

    #[test]
    fn branch_retriers_wrap_each_branch_in_its_own_retry_scope() {
        let parallel = BranchRetryParallelBuilder::new("Fan")
            .branch(&branch("Left"))
            .branch(&branch("Right"))
            .branch_retriers(vec![Retrier::new(["States.TaskFailed"]).unwrap()])
            .end()
            .build()
            .unwrap();
        let json = parallel.to_json().unwrap();
        let branches = json["Branches"].as_array().unwrap();
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0]["StartAt"], "Fan-Processor-Left");

        let states = branches[0]["States"].as_object().unwrap();
        let processor = &states["Fan-Processor-Left"];
        assert_eq!(processor["Retry"][0]["ErrorEquals"][0], "States.TaskFailed");
        assert_eq!(processor["Branches"][0]["StartAt"], "Left");
        assert_eq!(processor["Next"], "Fan-Finalizer-Left");
        assert_eq!(states["Fan-Finalizer-Left"]["OutputPath"], "$.[0]");
        // The outer parallel itself carries no retry list.
        assert!(json.get("Retry").is_none());
    }

    #[test]
    fn state_level_retry_stays_on_the_outer_parallel() {
        let parallel = BranchRetryParallelBuilder::new("Fan")
            .branch(&branch("Only"))
            .retry(vec![Retrier::new(["States.ALL"]).unwrap()])
            .end()
            .build()
            .unwrap();
        let json = parallel.to_json().unwrap();
        assert_eq!(json["Retry"][0]["ErrorEquals"][0], "States.ALL");
    }

    #[test]
    fn builder_rejects_empty_lists() {
        assert!(matches!(
            BranchRetryParallelBuilder::new("Fan").end().build(),
            Err(BuildError::EmptyBranchList(_))
        ));
        assert!(matches!(
            BranchRetryParallelBuilder::new("Fan")
                .branch(&branch("Only"))
                .branch_retriers(vec![])
                .end()
                .build(),
            Err(BuildError::EmptyRetryList(_))
        ));
    }
}
