//! Derived composite states.
//!
//! A composite is declared with a small specification and expands into a
//! subgraph of primitive states when the graph is validated or serialized.
//! Expansion is a pure function of the composite's current fields —
//! recomputed on every pass, never cached — and synthesized node names are
//! derived from the composite's own name, so repeated expansion yields an
//! equivalent graph rather than a growing one.

mod branch_retry;
mod finally;
mod for_state;
mod limited_parallel;
mod resources;

pub use branch_retry::BranchRetryParallelBuilder;
pub use finally::{ParallelWithFinallyBuilder, TaskWithFinallyBuilder};
pub use for_state::ForBuilder;
pub use limited_parallel::LimitedParallelBuilder;
pub use resources::{ExtResources, ExtResourcesBuilder};

use crate::core::state::{FaultHandling, IoPaths, StateRef, StateType, Transition};
use crate::error::{BuildError, ValidationError};

pub(crate) use branch_retry::BranchRetryKind;
pub(crate) use finally::{ParallelFinallyKind, TaskFinallyKind};
pub(crate) use for_state::ForKind;
pub(crate) use limited_parallel::LimitedParallelKind;

/// Capability fields shared by every composite: all composites filter
/// input/output, transition onwards, place results and may declare
/// retry/catch.
#[derive(Clone, Debug)]
pub(crate) struct CompositeCore {
    pub io: IoPaths,
    pub transition: Transition,
    pub result_path: String,
    pub fault: FaultHandling,
}

impl Default for CompositeCore {
    fn default() -> Self {
        Self {
            io: IoPaths::default(),
            transition: Transition::default(),
            result_path: "$".to_string(),
            fault: FaultHandling::default(),
        }
    }
}

/// The derived composite kinds.
#[derive(Clone, Debug)]
pub(crate) enum Composite {
    For(ForKind),
    LimitedParallel(LimitedParallelKind),
    BranchRetry(BranchRetryKind),
    TaskWithFinally(TaskFinallyKind),
    ParallelWithFinally(ParallelFinallyKind),
}

impl Composite {
    /// The `"Type"` tag the expansion root will carry.
    pub(crate) fn state_type(&self) -> StateType {
        match self {
            Self::TaskWithFinally(_) => StateType::Task,
            _ => StateType::Parallel,
        }
    }

    pub(crate) fn core(&self) -> &CompositeCore {
        match self {
            Self::For(k) => &k.core,
            Self::LimitedParallel(k) => &k.core,
            Self::BranchRetry(k) => &k.core,
            Self::TaskWithFinally(k) => &k.core,
            Self::ParallelWithFinally(k) => &k.core,
        }
    }

    pub(crate) fn core_mut(&mut self) -> &mut CompositeCore {
        match self {
            Self::For(k) => &mut k.core,
            Self::LimitedParallel(k) => &mut k.core,
            Self::BranchRetry(k) => &mut k.core,
            Self::TaskWithFinally(k) => &mut k.core,
            Self::ParallelWithFinally(k) => &mut k.core,
        }
    }

    /// Branch lists that `StateRef::add_branch` may append to.
    pub(crate) fn branches_mut(&mut self) -> Option<&mut Vec<StateRef>> {
        match self {
            Self::BranchRetry(k) => Some(&mut k.branches),
            Self::ParallelWithFinally(k) => Some(&mut k.branches),
            _ => None,
        }
    }

    /// Every referenced subgraph root beyond the shared transition/catcher
    /// edges: loop bodies, branch starts and finally branches. Used by
    /// subgraph cloning.
    pub(crate) fn child_refs_mut(&mut self) -> Vec<&mut StateRef> {
        match self {
            Self::For(k) => vec![&mut k.body],
            Self::LimitedParallel(k) => vec![&mut k.body],
            Self::BranchRetry(k) => k
                .branches
                .iter_mut()
                .chain(k.finally_state.iter_mut())
                .collect(),
            Self::TaskWithFinally(k) => k.finally_state.iter_mut().collect(),
            Self::ParallelWithFinally(k) => k
                .branches
                .iter_mut()
                .chain(k.finally_state.iter_mut())
                .collect(),
        }
    }

    /// Expand into the primitive subgraph implementing this composite. The
    /// returned root carries `name`, so it replaces the composite in its
    /// namespace; the composite's own transition is wired into the
    /// expansion's terminal states.
    pub(crate) fn expand(&self, name: &str, comment: &str) -> Result<StateRef, ValidationError> {
        match self {
            Self::For(k) => for_state::expand(k, name, comment),
            Self::LimitedParallel(k) => limited_parallel::expand(k, name, comment),
            Self::BranchRetry(k) => branch_retry::expand(k, name, comment),
            Self::TaskWithFinally(k) => finally::expand_task(k, name, comment),
            Self::ParallelWithFinally(k) => finally::expand_parallel(k, name, comment),
        }
    }
}

/// Copy a composite's configured transition onto an expansion state.
/// A still-unset transition is left unset for validation to report against
/// the composite's name.
pub(crate) fn apply_transition(
    state: &StateRef,
    transition: &Transition,
) -> Result<(), BuildError> {
    if let Some(next) = &transition.next {
        state.set_next(next)?;
    } else if transition.end {
        state.set_end()?;
    }
    Ok(())
}
