//! Deep subgraph cloning with template-driven renaming.
//!
//! Composite expansion replicates the same body subgraph once per iteration
//! or per catcher, so every replica needs fresh names and fully independent
//! sub-objects. A [`NameTemplate`] supplies the renaming; the clone itself
//! is memoized by node identity so that aliased states stay aliased in the
//! copy and cyclic graphs terminate.

use crate::core::state::{State, StateKind, StateRef, Transition};
use crate::error::BuildError;
use std::collections::HashMap;

/// A naming format holding a single `{}` placeholder for the original name.
///
/// # Example
///
/// ```rust
/// use statecraft::core::NameTemplate;
///
/// let template = NameTemplate::new("Loop-{}-3").unwrap();
/// assert_eq!(template.apply("Worker"), "Loop-Worker-3");
/// assert!(NameTemplate::new("NoPlaceholder").is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameTemplate(String);

impl NameTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, BuildError> {
        let template = template.into();
        if !template.contains("{}") {
            return Err(BuildError::InvalidNameTemplate);
        }
        Ok(Self(template))
    }

    /// The identity template, leaving names unchanged.
    pub fn identity() -> Self {
        Self("{}".to_string())
    }

    pub fn apply(&self, name: &str) -> String {
        self.0.replacen("{}", name, 1)
    }
}

fn rewrite_transition(
    transition: &mut Transition,
    template: &NameTemplate,
    memo: &mut HashMap<usize, StateRef>,
) {
    if let Some(next) = &mut transition.next {
        let original = next.clone();
        *next = deep_clone(&original, template, memo);
    }
}

fn rewrite_catchers(
    catchers: &mut [crate::core::retry::Catcher],
    template: &NameTemplate,
    memo: &mut HashMap<usize, StateRef>,
) {
    for catcher in catchers {
        let original = catcher.next_state().clone();
        let cloned = deep_clone(&original, template, memo);
        catcher.set_next_state(&cloned);
    }
}

/// Clone `state` and everything reachable from it, renaming every node
/// through `template`. The memo carries identity mappings for the duration
/// of one clone so that shared targets are cloned once and self-references
/// terminate.
pub(crate) fn deep_clone(
    state: &StateRef,
    template: &NameTemplate,
    memo: &mut HashMap<usize, StateRef>,
) -> StateRef {
    if let Some(existing) = memo.get(&state.key()) {
        return existing.clone();
    }

    // The shallow copy still points at the original children; the memo
    // entry must exist before they are rewritten or a cycle would recurse
    // forever.
    let mut snapshot: State = state.0.borrow().clone();
    snapshot.name = template.apply(&snapshot.name);
    let cloned = StateRef::from_state(snapshot);
    memo.insert(state.key(), cloned.clone());

    let mut inner = cloned.0.borrow_mut();
    match &mut inner.kind {
        StateKind::Pass(k) => rewrite_transition(&mut k.transition, template, memo),
        StateKind::Wait(k) => rewrite_transition(&mut k.transition, template, memo),
        StateKind::Task(k) => {
            rewrite_transition(&mut k.transition, template, memo);
            rewrite_catchers(&mut k.fault.catchers, template, memo);
        }
        StateKind::Choice(k) => {
            for rule in &mut k.rules {
                let original = rule.next_state().clone();
                let target = deep_clone(&original, template, memo);
                rule.set_next_state(&target);
            }
            if let Some(default) = &mut k.default {
                let original = default.clone();
                *default = deep_clone(&original, template, memo);
            }
        }
        StateKind::Parallel(k) => {
            rewrite_transition(&mut k.transition, template, memo);
            rewrite_catchers(&mut k.fault.catchers, template, memo);
            for branch in &mut k.branches {
                let original = branch.start_state().clone();
                *branch.start_mut() = deep_clone(&original, template, memo);
            }
        }
        StateKind::Succeed(_) | StateKind::Fail(_) => {}
        StateKind::Composite(composite) => {
            rewrite_transition(&mut composite.core_mut().transition, template, memo);
            rewrite_catchers(&mut composite.core_mut().fault.catchers, template, memo);
            for child in composite.child_refs_mut() {
                let original = child.clone();
                *child = deep_clone(&original, template, memo);
            }
        }
    }
    drop(inner);
    cloned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChoiceBuilder, PassBuilder, SucceedBuilder, TaskBuilder};
    use crate::core::retry::{Catcher, Retrier};
    use crate::core::{ChoiceRule, Comparator, Comparison};

    #[test]
    fn template_requires_placeholder() {
        assert!(matches!(
            NameTemplate::new("Copy"),
            Err(BuildError::InvalidNameTemplate)
        ));
        assert_eq!(NameTemplate::identity().apply("Step"), "Step");
    }

    #[test]
    fn chain_is_cloned_with_renamed_nodes() {
        let last = SucceedBuilder::new("Last").build().unwrap();
        let first = PassBuilder::new("First").next(&last).build().unwrap();

        let template = NameTemplate::new("{}-Copy").unwrap();
        let cloned = first.clone_subgraph(&template);

        assert_eq!(cloned.name(), "First-Copy");
        let cloned_last = cloned.next_state().unwrap();
        assert_eq!(cloned_last.name(), "Last-Copy");
        assert!(!cloned.ptr_eq(&first));
        assert!(!cloned_last.ptr_eq(&last));
        // The original chain still points at its own tail.
        assert_eq!(first.next_state().unwrap().name(), "Last");
    }

    #[test]
    fn aliased_target_stays_aliased_in_the_clone() {
        let shared = SucceedBuilder::new("Shared").build().unwrap();
        let choice = ChoiceBuilder::new("Route")
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::NumericEquals, 1).unwrap(),
                &shared,
            ))
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::NumericEquals, 2).unwrap(),
                &shared,
            ))
            .default(&shared)
            .build()
            .unwrap();

        let cloned = choice.clone_subgraph(&NameTemplate::new("{}-2").unwrap());
        let targets: Vec<StateRef> = cloned.child_states();
        assert_eq!(targets.len(), 3);
        assert!(targets[0].ptr_eq(&targets[1]));
        assert!(targets[1].ptr_eq(&targets[2]));
        assert_eq!(targets[0].name(), "Shared-2");
    }

    #[test]
    fn cyclic_graph_clone_terminates_and_preserves_the_cycle() {
        let a = PassBuilder::new("A").build().unwrap();
        let b = PassBuilder::new("B").next(&a).build().unwrap();
        a.set_next(&b).unwrap();

        let cloned = a.clone_subgraph(&NameTemplate::new("{}-Loop").unwrap());
        let cloned_b = cloned.next_state().unwrap();
        assert_eq!(cloned_b.name(), "B-Loop");
        assert!(cloned_b.next_state().unwrap().ptr_eq(&cloned));
    }

    #[test]
    fn cloned_retriers_are_independent() {
        let fallback = SucceedBuilder::new("Fallback").build().unwrap();
        let task = TaskBuilder::new("Fragile")
            .resource("arn:fragile")
            .retry(vec![Retrier::new(["Transient"]).unwrap()])
            .catch(vec![Catcher::new(["States.ALL"], &fallback).unwrap()])
            .end()
            .build()
            .unwrap();

        let cloned = task.clone_subgraph(&NameTemplate::new("{}-Copy").unwrap());
        cloned
            .set_retriers(vec![Retrier::new(["Replaced"]).unwrap()])
            .unwrap();

        let original_json = task.to_json().unwrap();
        assert_eq!(original_json["Retry"][0]["ErrorEquals"][0], "Transient");
        let cloned_json = cloned.to_json().unwrap();
        assert_eq!(cloned_json["Retry"][0]["ErrorEquals"][0], "Replaced");
        // Catcher targets were cloned, not shared.
        assert_eq!(cloned_json["Catch"][0]["Next"], "Fallback-Copy");
        assert_eq!(original_json["Catch"][0]["Next"], "Fallback");
    }

    #[test]
    fn self_loop_clones_to_self_loop() {
        let looping = PassBuilder::new("Again").build().unwrap();
        looping.set_next(&looping).unwrap();

        let cloned = looping.clone_subgraph(&NameTemplate::new("{}-X").unwrap());
        assert!(cloned.next_state().unwrap().ptr_eq(&cloned));
    }
}
