//! Reachability closure over a state graph.
//!
//! A [`Branch`] names a start state; the set of reachable states is derived
//! on demand, never cached. Traversal follows the single next edge, choice
//! rule targets plus the default, and catcher targets — the edges that stay
//! within one name namespace. A parallel state's inner branches are their
//! own namespaces: they are validated recursively and serialized nested
//! under `"Branches"`.

use crate::core::state::StateRef;
use crate::error::ValidationError;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet, VecDeque};

/// A branch of processing within a state machine or parallel state.
#[derive(Clone, Debug)]
pub struct Branch {
    start: StateRef,
}

impl Branch {
    pub fn new(start: &StateRef) -> Self {
        Self {
            start: start.clone(),
        }
    }

    pub fn start_state(&self) -> &StateRef {
        &self.start
    }

    pub(crate) fn start_mut(&mut self) -> &mut StateRef {
        &mut self.start
    }

    /// Every state reachable from the start state, visited exactly once in
    /// deterministic breadth-first order. Composite states are replaced by
    /// their expansions. Cycles are tolerated; two distinct states sharing
    /// one name are not.
    pub fn states(&self) -> Result<Vec<StateRef>, ValidationError> {
        let mut ordered = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        let mut names: HashMap<String, usize> = HashMap::new();
        let mut queue: VecDeque<StateRef> = VecDeque::new();
        queue.push_back(self.start.clone());

        while let Some(state) = queue.pop_front() {
            if !visited.insert(state.key()) {
                continue;
            }
            let resolved = state.resolve()?;
            if !resolved.ptr_eq(&state) && !visited.insert(resolved.key()) {
                continue;
            }

            let name = resolved.name();
            match names.get(&name) {
                Some(existing) if *existing != resolved.key() => {
                    return Err(ValidationError::DuplicateStateName(name));
                }
                Some(_) => {}
                None => {
                    names.insert(name, resolved.key());
                    ordered.push(resolved.clone());
                }
            }

            for child in resolved.child_states() {
                if !visited.contains(&child.key()) {
                    queue.push_back(child);
                }
            }
        }
        Ok(ordered)
    }

    /// Validate every reachable state, recursing into parallel inner
    /// branches.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for state in self.states()? {
            state.validate()?;
        }
        Ok(())
    }

    /// Render `{"StartAt": …, "States": {name: definition}}` for this
    /// branch's namespace.
    pub fn to_json(&self) -> Result<Value, ValidationError> {
        let mut states = Map::new();
        for state in self.states()? {
            states.insert(state.name(), state.to_json()?);
        }
        let mut json = Map::new();
        json.insert("StartAt".to_string(), Value::String(self.start.name()));
        json.insert("States".to_string(), Value::Object(states));
        Ok(Value::Object(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{
        ChoiceBuilder, FailBuilder, ParallelBuilder, PassBuilder, SucceedBuilder, TaskBuilder,
    };
    use crate::core::retry::Catcher;
    use crate::core::{ChoiceRule, Comparator, Comparison};

    #[test]
    fn closure_follows_next_edges() {
        let third = SucceedBuilder::new("Third").build().unwrap();
        let second = PassBuilder::new("Second").next(&third).build().unwrap();
        let first = PassBuilder::new("First").next(&second).build().unwrap();

        let names: Vec<String> = Branch::new(&first)
            .states()
            .unwrap()
            .iter()
            .map(StateRef::name)
            .collect();
        assert_eq!(names, ["First", "Second", "Third"]);
    }

    #[test]
    fn closure_follows_rule_targets_default_and_catchers() {
        let matched = SucceedBuilder::new("Matched").build().unwrap();
        let fallback = FailBuilder::new("Unmatched").build().unwrap();
        let rescue = SucceedBuilder::new("Rescued").build().unwrap();

        let choice = ChoiceBuilder::new("Route")
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::BooleanEquals, true).unwrap(),
                &matched,
            ))
            .default(&fallback)
            .build()
            .unwrap();
        let task = TaskBuilder::new("Work")
            .resource("arn:work")
            .catch(vec![Catcher::new(["States.ALL"], &rescue).unwrap()])
            .next(&choice)
            .build()
            .unwrap();

        let names: Vec<String> = Branch::new(&task)
            .states()
            .unwrap()
            .iter()
            .map(StateRef::name)
            .collect();
        assert_eq!(names, ["Work", "Route", "Rescued", "Matched", "Unmatched"]);
    }

    #[test]
    fn closure_visits_shared_target_once() {
        let shared = SucceedBuilder::new("Shared").build().unwrap();
        let left = PassBuilder::new("Left").next(&shared).build().unwrap();
        let choice = ChoiceBuilder::new("Route")
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::BooleanEquals, true).unwrap(),
                &left,
            ))
            .default(&shared)
            .build()
            .unwrap();

        let states = Branch::new(&choice).states().unwrap();
        assert_eq!(states.len(), 3);
    }

    #[test]
    fn closure_survives_cycles() {
        let a = PassBuilder::new("A").build().unwrap();
        let b = PassBuilder::new("B").next(&a).build().unwrap();
        a.set_next(&b).unwrap();

        let states = Branch::new(&a).states().unwrap();
        assert_eq!(states.len(), 2);
    }

    #[test]
    fn parallel_branches_are_not_flattened_into_the_outer_namespace() {
        let inner = SucceedBuilder::new("Inner").build().unwrap();
        let after = SucceedBuilder::new("After").build().unwrap();
        let parallel = ParallelBuilder::new("Fan")
            .branch(&inner)
            .next(&after)
            .build()
            .unwrap();

        let names: Vec<String> = Branch::new(&parallel)
            .states()
            .unwrap()
            .iter()
            .map(StateRef::name)
            .collect();
        assert_eq!(names, ["Fan", "After"]);
    }

    #[test]
    fn duplicate_names_among_distinct_states_are_rejected() {
        let first = SucceedBuilder::new("Twin").build().unwrap();
        let second = SucceedBuilder::new("Twin").build().unwrap();
        let choice = ChoiceBuilder::new("Route")
            .rule(ChoiceRule::when(
                Comparison::new("$.x", Comparator::BooleanEquals, true).unwrap(),
                &first,
            ))
            .default(&second)
            .build()
            .unwrap();

        let err = Branch::new(&choice).states().unwrap_err();
        assert!(matches!(err, ValidationError::DuplicateStateName(name) if name == "Twin"));
    }

    #[test]
    fn branch_json_maps_every_reachable_state_by_name() {
        let done = SucceedBuilder::new("Done").build().unwrap();
        let start = PassBuilder::new("Start").next(&done).build().unwrap();

        let json = Branch::new(&start).to_json().unwrap();
        assert_eq!(json["StartAt"], "Start");
        let states = json["States"].as_object().unwrap();
        assert_eq!(states.len(), 2);
        assert!(states.contains_key("Start"));
        assert!(states.contains_key("Done"));
    }

    #[test]
    fn branch_validation_recurses_into_parallel_branches() {
        // The inner pass has no transition, which only branch validation of
        // the parallel's inner namespace can notice.
        let broken = PassBuilder::new("Broken").build().unwrap();
        let parallel = ParallelBuilder::new("Fan")
            .branch(&broken)
            .end()
            .build()
            .unwrap();

        let err = Branch::new(&parallel).validate().unwrap_err();
        assert!(matches!(err, ValidationError::MissingTransition(name) if name == "Broken"));
    }
}
