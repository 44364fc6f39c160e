//! The `For` composite: bounded iteration over a body subgraph.
//!
//! Expansion synthesizes one cycle per value of the arithmetic progression
//! `[from, to)` stepping by `step`. Each cycle pairs a pass-through of the
//! loop input with a freshly cloned copy of the body, fed by an extractor
//! and an injector pass that places `{"Iteration": value}` at the iterator
//! path. Cycles either chain sequentially through consolidator tasks or run
//! concurrently under a single looper parallel; either way a finalizer
//! flattens the collected results and the whole loop becomes the single
//! branch of a parallel bearing the composite's name.

use crate::builder::states::{checked_fault, checked_io, checked_name, transition_of};
use crate::builder::{ParallelBuilder, PassBuilder, TaskBuilder};
use crate::core::state::{State, StateKind, StateRef};
use crate::core::{Catcher, NameTemplate, Retrier};
use crate::error::{BuildError, ValidationError};
use crate::ext::{apply_transition, BranchRetryParallelBuilder, Composite, CompositeCore, ExtResources};
use serde_json::json;
use tracing::debug;

#[derive(Clone, Debug)]
pub(crate) struct ForKind {
    pub core: CompositeCore,
    pub body: StateRef,
    pub branch_retriers: Vec<Retrier>,
    pub from: i64,
    pub to: i64,
    pub step: i64,
    pub iterator_path: String,
    pub parallel_iterations: bool,
    pub resources: ExtResources,
}

/// The values of the progression `[from, to)` stepping by `step`. Negative
/// steps count downwards; `from == to` is empty.
fn progression(from: i64, to: i64, step: i64) -> Vec<i64> {
    let mut values = Vec::new();
    let mut value = from;
    if step > 0 {
        while value < to {
            values.push(value);
            value += step;
        }
    } else {
        while value > to {
            values.push(value);
            value += step;
        }
    }
    values
}

pub(crate) fn expand(
    kind: &ForKind,
    name: &str,
    comment: &str,
) -> Result<StateRef, ValidationError> {
    let values = progression(kind.from, kind.to, kind.step);
    debug!(state = name, iterations = values.len(), "expanding for loop");

    let branch_start = if values.is_empty() {
        // An empty progression yields an empty result list, never an error.
        PassBuilder::new(format!("{name}-Finalizer"))
            .result(json!([]))
            .end()
            .build()?
    } else {
        let finalizer_arn = if kind.parallel_iterations {
            kind.resources.parallel_finalizer()
        } else {
            kind.resources.finalizer()
        };
        let finalizer = TaskBuilder::new(format!("{name}-Finalizer"))
            .resource(finalizer_arn)
            .end()
            .build()?;
        let initializer = TaskBuilder::new(format!("{name}-Initializer"))
            .resource(kind.resources.initializer())
            .build()?;

        let mut cycles: Vec<(StateRef, StateRef)> = Vec::new();
        for (cycle, value) in values.iter().enumerate() {
            let consolidator = TaskBuilder::new(format!("{name}-Consolidator-{cycle}"))
                .resource(kind.resources.consolidator())
                .build()?;
            let template = NameTemplate::new(format!("{name}-{{}}-{cycle}"))?;
            let body = kind.body.clone_subgraph(&template);
            let injector = PassBuilder::new(format!("{name}-PassTask-{cycle}"))
                .result(json!({ "Iteration": value }))
                .result_path(&kind.iterator_path)
                .next(&body)
                .build()?;
            let extractor = TaskBuilder::new(format!("{name}-Extractor-{cycle}"))
                .resource(kind.resources.extractor())
                .next(&injector)
                .build()?;
            let input_passer = PassBuilder::new(format!("{name}-PassInput-{cycle}"))
                .end()
                .build()?;
            let mut cycle_builder = BranchRetryParallelBuilder::new(format!(
                "{name}-ForLoopCycle-{cycle}"
            ))
            .branch(&input_passer)
            .branch(&extractor)
            .next(&consolidator);
            if !kind.branch_retriers.is_empty() {
                cycle_builder = cycle_builder.branch_retriers(kind.branch_retriers.clone());
            }
            cycles.push((cycle_builder.build()?, consolidator));
        }

        if kind.parallel_iterations {
            // Concurrent looping assumes the iterations are independent.
            let mut looper_builder =
                ParallelBuilder::new(format!("{name}-Looper")).next(&finalizer);
            for (parallel, consolidator) in &cycles {
                consolidator.set_end()?;
                looper_builder = looper_builder.branch(parallel);
            }
            initializer.set_next(&looper_builder.build()?)?;
        } else {
            for i in 1..cycles.len() {
                cycles[i - 1].1.set_next(&cycles[i].0)?;
            }
            if let Some((_, last_consolidator)) = cycles.last() {
                last_consolidator.set_next(&finalizer)?;
            }
            if let Some((first_parallel, _)) = cycles.first() {
                initializer.set_next(first_parallel)?;
            }
        }
        initializer
    };

    // The loop branch always produces a single-element list, hence the
    // forced output path on the enclosing parallel.
    let mut root = ParallelBuilder::new(name)
        .comment(comment)
        .input_path(&kind.core.io.input)
        .output_path("$.[0]")
        .result_path(&kind.core.result_path)
        .branch(&branch_start);
    if !kind.core.fault.retriers.is_empty() {
        root = root.retry(kind.core.fault.retriers.clone());
    }
    if !kind.core.fault.catchers.is_empty() {
        root = root.catch(kind.core.fault.catchers.clone());
    }
    let root = root.build()?;
    apply_transition(&root, &kind.core.transition)?;
    Ok(root)
}

/// Builds a `For` state: the body subgraph is executed once per value of
/// the progression `[from, to)`, with the iteration value injected at the
/// iterator path.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TaskBuilder;
/// use statecraft::ext::{ExtResources, ForBuilder};
///
/// let resources = ExtResources::builder()
///     .initializer("arn:init").extractor("arn:extract")
///     .consolidator("arn:consolidate").finalizer("arn:finalize")
///     .parallel_finalizer("arn:finalize-par")
///     .limited_parallel_consolidator("arn:lp-consolidate")
///     .build().unwrap();
/// let body = TaskBuilder::new("Work").resource("arn:work").end().build().unwrap();
///
/// let loop_state = ForBuilder::new("Sweep", &resources)
///     .range(0, 5)
///     .step(1)
///     .body(&body)
///     .iterator_path("$.iteration")
///     .end()
///     .build()
///     .unwrap();
/// assert!(loop_state.validate().is_ok());
/// ```
pub struct ForBuilder {
    name: String,
    comment: String,
    input_path: String,
    output_path: String,
    result_path: String,
    retriers: Option<Vec<Retrier>>,
    catchers: Option<Vec<Catcher>>,
    next: Option<StateRef>,
    end: bool,
    body: Option<StateRef>,
    branch_retriers: Option<Vec<Retrier>>,
    from: i64,
    to: i64,
    step: i64,
    iterator_path: String,
    parallel_iterations: bool,
    resources: ExtResources,
}

impl ForBuilder {
    pub fn new(name: impl Into<String>, resources: &ExtResources) -> Self {
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
            body: None,
            branch_retriers: None,
            from: 0,
            to: 0,
            step: 1,
            iterator_path: "$.iteration".to_string(),
            parallel_iterations: false,
            resources: resources.clone(),
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

    /// Retry rules applying to the loop as a whole; a triggered retry
    /// re-executes every iteration.
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

    /// The iteration bounds: values are taken from `[from, to)`.
    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// The progression step. Must not be zero; negative steps count
    /// downwards. Defaults to 1.
    pub fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// The start state of the subgraph executed on every iteration.
    /// Required; it is cloned per iteration, never shared.
    pub fn body(mut self, body: &StateRef) -> Self {
        self.body = Some(body.clone());
        self
    }

    /// Retry rules applied to each iteration separately, so one iteration's
    /// transient failure does not re-execute its siblings.
    pub fn branch_retriers(mut self, retriers: Vec<Retrier>) -> Self {
        self.branch_retriers = Some(retriers);
        self
    }

    /// Where in the body's input document the iteration value is injected.
    pub fn iterator_path(mut self, path: impl Into<String>) -> Self {
        self.iterator_path = path.into();
        self
    }

    /// Run iterations concurrently instead of chaining them. Results are
    /// still collected in iteration order.
    pub fn parallel_iterations(mut self, parallel: bool) -> Self {
        self.parallel_iterations = parallel;
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.result_path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name));
        }
        if self.step == 0 {
            return Err(BuildError::ZeroStep(self.name));
        }
        if self.iterator_path.is_empty() {
            return Err(BuildError::EmptyIteratorPath(self.name));
        }
        let body = self.body.ok_or(BuildError::MissingLoopBody(self.name.clone()))?;
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
            kind: StateKind::Composite(Composite::For(ForKind {
                core: CompositeCore {
                    io,
                    transition: transition_of(self.next, self.end),
                    result_path: self.result_path,
                    fault,
                },
                body,
                branch_retriers,
                from: self.from,
                to: self.to,
                step: self.step,
                iterator_path: self.iterator_path,
                parallel_iterations: self.parallel_iterations,
                resources: self.resources,
            })),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use crate::core::Branch;

    fn resources() -> ExtResources {
        ExtResources::builder()
            .initializer("arn:init")
            .extractor("arn:extract")
            .consolidator("arn:consolidate")
            .finalizer("arn:finalize")
            .parallel_finalizer("arn:finalize-par")
            .limited_parallel_consolidator("arn:lp-consolidate")
            .build()
            .unwrap()
    }

    fn body() -> StateRef {
        TaskBuilder::new("Work")
            .resource("arn:work")
            .end()
            .build()
            .unwrap()
    }

    #[test]
    fn progression_covers_half_open_range() {
        assert_eq!(progression(0, 5, 1), [0, 1, 2, 3, 4]);
        assert_eq!(progression(0, 5, 2), [0, 2, 4]);
        assert_eq!(progression(5, 0, -2), [5, 3, 1]);
        assert!(progression(3, 3, 1).is_empty());
        assert!(progression(5, 0, 1).is_empty());
    }

    #[test]
    fn builder_rejects_bad_inputs() {
        assert!(matches!(
            ForBuilder::new("Loop", &resources()).body(&body()).step(0).end().build(),
            Err(BuildError::ZeroStep(_))
        ));
        assert!(matches!(
            ForBuilder::new("Loop", &resources()).end().build(),
            Err(BuildError::MissingLoopBody(_))
        ));
        assert!(matches!(
            ForBuilder::new("Loop", &resources())
                .body(&body())
                .iterator_path("")
                .end()
                .build(),
            Err(BuildError::EmptyIteratorPath(_))
        ));
        assert!(matches!(
            ForBuilder::new("Loop", &resources())
                .body(&body())
                .branch_retriers(vec![])
                .end()
                .build(),
            Err(BuildError::EmptyRetryList(_))
        ));
    }

    #[test]
    fn sequential_loop_synthesizes_one_cycle_per_value() {
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(0, 5)
            .body(&body())
            .end()
            .build()
            .unwrap();
        let json = loop_state.to_json().unwrap();
        assert_eq!(json["Type"], "Parallel");
        assert_eq!(json["OutputPath"], "$.[0]");

        let states = json["Branches"][0]["States"].as_object().unwrap();
        assert!(states.contains_key("Sweep-Initializer"));
        assert!(states.contains_key("Sweep-Finalizer"));
        for cycle in 0..5 {
            assert!(states.contains_key(&format!("Sweep-ForLoopCycle-{cycle}")));
            assert!(states.contains_key(&format!("Sweep-Consolidator-{cycle}")));
        }
        // Cycles chain in ascending order through their consolidators.
        assert_eq!(states["Sweep-Initializer"]["Next"], "Sweep-ForLoopCycle-0");
        assert_eq!(states["Sweep-Consolidator-0"]["Next"], "Sweep-ForLoopCycle-1");
        assert_eq!(states["Sweep-Consolidator-4"]["Next"], "Sweep-Finalizer");
        assert_eq!(states["Sweep-Finalizer"]["Resource"], "arn:finalize");
    }

    #[test]
    fn iteration_values_are_injected_at_the_iterator_path() {
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(2, 4)
            .body(&body())
            .iterator_path("$.iter")
            .end()
            .build()
            .unwrap();
        let json = loop_state.to_json().unwrap();
        let states = json["Branches"][0]["States"].as_object().unwrap();
        let cycle0 = states["Sweep-ForLoopCycle-0"]["Branches"][1]["States"].clone();
        let injector = &cycle0["Sweep-PassTask-0"];
        assert_eq!(injector["Result"]["Iteration"], 2);
        assert_eq!(injector["ResultPath"], "$.iter");
        assert_eq!(injector["Next"], "Sweep-Work-0");
        // The body clone carries a cycle-specific name.
        assert!(cycle0.get("Sweep-Work-0").is_some());
    }

    #[test]
    fn empty_progression_synthesizes_a_trivial_pass_through() {
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(0, 0)
            .body(&body())
            .end()
            .build()
            .unwrap();
        let json = loop_state.to_json().unwrap();
        let states = json["Branches"][0]["States"].as_object().unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states["Sweep-Finalizer"]["Type"], "Pass");
        assert_eq!(states["Sweep-Finalizer"]["Result"], json!([]));
    }

    #[test]
    fn parallel_loop_collects_cycles_under_a_looper() {
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(0, 3)
            .body(&body())
            .parallel_iterations(true)
            .end()
            .build()
            .unwrap();
        let json = loop_state.to_json().unwrap();
        let states = json["Branches"][0]["States"].as_object().unwrap();
        assert_eq!(states["Sweep-Initializer"]["Next"], "Sweep-Looper");
        assert_eq!(states["Sweep-Looper"]["Next"], "Sweep-Finalizer");
        assert_eq!(
            states["Sweep-Looper"]["Branches"].as_array().unwrap().len(),
            3
        );
        assert_eq!(states["Sweep-Finalizer"]["Resource"], "arn:finalize-par");
    }

    #[test]
    fn expansion_is_idempotent() {
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(0, 3)
            .body(&body())
            .end()
            .build()
            .unwrap();
        let first = loop_state.to_json().unwrap();
        let second = loop_state.to_json().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn loop_transition_survives_expansion() {
        let after = crate::builder::SucceedBuilder::new("After").build().unwrap();
        let loop_state = ForBuilder::new("Sweep", &resources())
            .range(0, 2)
            .body(&body())
            .next(&after)
            .build()
            .unwrap();
        let names: Vec<String> = Branch::new(&loop_state)
            .states()
            .unwrap()
            .iter()
            .map(StateRef::name)
            .collect();
        assert_eq!(names, ["Sweep", "After"]);
    }
}
