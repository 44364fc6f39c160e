//! The `LimitedParallel` composite: throttled concurrency.
//!
//! Iterations are partitioned into sequential cycles of at most
//! `max_concurrency` branches. Each cycle runs a concurrent `For` over its
//! slice inside a three-branch parallel that threads the loop input and the
//! accumulated results alongside the new cycle's output; a consolidator
//! task merges each cycle's results into the accumulation before the next
//! cycle starts. Peak concurrent branch count therefore never exceeds
//! `max_concurrency` regardless of the total iteration count.

use crate::builder::states::{checked_fault, checked_io, checked_name, transition_of};
use crate::builder::{ParallelBuilder, PassBuilder, TaskBuilder};
use crate::core::state::{State, StateKind, StateRef};
use crate::core::{Catcher, Retrier};
use crate::error::{BuildError, ValidationError};
use crate::ext::for_state::ForKind;
use crate::ext::{apply_transition, Composite, CompositeCore, ExtResources};
use tracing::debug;

#[derive(Clone, Debug)]
pub(crate) struct LimitedParallelKind {
    pub core: CompositeCore,
    pub body: StateRef,
    pub branch_retriers: Vec<Retrier>,
    pub iterations: u32,
    pub max_concurrency: u32,
    pub iterator_path: String,
    pub resources: ExtResources,
}

pub(crate) fn expand(
    kind: &LimitedParallelKind,
    name: &str,
    comment: &str,
) -> Result<StateRef, ValidationError> {
    let total = i64::from(kind.iterations);
    let max_concurrency = i64::from(kind.max_concurrency);
    let cycle_count = (total + max_concurrency - 1) / max_concurrency;
    debug!(state = name, cycles = cycle_count, "expanding limited parallel");

    // Build each cycle: a concurrent For over the cycle's slice, run inside
    // a parallel that also carries the loop input and the accumulated
    // results forward as list elements.
    let mut cycles: Vec<(StateRef, StateRef)> = Vec::new();
    for cycle in 0..cycle_count {
        let offset = cycle * max_concurrency;
        let cycle_iterations = max_concurrency.min(total - offset);

        let mut for_kind = ForKind {
            core: CompositeCore::default(),
            body: kind.body.clone(),
            branch_retriers: kind.branch_retriers.clone(),
            from: offset,
            to: offset + cycle_iterations,
            step: 1,
            iterator_path: kind.iterator_path.clone(),
            parallel_iterations: true,
            resources: kind.resources.clone(),
        };
        for_kind.core.transition.set_end();
        let for_state = StateRef::from_state(State {
            name: format!("{name}-For-{cycle}"),
            comment: String::new(),
            kind: StateKind::Composite(Composite::For(for_kind)),
        });

        let inputs = PassBuilder::new(format!("{name}-Pass-Inputs-{cycle}"))
            .output_path("$.[0]")
            .end()
            .build()?;
        let existing_results = PassBuilder::new(format!("{name}-Pass-Results-{cycle}"))
            .output_path("$.[1]")
            .end()
            .build()?;
        let loop_inputs = PassBuilder::new(format!("{name}-Loop-Inputs-{cycle}"))
            .output_path("$.[0]")
            .next(&for_state)
            .build()?;
        let cycle_state = ParallelBuilder::new(format!("{name}-Parallel-{cycle}"))
            .branch(&inputs)
            .branch(&existing_results)
            .branch(&loop_inputs)
            .end()
            .build()?;

        // The first cycle initializes the accumulation; later cycles fold
        // the previous cycle's output into it.
        let initializer_arn = if cycle == 0 {
            kind.resources.initializer()
        } else {
            kind.resources.limited_parallel_consolidator()
        };
        let initializer = TaskBuilder::new(format!("{name}-Initializer-{cycle}"))
            .resource(initializer_arn)
            .next(&cycle_state)
            .build()?;
        cycles.push((initializer, cycle_state));
    }

    for i in 1..cycles.len() {
        cycles[i - 1].1.set_next(&cycles[i].0)?;
    }

    let finalizer = PassBuilder::new(format!("{name}-Finalizer"))
        .output_path("$.[1]")
        .end()
        .build()?;
    let consolidator = TaskBuilder::new(format!("{name}-Consolidator"))
        .resource(kind.resources.limited_parallel_consolidator())
        .next(&finalizer)
        .build()?;
    if let Some((_, last_cycle)) = cycles.last() {
        last_cycle.set_next(&consolidator)?;
    }

    // The overall finalizer flattens the collected results and carries the
    // composite's real transition.
    let overall_finalizer = PassBuilder::new(format!("{name}-Overall_Finalizer"))
        .comment("Creates a list from the list of list of results")
        .output_path("$.[0]")
        .build()?;
    apply_transition(&overall_finalizer, &kind.core.transition)?;

    let root_comment = if comment.is_empty() {
        "Processes the branches limited by MaxConcurrent setting"
    } else {
        comment
    };
    let mut root = ParallelBuilder::new(name)
        .comment(root_comment)
        .input_path(&kind.core.io.input)
        .output_path(&kind.core.io.output)
        .result_path(&kind.core.result_path)
        .next(&overall_finalizer);
    if let Some((first_initializer, _)) = cycles.first() {
        root = root.branch(first_initializer);
    }
    if !kind.core.fault.retriers.is_empty() {
        root = root.retry(kind.core.fault.retriers.clone());
    }
    if !kind.core.fault.catchers.is_empty() {
        root = root.catch(kind.core.fault.catchers.clone());
    }
    Ok(root.build()?)
}

/// Builds a `LimitedParallel` state: `iterations` executions of the body
/// subgraph, at most `max_concurrency` of them running at once.
///
/// # Example
///
/// ```rust
/// use statecraft::builder::TaskBuilder;
/// use statecraft::ext::{ExtResources, LimitedParallelBuilder};
///
/// let resources = ExtResources::builder()
///     .initializer("arn:init").extractor("arn:extract")
///     .consolidator("arn:consolidate").finalizer("arn:finalize")
///     .parallel_finalizer("arn:finalize-par")
///     .limited_parallel_consolidator("arn:lp-consolidate")
///     .build().unwrap();
/// let body = TaskBuilder::new("Work").resource("arn:work").end().build().unwrap();
///
/// let throttled = LimitedParallelBuilder::new("Throttled", &resources)
///     .iterations(25)
///     .max_concurrency(7)
///     .body(&body)
///     .end()
///     .build()
///     .unwrap();
/// assert!(throttled.validate().is_ok());
/// ```
pub struct LimitedParallelBuilder {
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
    iterations: u32,
    max_concurrency: u32,
    iterator_path: String,
    resources: ExtResources,
}

impl LimitedParallelBuilder {
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
            iterations: 0,
            max_concurrency: 1,
            iterator_path: "$.iteration".to_string(),
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

    /// Retry rules applying to the whole construct; a triggered retry
    /// re-executes every branch.
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

    /// The start state of the subgraph executed by every branch. Required.
    pub fn body(mut self, body: &StateRef) -> Self {
        self.body = Some(body.clone());
        self
    }

    /// Retry rules applied to each branch execution separately.
    pub fn branch_retriers(mut self, retriers: Vec<Retrier>) -> Self {
        self.branch_retriers = Some(retriers);
        self
    }

    /// Total number of branch executions. Must be at least 1.
    pub fn iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Maximum number of branches running at once. Must be at least 1.
    pub fn max_concurrency(mut self, max_concurrency: u32) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Where in each branch's input document the iteration value is
    /// injected.
    pub fn iterator_path(mut self, path: impl Into<String>) -> Self {
        self.iterator_path = path.into();
        self
    }

    pub fn build(self) -> Result<StateRef, BuildError> {
        checked_name(&self.name)?;
        let io = checked_io(&self.name, &self.input_path, &self.output_path)?;
        if self.result_path.is_empty() {
            return Err(BuildError::EmptyDataPath(self.name));
        }
        if self.iterations < 1 {
            return Err(BuildError::InvalidIterations(self.name));
        }
        if self.max_concurrency < 1 {
            return Err(BuildError::InvalidMaxConcurrency(self.name));
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
            kind: StateKind::Composite(Composite::LimitedParallel(LimitedParallelKind {
                core: CompositeCore {
                    io,
                    transition: transition_of(self.next, self.end),
                    result_path: self.result_path,
                    fault,
                },
                body,
                branch_retriers,
                iterations: self.iterations,
                max_concurrency: self.max_concurrency,
                iterator_path: self.iterator_path,
                resources: self.resources,
            })),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::TaskBuilder;
    use serde_json::Value;

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

    fn throttled(iterations: u32, max_concurrency: u32) -> StateRef {
        LimitedParallelBuilder::new("Throttled", &resources())
            .iterations(iterations)
            .max_concurrency(max_concurrency)
            .body(&body())
            .end()
            .build()
            .unwrap()
    }

    /// The number of concurrent iteration branches inside one cycle's For
    /// state. The cycle's For iterates in parallel, so its iterations hang
    /// off a looper parallel, one branch each.
    fn cycle_size(states: &Value, cycle: usize) -> usize {
        let for_states = &states[format!("Throttled-For-{cycle}")]["Branches"][0]["States"];
        for_states[format!("Throttled-For-{cycle}-Looper")]["Branches"]
            .as_array()
            .unwrap()
            .len()
    }

    #[test]
    fn builder_rejects_zero_iterations_and_concurrency() {
        let base = || LimitedParallelBuilder::new("Throttled", &resources()).body(&body()).end();
        assert!(matches!(
            base().iterations(0).max_concurrency(3).build(),
            Err(BuildError::InvalidIterations(_))
        ));
        assert!(matches!(
            base().iterations(3).max_concurrency(0).build(),
            Err(BuildError::InvalidMaxConcurrency(_))
        ));
        assert!(matches!(
            LimitedParallelBuilder::new("Throttled", &resources())
                .iterations(3)
                .end()
                .build(),
            Err(BuildError::MissingLoopBody(_))
        ));
    }

    #[test]
    fn twenty_five_iterations_by_seven_yield_four_cycles() {
        let state = throttled(25, 7);
        let json = state.to_json().unwrap();
        let states = &json["Branches"][0]["States"];
        let cycle_names: Vec<&String> = states
            .as_object()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with("Throttled-Parallel-"))
            .collect();
        assert_eq!(cycle_names.len(), 4);
        assert_eq!(cycle_size(states, 0), 7);
        assert_eq!(cycle_size(states, 1), 7);
        assert_eq!(cycle_size(states, 2), 7);
        assert_eq!(cycle_size(states, 3), 4);
    }

    #[test]
    fn cycles_chain_sequentially_through_consolidating_initializers() {
        let state = throttled(5, 2);
        let json = state.to_json().unwrap();
        let states = &json["Branches"][0]["States"];
        assert_eq!(
            json["Branches"][0]["StartAt"],
            "Throttled-Initializer-0"
        );
        assert_eq!(states["Throttled-Initializer-0"]["Resource"], "arn:init");
        assert_eq!(
            states["Throttled-Initializer-1"]["Resource"],
            "arn:lp-consolidate"
        );
        assert_eq!(
            states["Throttled-Parallel-0"]["Next"],
            "Throttled-Initializer-1"
        );
        assert_eq!(
            states["Throttled-Parallel-2"]["Next"],
            "Throttled-Consolidator"
        );
        assert_eq!(
            states["Throttled-Consolidator"]["Next"],
            "Throttled-Finalizer"
        );
    }

    #[test]
    fn cycle_parallels_thread_inputs_and_results() {
        let state = throttled(3, 3);
        let json = state.to_json().unwrap();
        let states = &json["Branches"][0]["States"];
        let branches = states["Throttled-Parallel-0"]["Branches"]
            .as_array()
            .unwrap();
        assert_eq!(branches.len(), 3);
        assert_eq!(branches[0]["StartAt"], "Throttled-Pass-Inputs-0");
        assert_eq!(branches[1]["StartAt"], "Throttled-Pass-Results-0");
        assert_eq!(branches[2]["StartAt"], "Throttled-Loop-Inputs-0");
    }

    #[test]
    fn iteration_offsets_continue_across_cycles() {
        let state = throttled(5, 2);
        let json = state.to_json().unwrap();
        let states = &json["Branches"][0]["States"];
        // Cycle 1 covers [2, 4): its first injector carries value 2. The
        // injector sits inside the cycle's looper branch, behind the
        // iteration's extractor.
        let for1 = &states["Throttled-For-1"]["Branches"][0]["States"];
        let iteration0 = &for1["Throttled-For-1-Looper"]["Branches"][0]["States"]
            ["Throttled-For-1-ForLoopCycle-0"];
        let injector =
            &iteration0["Branches"][1]["States"]["Throttled-For-1-PassTask-0"];
        assert_eq!(injector["Result"]["Iteration"], 2);
        assert_eq!(injector["ResultPath"], "$.iteration");
    }

    #[test]
    fn overall_finalizer_carries_the_real_transition() {
        let after = crate::builder::SucceedBuilder::new("After").build().unwrap();
        let state = LimitedParallelBuilder::new("Throttled", &resources())
            .iterations(2)
            .max_concurrency(1)
            .body(&body())
            .next(&after)
            .build()
            .unwrap();
        let states = crate::core::Branch::new(&state).states().unwrap();
        let names: Vec<String> = states.iter().map(StateRef::name).collect();
        assert_eq!(names, ["Throttled", "Throttled-Overall_Finalizer", "After"]);

        let overall = states[1].to_json().unwrap();
        assert_eq!(overall["OutputPath"], "$.[0]");
        assert_eq!(overall["Next"], "After");
    }
}
