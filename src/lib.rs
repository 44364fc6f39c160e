//! Statecraft: a builder for Amazon States Language documents
//!
//! Statecraft assembles workflow state machines as in-memory object graphs,
//! validates their structural correctness, and serializes them to the JSON
//! document consumed by a state-machine execution engine. It never executes
//! anything itself: "parallel" and "retry" are instructions in the produced
//! document, carried out by the external engine.
//!
//! # Core Concepts
//!
//! - **States**: the seven primitive kinds (`Pass`, `Task`, `Wait`,
//!   `Choice`, `Succeed`, `Fail`, `Parallel`) built through fluent builders
//!   and wired together via shared [`StateRef`](core::StateRef) handles
//! - **Choice rules**: typed comparisons with and/or/not combinators, each
//!   bound to a next-state transition
//! - **Retry/Catch**: declarative backoff and error-routing rules on
//!   fallible states
//! - **Branches**: on-demand reachability closure used for validation and
//!   serialization
//! - **Composites**: higher-level constructs (`For`, `LimitedParallel`,
//!   `BranchRetryParallel`, `TaskWithFinally`, `ParallelWithFinally`) that
//!   expand into primitive subgraphs when the document is produced
//!
//! # Example
//!
//! ```rust
//! use statecraft::builder::{PassBuilder, StateMachineBuilder, WaitBuilder};
//!
//! let wait = WaitBuilder::new("Wait1").seconds(2).end().build().unwrap();
//! let pass = PassBuilder::new("Pass1")
//!     .result(serde_json::json!({"foo": "bar"}))
//!     .next(&wait)
//!     .build()
//!     .unwrap();
//!
//! let machine = StateMachineBuilder::new()
//!     .comment("This is a test")
//!     .start_state(&pass)
//!     .build()
//!     .unwrap();
//! machine.validate().unwrap();
//! println!("{}", machine.to_json_string().unwrap());
//! ```

pub mod builder;
pub mod core;
pub mod error;
pub mod ext;

// Re-export commonly used types
pub use crate::builder::{
    ChoiceBuilder, FailBuilder, ParallelBuilder, PassBuilder, StateMachineBuilder, SucceedBuilder,
    TaskBuilder, WaitBuilder,
};
pub use crate::core::{
    Branch, Catcher, ChoiceRule, Comparator, ComparatorFamily, Comparison, ComparisonValue,
    NameTemplate, Retrier, StateMachine, StateRef, StateType, WaitTrigger,
};
pub use crate::error::{BuildError, ValidationError};
pub use crate::ext::{
    BranchRetryParallelBuilder, ExtResources, ExtResourcesBuilder, ForBuilder,
    LimitedParallelBuilder, ParallelWithFinallyBuilder, TaskWithFinallyBuilder,
};
