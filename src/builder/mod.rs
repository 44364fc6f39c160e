//! Fluent builders for states and machines.
//!
//! Builders collect fields, enforce the construction-time rules in
//! `build()`, and return shared [`StateRef`](crate::core::StateRef) handles
//! ready to be wired into a graph. Builders for the derived composite
//! states live in [`crate::ext`].

mod machine;
pub(crate) mod states;

pub use machine::StateMachineBuilder;
pub use states::{
    ChoiceBuilder, FailBuilder, ParallelBuilder, PassBuilder, SucceedBuilder, TaskBuilder,
    WaitBuilder,
};
