//! Routing on input data with a choice state.
//!
//! Run with `cargo run --example choice_routing`.

use statecraft::builder::{ChoiceBuilder, FailBuilder, PassBuilder, StateMachineBuilder, SucceedBuilder};
use statecraft::{ChoiceRule, Comparator, Comparison};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let out_of_range = FailBuilder::new("OutOfRange")
        .error("Outside")
        .cause("Value < 3 or > 5")
        .build()?;
    let unexpected = FailBuilder::new("Unexpected")
        .error("NoSelection")
        .cause("Unexpected")
        .build()?;
    let accepted = SucceedBuilder::new("Accepted").build()?;

    let gt5 = Comparison::new("$.myValue", Comparator::NumericGreaterThan, 5)?;
    let lt3 = Comparison::new("$.myValue", Comparator::NumericLessThan, 3)?;
    let is3 = Comparison::new("$.myValue", Comparator::NumericEquals, 3)?;
    let is4 = Comparison::new("$.myValue", Comparator::NumericEquals, 4)?;

    let router = ChoiceBuilder::new("Router")
        .rule(ChoiceRule::any_of(vec![gt5, lt3], &out_of_range)?)
        .rule(ChoiceRule::any_of(vec![is3, is4], &accepted)?)
        .default(&unexpected)
        .build()?;
    let entry = PassBuilder::new("Entry").next(&router).build()?;

    let machine = StateMachineBuilder::new()
        .comment("Routes on $.myValue: 3 or 4 succeed, anything else fails")
        .start_state(&entry)
        .build()?;

    println!("{}", machine.to_json_string()?);
    Ok(())
}
