//! The smallest possible machine: a single pass state injecting a value.
//!
//! Run with `cargo run --example hello_world`.

use statecraft::builder::{PassBuilder, StateMachineBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let hello_world = PassBuilder::new("HelloWorld")
        .result(serde_json::json!({"Hello": "World!"}))
        .end()
        .build()?;

    let machine = StateMachineBuilder::new()
        .comment("A Hello World example of the Amazon States Language using a Pass state")
        .start_state(&hello_world)
        .build()?;

    println!("{}", machine.to_json_string()?);
    Ok(())
}
