//! A bounded loop with per-iteration retries, throttled to three
//! concurrent branches.
//!
//! Run with `cargo run --example bounded_loop`.

use statecraft::builder::{StateMachineBuilder, SucceedBuilder, TaskBuilder};
use statecraft::ext::{ExtResources, LimitedParallelBuilder};
use statecraft::Retrier;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let resources = ExtResources::builder()
        .initializer("arn:aws:lambda:eu-west-1:123456789012:function:for-initializer")
        .extractor("arn:aws:lambda:eu-west-1:123456789012:function:for-extractor")
        .consolidator("arn:aws:lambda:eu-west-1:123456789012:function:for-consolidator")
        .finalizer("arn:aws:lambda:eu-west-1:123456789012:function:for-finalizer")
        .parallel_finalizer("arn:aws:lambda:eu-west-1:123456789012:function:for-finalizer-parallel")
        .limited_parallel_consolidator(
            "arn:aws:lambda:eu-west-1:123456789012:function:limited-parallel-consolidator",
        )
        .build()?;

    let worker = TaskBuilder::new("ProcessShard")
        .resource("arn:aws:lambda:eu-west-1:123456789012:function:process-shard")
        .timeout_seconds(120)
        .end()
        .build()?;
    let done = SucceedBuilder::new("AllShardsProcessed").build()?;

    let throttled = LimitedParallelBuilder::new("ProcessAllShards", &resources)
        .iterations(10)
        .max_concurrency(3)
        .body(&worker)
        .iterator_path("$.shard")
        .branch_retriers(vec![Retrier::new(["States.TaskFailed"])?
            .with_interval_seconds(5)?
            .with_max_attempts(2)])
        .next(&done)
        .build()?;

    let machine = StateMachineBuilder::new()
        .comment("Processes ten shards, at most three at a time")
        .start_state(&throttled)
        .build()?;

    machine.validate()?;
    println!("{}", machine.to_json_string()?);
    Ok(())
}
