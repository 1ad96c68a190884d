//! Moving captured errors between threads with `ContextPtr`.
//!
//! Active slots belong to one thread, so a worker thread cannot load
//! payloads directly into its caller's contexts. Instead the worker runs
//! inside a shared context, which captures the failing error identifier.
//! The caller later re-loads those payloads into its own active contexts.
//!
//! # Running this Example
//!
//! ```bash
//! cargo run --example shared_context
//! ```

use std::{thread, time::Duration};

use errleaf::{
    Context, ContextPtr, ErrorContext, ErrorId, Value, make_shared_context, new_error,
    with_context, with_context_propagating,
};

#[derive(Debug, PartialEq)]
struct JobName(&'static str);

#[derive(Debug)]
struct Elapsed(Duration);

#[derive(Debug, thiserror::Error)]
#[error("job timed out after {0:?}")]
struct Timeout(Duration);

fn run_job(name: &'static str) -> Result<u64, ErrorId> {
    let budget = Duration::from_millis(5);
    thread::sleep(budget * 2);
    Err(new_error((
        Value(JobName(name)),
        Value(Elapsed(budget * 2)),
        Value(Timeout(budget)),
    )))
}

fn spawn_job(name: &'static str) -> (ContextPtr, thread::JoinHandle<Result<u64, ErrorId>>) {
    let shared = make_shared_context(Context::<(JobName, Elapsed, Timeout)>::new());
    let mut worker = shared.clone();
    let handle = thread::spawn(move || with_context_propagating(&mut worker, || run_job(name)));
    (shared, handle)
}

fn main() {
    let (mut shared, handle) = spawn_job("reindex");
    let outcome = handle.join().expect("worker thread panicked");
    println!("worker returned {outcome:?}");
    println!("shared context after the worker finished:\n{shared}");

    // The caller only cares about the timeout and the job name.
    let mut ctx = Context::<(JobName, Timeout)>::new();
    let id = with_context(&mut ctx, || shared.propagate_captured_errors());
    if let Some(timeout) = ctx.get::<Timeout>(id) {
        println!("{} failed: {timeout}", ctx.get::<JobName>(id).map_or("?", |job| job.0));
    }
}
