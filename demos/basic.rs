//! Basic introduction to errleaf.
//!
//! This example demonstrates the fundamental concepts:
//! 1. Creating error identifiers with `new_error!()` and `from_io_error`
//! 2. Loading typed payloads onto them
//! 3. Receiving only the payloads a handler asks for, with a `Context`
//! 4. Propagating payloads from a failing inner scope to an outer one
//!
//! # Running this Example
//!
//! ```bash
//! cargo run --example basic
//! ```

use std::fs;

use errleaf::{
    Context, ErrorCode, ErrorContext, ErrorId, SourceLocation, Value, accumulate, diagnostics,
    new_error, with_context, with_context_propagating,
};

#[derive(Debug)]
struct ConfigPath(String);

#[derive(Debug, Default)]
struct Steps(Vec<&'static str>);

/// Low-level code reports everything it knows, without knowing who listens.
fn read_config_file(path: &str) -> Result<String, ErrorId> {
    fs::read_to_string(path).map_err(|error| {
        ErrorId::from_io_error(error).load((
            Value(ConfigPath(path.to_string())),
            accumulate(|steps: &mut Steps| steps.0.push("read_config_file")),
        ))
    })
}

/// A middle layer adds to the same error and keeps what it receives for
/// itself, but hands it on when it fails.
fn load_user_config() -> Result<String, ErrorId> {
    let mut local = Context::<(Steps,)>::new();
    with_context_propagating(&mut local, || {
        read_config_file("/nonexistent/config.toml")
            .map_err(|id| id.load(accumulate(|steps: &mut Steps| steps.0.push("load_user_config"))))
    })
}

fn startup() -> Result<(), ErrorId> {
    let config = load_user_config()?;
    if config.is_empty() {
        let step = accumulate(|steps: &mut Steps| steps.0.push("startup"));
        return Err(errleaf::new_error!(step));
    }
    Ok(())
}

fn main() {
    println!("=== Basic Error Handling ===\n");

    // Example 1: only the payload types listed in the context are kept.
    println!("Example 1: a handler interested in the path and OS error code");
    let mut ctx = Context::<(ConfigPath, ErrorCode)>::new();
    if let Err(id) = with_context(&mut ctx, || read_config_file("/nonexistent/config.toml")) {
        println!("error {id}:");
        println!("{ctx}");
    }

    // Example 2: the same call chain, with a handler that also wants the
    // breadcrumbs accumulated at every layer.
    println!("Example 2: propagation from a failing inner scope");
    let mut ctx = Context::<(ConfigPath, Steps, SourceLocation)>::new();
    if let Err(id) = with_context(&mut ctx, startup) {
        ctx.capture(id);
        println!("{ctx}");
    }

    // Example 3: payloads nobody asked for are dropped, or recorded when
    // diagnostics are enabled.
    println!("Example 3: unexpected payloads");
    let _guard = diagnostics::enable();
    new_error(Value(ConfigPath("ignored.toml".to_string())));
    println!("{}", diagnostics::summary());
}
