//! Integration tests for errleaf.
//!
//! ## Propagation Tests
//! - `test_nested_propagation_first_writer_wins`: a failing scope only fills
//!   enclosing slots that are still empty
//! - `test_successful_scope_keeps_payloads`: payloads of a successful scope
//!   never reach an enclosing slot
//! - `test_reentrant_activation`: activating an active context is a no-op and
//!   never propagates
//! - `test_panic_propagates`: unwinding out of an activated scope propagates
//!
//! ## Loading Tests
//! - `test_accumulation_combines_in_call_order`
//! - `test_thiserror_payloads`: realistic error enums travel as payloads
//! - `test_loads_are_thread_scoped`: another thread's active slots never
//!   receive this thread's payloads
//! - `test_context_cannot_be_deactivated_on_another_thread`: the other
//!   thread's own payloads stay where they were loaded
//!
//! ## Diagnostics Tests
//! - `test_unreceived_failure_is_diagnosed_once`
//! - `test_propagation_without_diagnostics_is_harmless`
//!
//! ## Error Code And Sharing Tests
//! - `test_error_code_round_trip`
//! - `test_shared_context_delivers_across_threads`

#![cfg(all(feature = "std", feature = "diagnostics"))]

use std::thread;

use errleaf::{
    Context, ContextActivator, ErrorCategory, ErrorCode, ErrorContext, ErrorId, SourceLocation,
    Value, accumulate, current_error, diagnostics, is_error_id, make_shared_context, new_error,
    stack_depth, with_context, with_context_propagating,
};

#[derive(Debug, PartialEq)]
struct FileName(&'static str);

#[derive(Debug, PartialEq)]
struct Errno(i32);

#[derive(Debug, Default, PartialEq)]
struct Breadcrumbs(Vec<&'static str>);

#[derive(Debug, thiserror::Error, PartialEq)]
enum ConfigError {
    #[error("missing key `{0}`")]
    MissingKey(&'static str),
    #[error("invalid value on line {line}")]
    InvalidValue { line: u32 },
}

fn read_config(name: &'static str) -> Result<String, ErrorId> {
    Err(new_error((Value(FileName(name)), Value(Errno(2)))))
}

fn load_settings() -> Result<String, ErrorId> {
    let mut local = Context::<(Errno,)>::new();
    with_context_propagating(&mut local, || {
        read_config("settings.toml").map_err(|id| id.load(Value(Errno(13))))
    })
}

#[test]
fn test_nested_propagation_first_writer_wins() {
    let mut outer = Context::<(FileName, Errno)>::new();
    let result = with_context(&mut outer, || {
        let early = new_error(Value(Errno(1)));
        assert!(early.is_error());
        load_settings()
    });

    let id = result.unwrap_err();
    assert_eq!(outer.get::<FileName>(id), Some(&FileName("settings.toml")));
    // The outer `Errno` slot already held a payload from `early`.
    assert_eq!(outer.get::<Errno>(id), None);
}

#[test]
fn test_successful_scope_keeps_payloads() {
    let mut outer = Context::<(FileName,)>::new();
    let mut inner = Context::<(FileName,)>::new();
    let id = with_context(&mut outer, || {
        let mut id = ErrorId::NONE;
        let result: Result<(), ErrorId> = with_context_propagating(&mut inner, || {
            id = new_error(Value(FileName("cache.db")));
            Ok(())
        });
        assert!(result.is_ok());
        id
    });

    assert_eq!(inner.get::<FileName>(id), Some(&FileName("cache.db")));
    assert_eq!(outer.get::<FileName>(id), None);
}

#[test]
fn test_reentrant_activation() {
    let mut ctx = Context::<(FileName,)>::new();
    ctx.activate();
    let depth = stack_depth::<FileName>();

    let id = {
        let guard = ContextActivator::new(&mut ctx);
        assert!(!guard.owns_activation());
        assert_eq!(stack_depth::<FileName>(), depth);
        let id = new_error(Value(FileName("a")));
        guard.finish(&id);
        id
    };

    assert!(ctx.is_active());
    assert_eq!(stack_depth::<FileName>(), depth);
    ctx.deactivate();
    assert_eq!(ctx.get::<FileName>(id), Some(&FileName("a")));
    assert_eq!(ctx.captured_id(), ErrorId::NONE);
}

#[test]
fn test_panic_propagates() {
    let mut outer = Context::<(Breadcrumbs,)>::new();
    let guard = ContextActivator::new(&mut outer);

    fn crash() {
        panic!("worker crashed");
    }

    let caught = std::panic::catch_unwind(|| {
        let mut inner = Context::<(Breadcrumbs,)>::new();
        let _guard = ContextActivator::new(&mut inner);
        new_error(accumulate(|crumbs: &mut Breadcrumbs| crumbs.0.push("worker")));
        crash();
    });
    assert!(caught.is_err());
    drop(guard);

    let id = current_error();
    assert_eq!(outer.get::<Breadcrumbs>(id), Some(&Breadcrumbs(vec!["worker"])));
}

#[test]
fn test_accumulation_combines_in_call_order() {
    let mut ctx = Context::<(Breadcrumbs,)>::new();
    let id = with_context(&mut ctx, || {
        let id = new_error(accumulate(|crumbs: &mut Breadcrumbs| crumbs.0.push("connect")));
        id.load(accumulate(|crumbs: &mut Breadcrumbs| crumbs.0.push("handshake")))
    });
    assert_eq!(
        ctx.get::<Breadcrumbs>(id),
        Some(&Breadcrumbs(vec!["connect", "handshake"]))
    );
}

#[test]
fn test_thiserror_payloads() {
    let mut ctx = Context::<(ConfigError, SourceLocation)>::new();
    let id = with_context(&mut ctx, || {
        errleaf::new_error!(Value(ConfigError::InvalidValue { line: 7 }))
    });

    let error = ctx.get::<ConfigError>(id).unwrap();
    assert_eq!(error.to_string(), "invalid value on line 7");
    assert_ne!(error, &ConfigError::MissingKey("port"));
    assert!(ctx.get::<SourceLocation>(id).unwrap().file().ends_with("integration_tests.rs"));
}

#[test]
fn test_loads_are_thread_scoped() {
    let mut ctx = Context::<(Errno,)>::new();
    let remote = with_context(&mut ctx, || {
        thread::spawn(|| new_error(Value(Errno(5)))).join().unwrap()
    });
    assert!(remote.is_error());
    assert_eq!(ctx.get::<Errno>(remote), None);
}

#[test]
fn test_context_cannot_be_deactivated_on_another_thread() {
    let mut ctx = Context::<(FileName,)>::new();
    ctx.activate();
    let mine = new_error(Value(FileName("main.log")));

    let (theirs, crashed) = thread::scope(|scope| {
        scope
            .spawn(|| {
                let mut own = Context::<(FileName,)>::new();
                let theirs = with_context(&mut own, || {
                    let theirs = new_error(Value(FileName("worker.log")));
                    let crashed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        ctx.deactivate();
                    }))
                    .is_err();
                    (theirs, crashed)
                });
                assert_eq!(own.get::<FileName>(theirs.0), Some(&FileName("worker.log")));
                theirs
            })
            .join()
            .unwrap()
    });
    assert!(crashed);

    assert!(ctx.is_active());
    ctx.deactivate();
    assert_eq!(ctx.get::<FileName>(mine), Some(&FileName("main.log")));
    assert_eq!(ctx.get::<FileName>(theirs), None);
}

#[test]
fn test_unreceived_failure_is_diagnosed_once() {
    #[derive(Debug, PartialEq)]
    struct Escaped(&'static str);

    let _enabled = diagnostics::enable();
    let before = diagnostics::count_of::<Escaped>();

    let mut ctx = Context::<(Escaped,)>::new();
    let id = with_context_propagating(&mut ctx, || new_error(Value(Escaped("lost"))));

    assert_eq!(diagnostics::count_of::<Escaped>(), before + 1);
    assert_eq!(ctx.get::<Escaped>(id), Some(&Escaped("lost")));
    assert!(diagnostics::summary().text().contains("Escaped(\"lost\")"));
}

#[test]
fn test_propagation_without_diagnostics_is_harmless() {
    #[derive(Debug)]
    struct Unwatched;

    assert!(!diagnostics::is_enabled());
    let mut ctx = Context::<(Unwatched,)>::new();
    let id = with_context_propagating(&mut ctx, || new_error(Value(Unwatched)));
    assert!(id.is_error());
    assert_eq!(diagnostics::count_of::<Unwatched>(), 0);
}

#[test]
fn test_error_code_round_trip() {
    struct SqlCategory;
    impl ErrorCategory for SqlCategory {
        fn name(&self) -> &'static str {
            "sql"
        }
    }
    static SQL: SqlCategory = SqlCategory;

    let id = new_error(());
    let code = id.to_error_code();
    assert!(is_error_id(&code));
    assert_eq!(ErrorId::from(code), id);

    let foreign = ErrorCode::new(1062, &SQL);
    let mut ctx = Context::<(ErrorCode,)>::new();
    let imported = with_context(&mut ctx, || ErrorId::from(foreign));
    assert_ne!(imported, id);
    assert_eq!(ctx.get::<ErrorCode>(imported), Some(&foreign));
}

#[test]
fn test_shared_context_delivers_across_threads() {
    let shared = make_shared_context(Context::<(FileName, Errno)>::new());

    // One worker at a time: a context is never active on two threads at once.
    let ids: Vec<ErrorId> = ["a.log", "b.log"]
        .into_iter()
        .map(|name| {
            let mut ctx = shared.clone();
            thread::spawn(move || {
                let result: Result<(), ErrorId> =
                    with_context_propagating(&mut ctx, || Err(new_error(Value(FileName(name)))));
                result.unwrap_err()
            })
            .join()
            .unwrap()
        })
        .collect();
    assert_eq!(shared.captured_id(), ids[1]);

    let mut receiver = Context::<(FileName,)>::new();
    let mut shared = shared;
    let delivered = with_context(&mut receiver, || shared.propagate_captured_errors());

    assert_eq!(delivered, ids[1]);
    assert_eq!(receiver.get::<FileName>(delivered), Some(&FileName("b.log")));
}
