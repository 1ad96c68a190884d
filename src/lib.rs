#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    unsafe_code,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Typed error payloads, delivered to whoever asked for them.
//!
//! ## Overview
//!
//! A function deep in a call chain that detects a failure often knows things
//! worth reporting: a file name, an OS error code, the record it was parsing.
//! The code that finally handles the failure may be many frames up, and
//! different callers care about different subsets of that information.
//!
//! errleaf decouples the two sides:
//!
//! - The failing code allocates a small [`ErrorId`] with [`new_error`] and
//!   loads payloads onto it. A payload is any `'static` value implementing
//!   `Debug`. The failing code does not need to know who, if anyone, will
//!   look at it.
//! - A handler that wants payloads of some types creates a
//!   [`Context`] listing them and keeps it active around the work that may
//!   fail. Loads on that thread land in the innermost active context listing
//!   the payload type. Payloads nobody asked for are dropped immediately,
//!   without allocation.
//! - When a scope fails, its context can propagate what it received to the
//!   enclosing context of the same types, so nested handlers compose.
//!
//! ## Quick example
//!
//! ```
//! use errleaf::{Context, ErrorId, Value, accumulate, new_error, with_context};
//!
//! #[derive(Debug, PartialEq)]
//! struct FileName(String);
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Attempts(u32);
//!
//! fn open(name: &str) -> Result<(), ErrorId> {
//!     Err(new_error((
//!         Value(FileName(name.to_string())),
//!         accumulate(|attempts: &mut Attempts| attempts.0 += 1),
//!     )))
//! }
//!
//! let mut ctx = Context::<(FileName,)>::new();
//! let result = with_context(&mut ctx, || open("config.toml"));
//!
//! let id = result.unwrap_err();
//! assert_eq!(ctx.get::<FileName>(id), Some(&FileName("config.toml".to_string())));
//! // Nobody asked for `Attempts`, so the accumulator never ran.
//! assert_eq!(ctx.get::<Attempts>(id), None);
//! ```
//!
//! ## Propagation
//!
//! Contexts nest. Loads go to the innermost active slot of each payload type.
//! When a scope fails, [`with_context_propagating`] or
//! [`ContextActivator::finish`] hands each payload to the enclosing slot of
//! the same type, but only if that slot is still empty: the first payload to
//! reach an outer slot wins. Panics propagate too, when the `std` feature is
//! enabled.
//!
//! ```
//! use errleaf::{Context, ErrorId, Value, new_error, with_context, with_context_propagating};
//!
//! #[derive(Debug, PartialEq)]
//! struct Stage(&'static str);
//!
//! let mut outer = Context::<(Stage,)>::new();
//! let mut inner = Context::<(Stage,)>::new();
//!
//! let id = with_context(&mut outer, || {
//!     with_context_propagating(&mut inner, || new_error(Value(Stage("decode"))))
//! });
//! assert_eq!(outer.get::<Stage>(id), Some(&Stage("decode")));
//! ```
//!
//! ## Threads
//!
//! Active slots are per thread. Identifiers are unique across the process.
//! To move captured payloads across threads, put a context behind a
//! [`ContextPtr`] and call
//! [`propagate_captured_errors`](ErrorContext::propagate_captured_errors)
//! on the receiving side.
//!
//! ## Features
//!
//! - `std` (default): per-thread state, panic-driven propagation and
//!   [`ErrorId::from_io_error`]. Without it the crate is `no_std` with
//!   `alloc`, keeps one process-wide set of active slots and requires
//!   payloads to be `Send`.
//! - `diagnostics` (default): the [`diagnostics`] module, recording payloads
//!   nobody was waiting for.
//! - `tracing`: emits `tracing` events with target `errleaf`.

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

#[macro_use]
mod util;
#[macro_use]
mod macros;

mod code;
mod context;
#[cfg(feature = "diagnostics")]
pub mod diagnostics;
mod id;
mod load;
mod location;
mod lock;
mod payload;
pub mod prelude;
mod slot;

#[cfg(feature = "std")]
pub use self::code::OsCategory;
pub use self::{
    code::{ErrorCategory, ErrorCode, is_error_id},
    context::{
        Context, ContextActivator, ContextPtr, ErrorContext, Outcome, SlotSet, activate_context,
        make_shared_context, with_context, with_context_propagating,
    },
    id::{ErrorId, current_error, new_error, new_error_at},
    load::{Accumulate, Compute, Load, Value, accumulate},
    location::SourceLocation,
    payload::{Invisible, Payload},
    slot::{ActivationError, AnySlot, Slot, stack_depth},
};
