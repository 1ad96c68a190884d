#![no_std]
#![forbid(
    missing_docs,
    unsafe_code,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_docs_in_private_items,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`errleaf`].
//!
//! # Overview
//!
//! This crate contains the thread-scoped storage that powers the [`errleaf`]
//! error payload library: one stack of payload frames per payload type, kept
//! in a per-thread [`Registry`] keyed by [`TypeId`].
//!
//! **This crate is an implementation detail.** No semantic versioning
//! guarantees are provided. Users should depend on the [`errleaf`] crate, not
//! this one.
//!
//! # Architecture
//!
//! - **[`keyed`]**: [`Keyed`], an optional payload tagged with the error
//!   identifier it was stored under. This is the unit a slot holds.
//! - **[`stack`]**: [`SlotStack`], the frames of every currently active slot
//!   of one payload type on one thread, innermost last.
//! - **[`registry`]**: [`Registry`], the explicit handle to the calling
//!   thread's state: its slot stacks, its current error identifier and its
//!   diagnostics enable counter.
//!
//! # Re-entrancy
//!
//! [`Registry::with`] hands out exclusive access to the thread's registry for
//! the duration of a closure. Callers in [`errleaf`] never run user code
//! (payload constructors, accumulators, `Debug` or `Drop` implementations)
//! inside that closure: values are moved in and out, and dropped or rendered
//! only after the closure returns.
//!
//! # Threading model
//!
//! With the `std` feature the registry lives in a `thread_local!`. Without it
//! there is a single process-global registry behind a [`spin::Mutex`], which
//! is only meaningful for single-threaded targets; stored payloads must then
//! be [`Send`].
//!
//! [`errleaf`]: https://docs.rs/errleaf/latest/errleaf/
//! [`TypeId`]: core::any::TypeId

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod keyed;
pub mod registry;
pub mod stack;

pub use keyed::Keyed;
pub use registry::Registry;
pub use stack::{FrameId, SlotStack};

/// Bound for every value that can live in a slot stack.
///
/// Payloads are owned, `'static` values so that a frame can outlive the
/// function that loaded it. Without the `std` feature the registry is a
/// process-global and payloads must additionally be [`Send`].
#[cfg(feature = "std")]
pub trait Storable: core::any::Any {}

#[cfg(feature = "std")]
impl<T: core::any::Any> Storable for T {}

/// Bound for every value that can live in a slot stack.
///
/// Payloads are owned, `'static` values so that a frame can outlive the
/// function that loaded it. Without the `std` feature the registry is a
/// process-global and payloads must additionally be [`Send`].
#[cfg(not(feature = "std"))]
pub trait Storable: core::any::Any + Send {}

#[cfg(not(feature = "std"))]
impl<T: core::any::Any + Send> Storable for T {}
