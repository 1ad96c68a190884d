//! The explicit handle to thread-scoped error state.
//!
//! All mutable per-thread state of errleaf is reached through
//! [`Registry::with`]:
//!
//! - one [`SlotStack`] per payload type, created on first use,
//! - the identifier most recently allocated on this thread,
//! - the diagnostics enable counter.
//!
//! With the `std` feature the registry is created lazily per thread and
//! dropped with the thread. Without it a single registry is shared by the
//! whole process.

use alloc::boxed::Box;
use core::any::{Any, TypeId};

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;

use crate::{Storable, keyed::Keyed, stack::SlotStack};

/// Type-erased `SlotStack<E>`.
#[cfg(feature = "std")]
type ErasedStack = dyn Any;

/// Type-erased `SlotStack<E>`.
#[cfg(not(feature = "std"))]
type ErasedStack = dyn Any + Send;

/// Thread-scoped error state.
///
/// Obtain access with [`Registry::with`]. Do not run code that may itself
/// access the registry (user callbacks, payload destructors, `Debug`
/// implementations) inside the closure passed to [`Registry::with`].
#[derive(Debug)]
pub struct Registry {
    /// Most recently allocated error identifier on this thread.
    current_id: u32,
    /// Number of live diagnostics enable guards on this thread.
    diagnostics_depth: u32,
    /// `TypeId::of::<E>()` to a boxed `SlotStack<E>`.
    stacks: HashMap<TypeId, Box<ErasedStack>, FxBuildHasher>,
}

impl Registry {
    /// Creates an empty registry.
    fn new() -> Self {
        Self {
            current_id: 0,
            diagnostics_depth: 0,
            stacks: HashMap::with_hasher(FxBuildHasher),
        }
    }

    /// Runs `f` with exclusive access to the calling thread's registry.
    ///
    /// # Panics
    ///
    /// Panics if called re-entrantly from within `f`, or (with `std`) after
    /// the thread's registry has been destroyed during thread teardown.
    #[inline]
    pub fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
        imp::with(f)
    }

    /// The identifier most recently allocated on this thread, `0` if none.
    #[inline]
    pub fn current_id(&self) -> u32 {
        self.current_id
    }

    /// Records `id` as the most recently allocated identifier.
    #[inline]
    pub fn set_current_id(&mut self, id: u32) {
        self.current_id = id;
    }

    /// Number of diagnostics enable guards alive on this thread.
    #[inline]
    pub fn diagnostics_depth(&self) -> u32 {
        self.diagnostics_depth
    }

    /// Enters a diagnostics-enabled region.
    pub fn enter_diagnostics(&mut self) {
        self.diagnostics_depth += 1;
    }

    /// Leaves a diagnostics-enabled region.
    ///
    /// # Panics
    ///
    /// Panics if no region is open.
    pub fn exit_diagnostics(&mut self) {
        self.diagnostics_depth = match self.diagnostics_depth.checked_sub(1) {
            Some(depth) => depth,
            None => panic!("diagnostics region exited more often than entered"),
        };
    }

    /// The stack for payload type `E`, created if this is its first use on
    /// this thread.
    pub fn stack<E: Storable>(&mut self) -> &mut SlotStack<E> {
        let erased = self
            .stacks
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(SlotStack::<E>::new()));
        match erased.downcast_mut::<SlotStack<E>>() {
            Some(stack) => stack,
            None => unreachable!("slot stack stored under a foreign type id"),
        }
    }

    /// The stack for payload type `E`, if it was ever used on this thread.
    pub fn existing_stack<E: Storable>(&mut self) -> Option<&mut SlotStack<E>> {
        self.stacks
            .get_mut(&TypeId::of::<E>())?
            .downcast_mut::<SlotStack<E>>()
    }

    /// The frame currently receiving loads of payload type `E`.
    #[inline]
    pub fn top<E: Storable>(&mut self) -> Option<&mut Keyed<E>> {
        self.existing_stack::<E>()?.top_mut()
    }

    /// Number of active slots of payload type `E` on this thread.
    pub fn depth<E: Storable>(&self) -> usize {
        self.stacks
            .get(&TypeId::of::<E>())
            .and_then(|erased| erased.downcast_ref::<SlotStack<E>>())
            .map_or(0, SlotStack::depth)
    }
}

#[cfg(feature = "std")]
mod imp {
    use core::cell::RefCell;

    use super::Registry;

    std::thread_local! {
        static REGISTRY: RefCell<Registry> = RefCell::new(Registry::new());
    }

    pub(super) fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
        REGISTRY.with(|registry| match registry.try_borrow_mut() {
            Ok(mut registry) => f(&mut registry),
            Err(_) => panic!("errleaf registry accessed re-entrantly"),
        })
    }
}

#[cfg(not(feature = "std"))]
mod imp {
    use super::Registry;

    static REGISTRY: spin::Mutex<Option<Registry>> = spin::Mutex::new(None);

    pub(super) fn with<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = REGISTRY.lock();
        f(registry.get_or_insert_with(Registry::new))
    }
}
