//! Bundles of slots that are activated, deactivated and propagated as one.
//!
//! A [`Context<T>`] owns one [`Slot`] per payload type listed in the tuple
//! `T`. Code that wants to receive payloads creates a context and activates
//! it around the work that may fail, usually through
//! [`with_context`](crate::with_context) or a
//! [`ContextActivator`](crate::ContextActivator). After deactivation the
//! payloads can be inspected with [`Context::get`].
//!
//! The object-safe [`ErrorContext`] trait is what activators and
//! [`ContextPtr`](crate::ContextPtr) work with.

mod activator;
mod shared;

use alloc::vec::Vec;
use core::{any::TypeId, fmt};

pub use self::{
    activator::{
        ContextActivator, Outcome, activate_context, with_context, with_context_propagating,
    },
    shared::{ContextPtr, make_shared_context},
};
use crate::{
    ErrorId, Payload,
    slot::{AnySlot, Slot},
    util::thread_panicking,
};

/// Uniform interface of everything that can be activated as a unit.
pub trait ErrorContext {
    /// Activates every slot of the context.
    ///
    /// # Panics
    ///
    /// Panics if the context is already active.
    fn activate(&mut self);

    /// Deactivates every slot of the context.
    ///
    /// # Panics
    ///
    /// Panics if the context is not active, or if a slot of the same payload
    /// type was activated after this context and is still active.
    fn deactivate(&mut self);

    /// Propagates every slot, see [`Slot::propagate`].
    fn propagate(&mut self);

    /// Returns `true` while the context is active.
    fn is_active(&self) -> bool;

    /// Writes the captured identifier and one `type: value` line per stored
    /// payload.
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;

    /// Identifier recorded with [`capture`](Self::capture).
    fn captured_id(&self) -> ErrorId;

    /// Records the identifier whose payloads this context holds.
    fn capture(&mut self, id: ErrorId);

    /// Loads every payload stored under the captured identifier into the
    /// slots currently active on this thread, then returns that identifier.
    ///
    /// This delivers errors captured elsewhere, for example on another thread
    /// through a [`ContextPtr`](crate::ContextPtr), to the handlers of the
    /// calling thread.
    ///
    /// # Panics
    ///
    /// Panics if the context is active.
    fn propagate_captured_errors(&mut self) -> ErrorId;
}

/// A tuple of payload types, `(A,)` to `(A, B, ..., L)`.
///
/// Implemented for tuples of up to twelve [`Payload`] types. Gives
/// [`Context`] its slots and a way to visit them.
pub trait SlotSet: 'static {
    /// The tuple of slots, `(Slot<A>, Slot<B>, ...)`.
    type Slots;

    /// Creates empty, inactive slots.
    fn new_slots() -> Self::Slots;

    /// Visits every slot in tuple order.
    fn for_each<'a>(slots: &'a Self::Slots, f: &mut dyn FnMut(&'a dyn AnySlot));

    /// Visits every slot in tuple order.
    fn for_each_mut<'a>(slots: &'a mut Self::Slots, f: &mut dyn FnMut(&'a mut dyn AnySlot));
}

macro_rules! impl_slot_set_for_tuple {
    ($($payload:ident $slot:ident),+) => {
        impl<$($payload: Payload),+> SlotSet for ($($payload,)+) {
            type Slots = ($(Slot<$payload>,)+);

            fn new_slots() -> Self::Slots {
                ($(Slot::<$payload>::new(),)+)
            }

            fn for_each<'a>(slots: &'a Self::Slots, f: &mut dyn FnMut(&'a dyn AnySlot)) {
                let ($($slot,)+) = slots;
                $(f($slot);)+
            }

            fn for_each_mut<'a>(
                slots: &'a mut Self::Slots,
                f: &mut dyn FnMut(&'a mut dyn AnySlot),
            ) {
                let ($($slot,)+) = slots;
                $(f($slot);)+
            }
        }
    };
}

impl_slot_set_for_tuple!(A a);
impl_slot_set_for_tuple!(A a, B b);
impl_slot_set_for_tuple!(A a, B b, C c);
impl_slot_set_for_tuple!(A a, B b, C c, D d);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k);
impl_slot_set_for_tuple!(A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);

/// Slots for the payload types `T`, activated and deactivated together.
///
/// # Examples
///
/// ```
/// use errleaf::{Context, ErrorContext, Value, new_error};
///
/// #[derive(Debug, PartialEq)]
/// struct Table(&'static str);
/// #[derive(Debug, PartialEq)]
/// struct Row(u64);
///
/// let mut ctx = Context::<(Table, Row)>::new();
/// ctx.activate();
/// let id = new_error((Value(Table("users")), Value(Row(17))));
/// ctx.deactivate();
///
/// assert_eq!(ctx.get::<Table>(id), Some(&Table("users")));
/// assert_eq!(ctx.get::<Row>(id), Some(&Row(17)));
/// assert!(ctx.to_string().contains("Row(17)"));
/// ```
pub struct Context<T: SlotSet> {
    slots: T::Slots,
    active: bool,
    captured: ErrorId,
}

impl<T: SlotSet> Default for Context<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SlotSet> Context<T> {
    /// Creates an inactive context with empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `T` lists the same payload type twice.
    #[track_caller]
    #[must_use]
    pub fn new() -> Self {
        let slots = T::new_slots();
        let mut seen: Vec<TypeId> = Vec::new();
        T::for_each(&slots, &mut |slot| {
            assert!(
                !seen.contains(&slot.payload_type_id()),
                "payload type `{}` listed twice in a context",
                slot.payload_type_name()
            );
            seen.push(slot.payload_type_id());
        });
        Self {
            slots,
            active: false,
            captured: ErrorId::NONE,
        }
    }

    /// The slot for payload type `E`, if `T` lists it.
    pub fn slot<E: Payload>(&self) -> Option<&Slot<E>> {
        let mut found = None;
        T::for_each(&self.slots, &mut |slot| {
            if found.is_none() {
                found = slot.as_any().downcast_ref::<Slot<E>>();
            }
        });
        found
    }

    /// The slot for payload type `E`, if `T` lists it.
    pub fn slot_mut<E: Payload>(&mut self) -> Option<&mut Slot<E>> {
        let mut found = None;
        T::for_each_mut(&mut self.slots, &mut |slot| {
            if found.is_none() {
                found = slot.as_any_mut().downcast_mut::<Slot<E>>();
            }
        });
        found
    }

    /// The payload of type `E` stored for `id`.
    ///
    /// Always `None` while the context is active or when `T` does not list
    /// `E`.
    pub fn get<E: Payload>(&self, id: ErrorId) -> Option<&E> {
        self.slot::<E>()?.has_value(id)
    }

    /// Moves the payload of type `E` stored for `id` out of the context.
    pub fn take<E: Payload>(&mut self, id: ErrorId) -> Option<E> {
        self.slot_mut::<E>()?.take(id)
    }

    /// Drops every stored payload and forgets the captured identifier.
    ///
    /// # Panics
    ///
    /// Panics if the context is active.
    #[track_caller]
    pub fn clear(&mut self) {
        assert!(!self.active, "cannot clear an active context");
        T::for_each_mut(&mut self.slots, &mut |slot| slot.clear());
        self.captured = ErrorId::NONE;
    }
}

impl<T: SlotSet> ErrorContext for Context<T> {
    #[track_caller]
    fn activate(&mut self) {
        assert!(!self.active, "context is already active");
        T::for_each_mut(&mut self.slots, &mut |slot| slot.activate());
        self.active = true;
    }

    #[track_caller]
    fn deactivate(&mut self) {
        assert!(self.active, "context is not active");
        T::for_each_mut(&mut self.slots, &mut |slot| slot.deactivate());
        self.active = false;
    }

    fn propagate(&mut self) {
        T::for_each_mut(&mut self.slots, &mut |slot| slot.propagate());
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.captured.is_error() {
            writeln!(f, "Error ID: {}", self.captured)?;
        }
        let mut result = Ok(());
        T::for_each(&self.slots, &mut |slot| {
            if result.is_ok() {
                result = slot.print(f);
            }
        });
        result
    }

    fn captured_id(&self) -> ErrorId {
        self.captured
    }

    fn capture(&mut self, id: ErrorId) {
        self.captured = id;
    }

    #[track_caller]
    fn propagate_captured_errors(&mut self) -> ErrorId {
        assert!(!self.active, "cannot propagate captured errors of an active context");
        let id = self.captured;
        trace_event!(id = id.value(), "propagating captured errors");
        T::for_each_mut(&mut self.slots, &mut |slot| slot.reload(id));
        id
    }
}

impl<T: SlotSet> fmt::Display for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ErrorContext::print(self, f)
    }
}

impl<T: SlotSet> fmt::Debug for Context<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("payloads", &core::any::type_name::<T>())
            .field("active", &self.active)
            .field("captured", &self.captured)
            .finish()
    }
}

impl<T: SlotSet> Drop for Context<T> {
    fn drop(&mut self) {
        debug_assert!(
            !self.active || thread_panicking(),
            "context dropped while active"
        );
    }
}
