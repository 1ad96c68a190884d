//! Typed storage slots and their activation protocol.
//!
//! A [`Slot<E>`] receives payloads of type `E`. While inactive it is plain
//! local storage. Activating it moves its storage onto the calling thread's
//! stack of active slots for `E`, where loads find it; deactivating moves the
//! storage back. Slots of one payload type must be activated and deactivated
//! in LIFO order on a thread.
//!
//! Usually slots are managed in bulk through a [`Context`](crate::Context).

use core::{
    any::{Any, TypeId, type_name},
    fmt, mem,
};

use errleaf_internals::{FrameId, Keyed, Registry, SlotStack};

use crate::{ErrorId, Payload, util::thread_panicking};

/// Activation protocol violations reported by [`Slot::try_activate`] and
/// [`Slot::try_deactivate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivationError {
    /// The slot is already active.
    AlreadyActive,
    /// The slot is not active.
    NotActive,
    /// The slot is active but another slot of the same payload type was
    /// activated after it and is still active.
    NotTop,
    /// The slot is active on a different thread than the calling one.
    ForeignThread,
}

impl fmt::Display for ActivationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivationError::AlreadyActive => write!(f, "slot is already active"),
            ActivationError::NotActive => write!(f, "slot is not active"),
            ActivationError::NotTop => {
                write!(f, "slot is not the innermost active slot of its payload type")
            }
            ActivationError::ForeignThread => write!(f, "slot was activated on another thread"),
        }
    }
}

impl core::error::Error for ActivationError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SlotState {
    /// Never activated, storage is local.
    Idle,
    /// Storage lives in `frame` of the thread's stack, which was pushed
    /// directly over `predecessor`.
    Active {
        frame: FrameId,
        predecessor: Option<FrameId>,
    },
    /// Storage is local again. `predecessor` must be the innermost frame for
    /// a propagation to reach it.
    Deactivated { predecessor: Option<FrameId> },
}

/// Outcome of offering a payload to the enclosing slot.
enum Forwarded<E> {
    /// There was no payload to forward.
    Empty,
    /// The enclosing slot took the payload.
    Moved,
    /// The enclosing slot already holds a payload.
    Rejected((u32, E)),
    /// There is no enclosing slot.
    Unclaimed((u32, E)),
    /// The frames recorded at activation are gone from this thread's stack.
    Stale(Option<(u32, E)>),
}

impl<E> Forwarded<E> {
    fn offer(stack: &mut SlotStack<E>, predecessor: FrameId, payload: (u32, E)) -> Self {
        match stack.fill_if_empty(predecessor, payload) {
            None => Forwarded::Moved,
            Some(payload) => Forwarded::Rejected(payload),
        }
    }
}

/// Storage for at most one payload of type `E`, keyed by error identifier.
///
/// # Examples
///
/// ```
/// use errleaf::{Slot, Value, new_error};
///
/// #[derive(Debug, PartialEq)]
/// struct Host(&'static str);
///
/// let mut outer = Slot::<Host>::new();
/// let mut inner = Slot::<Host>::new();
/// outer.activate();
/// inner.activate();
///
/// let id = new_error(Value(Host("db-1")));
///
/// // The inner scope failed: hand the payload to the enclosing slot.
/// inner.deactivate();
/// inner.propagate();
/// outer.deactivate();
///
/// assert_eq!(outer.has_value(id), Some(&Host("db-1")));
/// assert_eq!(inner.has_value(id), None);
/// ```
#[derive(Debug)]
pub struct Slot<E: Payload> {
    /// Local storage. Empty while the slot is active.
    storage: Keyed<E>,
    state: SlotState,
    /// Identifier whose payload was last reported as unclaimed.
    reported: u32,
}

impl<E: Payload> Default for Slot<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Payload> Slot<E> {
    /// Creates an empty, inactive slot.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: Keyed::new(),
            state: SlotState::Idle,
            reported: 0,
        }
    }

    /// Returns `true` while the slot receives loads.
    #[inline]
    pub fn is_active(&self) -> bool {
        matches!(self.state, SlotState::Active { .. })
    }

    /// Makes this slot the innermost active slot for `E` on this thread.
    ///
    /// Any payload already stored in the slot stays in it.
    pub fn try_activate(&mut self) -> Result<(), ActivationError> {
        if self.is_active() {
            return Err(ActivationError::AlreadyActive);
        }
        let storage = mem::take(&mut self.storage);
        let (frame, predecessor) = Registry::with(|registry| {
            let stack = registry.stack::<E>();
            let frame = stack.push(storage);
            (frame, stack.below(frame))
        });
        trace_event!(payload = type_name::<E>(), depth = frame.index(), "slot activated");
        self.state = SlotState::Active { frame, predecessor };
        Ok(())
    }

    /// Like [`try_activate`](Self::try_activate).
    ///
    /// # Panics
    ///
    /// Panics if the slot is already active.
    #[track_caller]
    pub fn activate(&mut self) {
        if let Err(error) = self.try_activate() {
            panic!("cannot activate slot of `{}`: {error}", type_name::<E>());
        }
    }

    /// Removes this slot from the thread's active slots for `E`, restoring its
    /// predecessor as the innermost one.
    ///
    /// Must be called on the thread that activated the slot.
    pub fn try_deactivate(&mut self) -> Result<(), ActivationError> {
        let SlotState::Active { frame, predecessor } = self.state else {
            return Err(ActivationError::NotActive);
        };
        let popped = Registry::with(|registry| match registry.existing_stack::<E>() {
            Some(stack) => match stack.pop(frame) {
                Some(storage) => Ok(storage),
                None if stack.contains(frame) => Err(ActivationError::NotTop),
                None => Err(ActivationError::ForeignThread),
            },
            None => Err(ActivationError::ForeignThread),
        });
        self.storage = popped?;
        trace_event!(payload = type_name::<E>(), depth = frame.index(), "slot deactivated");
        self.state = SlotState::Deactivated { predecessor };
        Ok(())
    }

    /// Like [`try_deactivate`](Self::try_deactivate).
    ///
    /// # Panics
    ///
    /// Panics if the slot is not active, is not the innermost active slot for
    /// `E` on this thread, or was activated on another thread.
    #[track_caller]
    pub fn deactivate(&mut self) {
        if let Err(error) = self.try_deactivate() {
            panic!("cannot deactivate slot of `{}`: {error}", type_name::<E>());
        }
    }

    /// Stores `value` under `id`, replacing any previous payload, and returns
    /// a reference to it.
    ///
    /// # Panics
    ///
    /// Panics if the slot is active (load through [`ErrorId::load`] instead)
    /// or if `id` is [`ErrorId::NONE`].
    #[track_caller]
    pub fn put(&mut self, id: ErrorId, value: E) -> &mut E {
        assert!(
            !self.is_active(),
            "cannot put into an active slot of `{}`",
            type_name::<E>()
        );
        assert!(id.is_error(), "cannot store a payload for the zero error identifier");
        let (stored, displaced) = self.storage.put(id.value(), value);
        drop(displaced);
        stored
    }

    /// The payload stored for `id`, if any.
    ///
    /// Always `None` while the slot is active.
    pub fn has_value(&self, id: ErrorId) -> Option<&E> {
        self.storage.has_value(id.value())
    }

    /// The payload stored for `id`, if any.
    ///
    /// Always `None` while the slot is active.
    pub fn has_value_mut(&mut self, id: ErrorId) -> Option<&mut E> {
        self.storage.has_value_mut(id.value())
    }

    /// The identifier the stored payload belongs to, [`ErrorId::NONE`] when
    /// empty or active.
    pub fn stored_id(&self) -> ErrorId {
        ErrorId::from_raw(self.storage.key())
    }

    /// Moves the payload out if it is stored for `id`.
    pub fn take(&mut self, id: ErrorId) -> Option<E> {
        self.storage.take_key(id.value())
    }

    /// Drops whatever payload is stored locally.
    pub fn clear(&mut self) {
        drop(self.storage.take());
    }

    /// Hands the payload to the slot that was active before this one.
    ///
    /// The predecessor only receives the payload when it holds none; otherwise
    /// the payload stays here. When there is no predecessor the payload is
    /// reported to [diagnostics](crate::diagnostics) (if enabled on this
    /// thread) and also stays here, where the outermost handler can still
    /// inspect it. A payload is reported at most once, however often the slot
    /// propagates it.
    ///
    /// Called after [`deactivate`](Self::deactivate) when the scope that
    /// activated the slot failed. Does nothing for a slot that was never
    /// activated.
    ///
    /// # Panics
    ///
    /// Outside of a panic, panics if the predecessor is no longer the
    /// innermost active slot for `E` on this thread, or if an active slot is
    /// propagated from another thread.
    #[track_caller]
    pub fn propagate(&mut self) {
        let forwarded = match self.state {
            SlotState::Idle => return,
            SlotState::Deactivated { predecessor } => {
                let Some(payload) = self.storage.take() else {
                    return;
                };
                match predecessor {
                    None => Forwarded::Unclaimed(payload),
                    Some(predecessor) => {
                        Registry::with(|registry| match registry.existing_stack::<E>() {
                            Some(stack) if stack.is_top(predecessor) => {
                                Forwarded::offer(stack, predecessor, payload)
                            }
                            _ => Forwarded::Stale(Some(payload)),
                        })
                    }
                }
            }
            SlotState::Active { frame, predecessor } => Registry::with(|registry| {
                let Some(stack) = registry
                    .existing_stack::<E>()
                    .filter(|stack| stack.contains(frame))
                else {
                    return Forwarded::Stale(None);
                };
                match (stack.frame_mut(frame).and_then(Keyed::take), predecessor) {
                    (None, _) => Forwarded::Empty,
                    (Some(payload), None) => Forwarded::Unclaimed(payload),
                    (Some(payload), Some(predecessor)) => {
                        Forwarded::offer(stack, predecessor, payload)
                    }
                }
            }),
        };

        let leftover = match forwarded {
            Forwarded::Empty => return,
            Forwarded::Moved => {
                trace_event!(payload = type_name::<E>(), "propagated to enclosing slot");
                return;
            }
            Forwarded::Rejected(payload) => {
                trace_event!(payload = type_name::<E>(), "enclosing slot already holds a payload");
                payload
            }
            Forwarded::Unclaimed(payload) => {
                trace_event!(payload = type_name::<E>(), "no enclosing slot");
                if self.reported != payload.0 {
                    self.reported = payload.0;
                    #[cfg(feature = "diagnostics")]
                    crate::diagnostics::capture_unexpected(&payload.1);
                }
                payload
            }
            Forwarded::Stale(payload) => {
                if let Some(payload) = payload {
                    self.restore(payload);
                }
                if !thread_panicking() {
                    panic!(
                        "cannot propagate slot of `{}`: the slot it was activated within is no \
                         longer the innermost active slot on this thread",
                        type_name::<E>()
                    );
                }
                return;
            }
        };
        self.restore(leftover);
    }

    /// Puts a payload that could not be forwarded back where it came from.
    fn restore(&mut self, (key, value): (u32, E)) {
        let displaced = match self.state {
            SlotState::Active { frame, .. } => Registry::with(|registry| {
                match registry
                    .existing_stack::<E>()
                    .and_then(|stack| stack.frame_mut(frame))
                {
                    Some(storage) => storage.put(key, value).1,
                    None => Some(value),
                }
            }),
            SlotState::Idle | SlotState::Deactivated { .. } => self.storage.put(key, value).1,
        };
        drop(displaced);
    }
}

impl<E: Payload> Drop for Slot<E> {
    fn drop(&mut self) {
        if let SlotState::Active { frame, .. } = self.state {
            let popped = Registry::with(|registry| {
                registry
                    .existing_stack::<E>()
                    .and_then(|stack| stack.pop(frame))
            });
            let was_top = popped.is_some();
            drop(popped);
            if !thread_panicking() {
                // A frame left behind below the top would receive later loads.
                assert!(
                    was_top,
                    "slot of `{}` dropped while active and not the innermost active slot \
                     on this thread",
                    type_name::<E>()
                );
                if cfg!(debug_assertions) {
                    panic!("slot of `{}` dropped while active", type_name::<E>());
                }
            }
        }
    }
}

/// Number of active slots for payload type `E` on the calling thread.
///
/// # Examples
///
/// ```
/// use errleaf::{Slot, stack_depth};
///
/// let mut slot = Slot::<u64>::new();
/// assert_eq!(stack_depth::<u64>(), 0);
/// slot.activate();
/// assert_eq!(stack_depth::<u64>(), 1);
/// slot.deactivate();
/// assert_eq!(stack_depth::<u64>(), 0);
/// ```
pub fn stack_depth<E: Payload>() -> usize {
    Registry::with(|registry| registry.depth::<E>())
}

/// Object-safe view of a [`Slot`] of any payload type.
///
/// Lets a [`Context`](crate::Context) drive all its slots uniformly.
pub trait AnySlot: Any {
    /// See [`Slot::activate`].
    fn activate(&mut self);
    /// See [`Slot::deactivate`].
    fn deactivate(&mut self);
    /// See [`Slot::propagate`].
    fn propagate(&mut self);
    /// See [`Slot::is_active`].
    fn is_active(&self) -> bool;
    /// See [`Slot::clear`].
    fn clear(&mut self);
    /// [`TypeId`] of the payload type.
    fn payload_type_id(&self) -> TypeId;
    /// Name of the payload type.
    fn payload_type_name(&self) -> &'static str;
    /// Writes `type_name: {:?}` followed by a newline when a payload is
    /// stored locally, nothing otherwise.
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    /// Moves the payload stored for `id`, if any, into the innermost active
    /// slot of its type, or to diagnostics when there is none.
    fn reload(&mut self, id: ErrorId);
    /// Upcast for downcasting to the concrete `Slot<E>`.
    fn as_any(&self) -> &dyn Any;
    /// Upcast for downcasting to the concrete `Slot<E>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: Payload> AnySlot for Slot<E> {
    fn activate(&mut self) {
        Slot::activate(self);
    }

    fn deactivate(&mut self) {
        Slot::deactivate(self);
    }

    fn propagate(&mut self) {
        Slot::propagate(self);
    }

    fn is_active(&self) -> bool {
        Slot::is_active(self)
    }

    fn clear(&mut self) {
        Slot::clear(self);
    }

    fn payload_type_id(&self) -> TypeId {
        TypeId::of::<E>()
    }

    fn payload_type_name(&self) -> &'static str {
        type_name::<E>()
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.storage.has_value(self.storage.key()) {
            Some(value) => writeln!(f, "{}: {value:?}", type_name::<E>()),
            None => Ok(()),
        }
    }

    fn reload(&mut self, id: ErrorId) {
        if id.is_error()
            && let Some(value) = self.take(id)
        {
            crate::load::load_slot(id.value(), value);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;

    use super::*;
    use crate::{Value, new_error};

    #[derive(Debug, PartialEq)]
    struct Port(u16);

    #[test]
    fn test_slot_send_sync() {
        static_assertions::assert_impl_all!(Slot<Port>: Send, Sync);
        static_assertions::assert_impl_all!(ActivationError: Copy, Send, Sync, core::error::Error);
    }

    #[test]
    fn test_inactive_slot_does_not_receive_loads() {
        let slot = Slot::<Port>::new();
        let id = new_error(Value(Port(80)));
        assert_eq!(slot.has_value(id), None);
    }

    #[test]
    fn test_loads_land_in_innermost_slot() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        outer.activate();
        inner.activate();
        assert_eq!(stack_depth::<Port>(), 2);

        let id = new_error(Value(Port(443)));
        inner.deactivate();
        outer.deactivate();
        assert_eq!(stack_depth::<Port>(), 0);

        assert_eq!(inner.has_value(id), Some(&Port(443)));
        assert_eq!(outer.has_value(id), None);
    }

    #[test]
    fn test_activation_errors() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        assert_eq!(outer.try_deactivate(), Err(ActivationError::NotActive));

        outer.activate();
        assert_eq!(outer.try_activate(), Err(ActivationError::AlreadyActive));
        inner.activate();
        assert_eq!(outer.try_deactivate(), Err(ActivationError::NotTop));
        assert!(outer.is_active());

        inner.deactivate();
        outer.deactivate();
    }

    #[test]
    #[should_panic(expected = "slot is already active")]
    fn test_double_activation_panics() {
        let mut slot = Slot::<Port>::new();
        slot.activate();
        slot.activate();
    }

    #[test]
    fn test_propagate_fills_empty_predecessor() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        outer.activate();
        inner.activate();
        let id = new_error(Value(Port(22)));
        inner.deactivate();
        inner.propagate();
        outer.deactivate();

        assert_eq!(outer.has_value(id), Some(&Port(22)));
        assert_eq!(inner.has_value(id), None);
    }

    #[test]
    fn test_first_writer_outside_wins() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        outer.activate();
        let first = new_error(Value(Port(1)));

        inner.activate();
        let second = new_error(Value(Port(2)));
        inner.deactivate();
        inner.propagate();
        outer.deactivate();

        assert_eq!(outer.has_value(first), Some(&Port(1)));
        assert_eq!(outer.has_value(second), None);
        assert_eq!(inner.has_value(second), Some(&Port(2)));
    }

    #[test]
    fn test_propagate_while_active() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        outer.activate();
        inner.activate();
        let id = new_error(Value(Port(8)));
        inner.propagate();
        inner.deactivate();
        outer.deactivate();
        assert_eq!(outer.has_value(id), Some(&Port(8)));
    }

    #[test]
    fn test_propagate_without_predecessor_keeps_payload() {
        let mut slot = Slot::<Port>::new();
        slot.activate();
        let id = new_error(Value(Port(9)));
        slot.deactivate();
        slot.propagate();
        assert_eq!(slot.has_value(id), Some(&Port(9)));
    }

    #[test]
    fn test_propagate_idle_slot_is_noop() {
        let mut slot = Slot::<Port>::new();
        let id = new_error(());
        slot.put(id, Port(5));
        slot.propagate();
        assert_eq!(slot.has_value(id), Some(&Port(5)));
    }

    #[test]
    fn test_put_take_clear() {
        let mut slot = Slot::<String>::new();
        let id = new_error(());
        let other = new_error(());

        slot.put(id, String::from("a")).push('b');
        assert_eq!(slot.stored_id(), id);
        assert_eq!(slot.has_value(id).map(String::as_str), Some("ab"));
        assert_eq!(slot.take(other), None);
        assert_eq!(slot.take(id).as_deref(), Some("ab"));
        assert_eq!(slot.stored_id(), ErrorId::NONE);

        slot.put(other, String::from("c"));
        slot.clear();
        assert_eq!(slot.has_value(other), None);
    }

    #[test]
    #[should_panic(expected = "cannot put into an active slot")]
    fn test_put_into_active_slot_panics() {
        let mut slot = Slot::<Port>::new();
        slot.activate();
        slot.put(new_error(()), Port(1));
    }

    #[test]
    fn test_reload_moves_payload_to_active_slot() {
        let mut captured = Slot::<Port>::new();
        let id = new_error(());
        captured.put(id, Port(3000));

        let mut receiver = Slot::<Port>::new();
        receiver.activate();
        AnySlot::reload(&mut captured, id);
        receiver.deactivate();

        assert_eq!(captured.has_value(id), None);
        assert_eq!(receiver.has_value(id), Some(&Port(3000)));
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_deactivate_on_other_thread_is_rejected() {
        let mut slot = Slot::<Port>::new();
        slot.activate();

        let local = std::thread::scope(|scope| {
            scope
                .spawn(|| {
                    let mut local = Slot::<Port>::new();
                    local.activate();
                    let id = new_error(Value(Port(7)));
                    assert_eq!(slot.try_deactivate(), Err(ActivationError::ForeignThread));
                    assert!(slot.is_active());
                    local.deactivate();
                    (id, local)
                })
                .join()
                .unwrap()
        });

        assert_eq!(stack_depth::<Port>(), 1);
        slot.deactivate();
        assert_eq!(slot.has_value(local.0), None);
        assert_eq!(local.1.has_value(local.0), Some(&Port(7)));
    }

    #[test]
    #[cfg(feature = "std")]
    #[should_panic(expected = "slot was activated on another thread")]
    fn test_deactivate_on_other_thread_panics() {
        let mut slot = Slot::<Port>::new();
        slot.activate();
        let outcome = std::thread::scope(|scope| scope.spawn(|| slot.deactivate()).join());
        if let Err(panic) = outcome {
            std::panic::resume_unwind(panic);
        }
    }

    #[test]
    #[cfg(feature = "std")]
    #[should_panic(expected = "cannot propagate slot")]
    fn test_propagate_after_enclosing_slot_left_panics() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        let mut unrelated = Slot::<Port>::new();
        outer.activate();
        inner.activate();
        new_error(Value(Port(21)));
        inner.deactivate();
        outer.deactivate();

        unrelated.activate();
        inner.propagate();
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_stale_propagation_leaves_unrelated_slot_alone() {
        let mut outer = Slot::<Port>::new();
        let mut inner = Slot::<Port>::new();
        let mut unrelated = Slot::<Port>::new();
        outer.activate();
        inner.activate();
        let id = new_error(Value(Port(21)));
        inner.deactivate();
        outer.deactivate();
        unrelated.activate();

        let outcome =
            std::panic::catch_unwind(core::panic::AssertUnwindSafe(|| inner.propagate()));
        assert!(outcome.is_err());
        unrelated.deactivate();

        assert_eq!(unrelated.has_value(id), None);
        assert_eq!(outer.has_value(id), None);
        assert_eq!(inner.has_value(id), Some(&Port(21)));
    }

    #[test]
    #[cfg(feature = "diagnostics")]
    fn test_unclaimed_payload_reported_once() {
        #[derive(Debug)]
        struct Stray(u8);

        let _enabled = crate::diagnostics::enable();
        let before = crate::diagnostics::count_of::<Stray>();

        let mut slot = Slot::<Stray>::new();
        slot.activate();
        let id = new_error(Value(Stray(1)));
        slot.propagate();
        slot.deactivate();
        slot.propagate();
        slot.propagate();
        assert_eq!(crate::diagnostics::count_of::<Stray>(), before + 1);
        assert_eq!(slot.has_value(id).map(|stray| stray.0), Some(1));

        slot.activate();
        new_error(Value(Stray(2)));
        slot.deactivate();
        slot.propagate();
        slot.propagate();
        assert_eq!(crate::diagnostics::count_of::<Stray>(), before + 2);
    }

    #[test]
    #[cfg(feature = "std")]
    #[should_panic(expected = "not the innermost active slot")]
    fn test_dropping_non_innermost_active_slot_panics() {
        // The outer frame stays behind on this thread's stack.
        #[derive(Debug)]
        struct Abandoned;

        let mut inner = Slot::<Abandoned>::new();
        {
            let mut outer = Slot::<Abandoned>::new();
            outer.activate();
            inner.activate();
        }
    }
}
