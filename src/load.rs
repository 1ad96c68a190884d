//! Attaching payloads to error identifiers.
//!
//! Every item passed to [`ErrorId::load`] or [`new_error`] says explicitly how
//! its payload is produced:
//!
//! - [`Value`]: a ready value, stored unconditionally (overwriting any payload
//!   of the same type stored for the same error).
//! - [`Compute`]: a closure producing the value, called exactly once.
//! - [`Accumulate`] (built with [`accumulate`]): a closure that mutates the
//!   payload already stored for this error, or a default value if there is
//!   none. Repeated accumulations build up one payload.
//!
//! Tuples of items, `()` and `Option`s of items are items too.
//!
//! A payload lands in the innermost active slot of its type on the calling
//! thread. When no slot of its type is active, nobody asked for it: it is
//! reported to [diagnostics](crate::diagnostics) (when enabled) and dropped.
//!
//! [`new_error`]: crate::new_error

use core::marker::PhantomData;

use errleaf_internals::Registry;

use crate::{ErrorId, Payload, id::is_tagged};

/// Something that can be attached to an error identifier.
///
/// Implemented by [`Value`], [`Compute`], [`Accumulate`], `()`, `Option<L>`
/// and tuples of up to twelve items.
pub trait Load {
    /// Attaches this item to `id`, which is never [`ErrorId::NONE`].
    fn load_into(self, id: ErrorId);
}

/// Loads a ready payload value.
///
/// # Examples
///
/// ```
/// use errleaf::{Context, Value, new_error, with_context};
///
/// #[derive(Debug, PartialEq)]
/// struct Status(u16);
///
/// let mut ctx = Context::<(Status,)>::new();
/// let id = with_context(&mut ctx, || {
///     new_error(Value(Status(500))).load(Value(Status(503)))
/// });
/// assert_eq!(ctx.get::<Status>(id), Some(&Status(503)));
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Value<E>(pub E);

/// Loads the payload returned by a closure.
///
/// The closure runs exactly once per load onto a nonzero identifier, whether
/// or not any slot is waiting for its payload type.
#[derive(Clone, Copy)]
pub struct Compute<F>(pub F);

/// Loads by mutating the payload already stored for the error.
///
/// Created with [`accumulate`]. When the innermost active slot of type `E`
/// holds a payload for this error, the closure mutates it in place;
/// otherwise a default `E` is stored first and then mutated. When no slot of
/// type `E` is active the closure is not called.
#[derive(Clone, Copy)]
pub struct Accumulate<E, F> {
    f: F,
    _payload: PhantomData<fn(&mut E)>,
}

/// Builds an [`Accumulate`] item.
///
/// # Examples
///
/// ```
/// use errleaf::{Context, accumulate, new_error, with_context};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Log(String);
///
/// let mut ctx = Context::<(Log,)>::new();
/// let id = with_context(&mut ctx, || {
///     let id = new_error(accumulate(|log: &mut Log| log.0.push_str("connect;")));
///     id.load(accumulate(|log: &mut Log| log.0.push_str("retry;")))
/// });
/// assert_eq!(ctx.get::<Log>(id), Some(&Log("connect;retry;".to_string())));
/// ```
pub fn accumulate<E, F>(f: F) -> Accumulate<E, F>
where
    E: Payload + Default,
    F: FnOnce(&mut E),
{
    Accumulate {
        f,
        _payload: PhantomData,
    }
}

impl<E: Payload> Load for Value<E> {
    #[inline]
    fn load_into(self, id: ErrorId) {
        load_slot(id.value(), self.0);
    }
}

impl<F, E> Load for Compute<F>
where
    F: FnOnce() -> E,
    E: Payload,
{
    #[inline]
    fn load_into(self, id: ErrorId) {
        load_slot(id.value(), (self.0)());
    }
}

impl<E, F> Load for Accumulate<E, F>
where
    E: Payload + Default,
    F: FnOnce(&mut E),
{
    #[inline]
    fn load_into(self, id: ErrorId) {
        accumulate_slot(id.value(), self.f);
    }
}

impl<L: Load> Load for Option<L> {
    #[inline]
    fn load_into(self, id: ErrorId) {
        if let Some(item) = self {
            item.load_into(id);
        }
    }
}

impl Load for () {
    #[inline]
    fn load_into(self, _id: ErrorId) {}
}

macro_rules! impl_load_for_tuple {
    ($($item:ident),+) => {
        impl<$($item: Load),+> Load for ($($item,)+) {
            #[inline]
            #[allow(non_snake_case)]
            fn load_into(self, id: ErrorId) {
                let ($($item,)+) = self;
                $($item.load_into(id);)+
            }
        }
    };
}

impl_load_for_tuple!(A);
impl_load_for_tuple!(A, B);
impl_load_for_tuple!(A, B, C);
impl_load_for_tuple!(A, B, C, D);
impl_load_for_tuple!(A, B, C, D, E);
impl_load_for_tuple!(A, B, C, D, E, F);
impl_load_for_tuple!(A, B, C, D, E, F, G);
impl_load_for_tuple!(A, B, C, D, E, F, G, H);
impl_load_for_tuple!(A, B, C, D, E, F, G, H, I);
impl_load_for_tuple!(A, B, C, D, E, F, G, H, I, J);
impl_load_for_tuple!(A, B, C, D, E, F, G, H, I, J, K);
impl_load_for_tuple!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Stores `value` under `id` in the innermost active slot of type `E`.
pub(crate) fn load_slot<E: Payload>(id: u32, value: E) {
    debug_assert!(is_tagged(id));
    let outcome = Registry::with(|registry| match registry.top::<E>() {
        Some(frame) => {
            let (_, displaced) = frame.put(id, value);
            Ok(displaced)
        }
        None => Err(value),
    });
    match outcome {
        Ok(displaced) => drop(displaced),
        Err(unclaimed) => {
            debug_event!(
                payload = core::any::type_name::<E>(),
                id,
                "no active slot for payload"
            );
            #[cfg(feature = "diagnostics")]
            crate::diagnostics::capture_unexpected(&unclaimed);
            drop(unclaimed);
        }
    }
}

/// Mutates the payload of type `E` stored under `id`, starting from
/// `E::default()` when there is none.
pub(crate) fn accumulate_slot<E: Payload + Default>(id: u32, f: impl FnOnce(&mut E)) {
    debug_assert!(is_tagged(id));
    // The payload is moved out for the duration of the callback so that the
    // callback may load other payloads.
    let Some(current) =
        Registry::with(|registry| registry.top::<E>().map(|frame| frame.take_key(id)))
    else {
        return;
    };
    let mut value = current.unwrap_or_default();
    f(&mut value);
    load_slot(id, value);
}
