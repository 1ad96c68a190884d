//! The bound shared by every value that can be attached to an error.
//!
//! A payload is any owned, `'static` type implementing [`Debug`]. Payloads
//! are identified by their type: a [`Context`] receives at most one payload of
//! each type it lists, and loading a second payload of the same type for the
//! same error overwrites the first.
//!
//! Borrowed data cannot be a payload, since a payload may outlive the stack
//! frame that loaded it. Store owned values or `&'static` data instead.
//!
//! [`Debug`]: core::fmt::Debug
//! [`Context`]: crate::Context

use core::fmt;

use errleaf_internals::Storable;

/// Marker trait for values that can be loaded into error slots.
///
/// Implemented automatically for every `'static` type implementing
/// [`Debug`](core::fmt::Debug) (and [`Send`], when the `std` feature is
/// disabled). The `Debug` rendering is what diagnostics and context printing
/// show.
///
/// # Examples
///
/// ```
/// use errleaf::Payload;
///
/// #[derive(Debug)]
/// struct Retries(u32);
///
/// fn assert_payload<P: Payload>() {}
/// assert_payload::<Retries>();
/// assert_payload::<String>();
/// assert_payload::<&'static str>();
/// ```
pub trait Payload: Storable + fmt::Debug {}

impl<T: Storable + fmt::Debug> Payload for T {}

/// Wraps a payload so that diagnostics count it without rendering it.
///
/// The `Debug` implementation of `Invisible<T>` writes nothing, which is how
/// diagnostic capture recognizes payloads that should not appear in its text.
/// Useful for secrets or for bulky values that are only inspected
/// programmatically.
///
/// # Examples
///
/// ```
/// use errleaf::Invisible;
///
/// let token = Invisible("s3cr3t");
/// assert_eq!(format!("{token:?}"), "");
/// assert_eq!(token.0, "s3cr3t");
/// ```
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Invisible<T>(pub T);

impl<T> fmt::Debug for Invisible<T> {
    fn fmt(&self, _formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        Ok(())
    }
}
