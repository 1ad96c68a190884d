//! Error identifiers and their allocator.
//!
//! An [`ErrorId`] names one error occurrence. It is a tagged `u32`: every
//! nonzero identifier has its two low bits set to `0b01`, which keeps
//! identifiers distinguishable from foreign error codes that were converted
//! into them, and `0` means "no error".
//!
//! Identifiers come from a single process-wide counter, so they are unique
//! across threads and increase in allocation order. The identifier most
//! recently allocated on a thread is that thread's current error, available
//! through [`current_error`].

use core::{
    fmt,
    sync::atomic::{AtomicU32, Ordering},
};

use errleaf_internals::Registry;

use crate::{
    code::ErrorCode,
    load::{Load, Value},
    location::SourceLocation,
};

/// Bits of an identifier reserved for the tag.
pub(crate) const TAG_MASK: u32 = 0b11;

/// Value of the tag bits in every nonzero identifier.
pub(crate) const TAG_VALUE: u32 = 0b01;

/// Shared allocation counter. Starts three below zero so that the first
/// identifier handed out is `1`.
static COUNTER: AtomicU32 = AtomicU32::new(TAG_VALUE.wrapping_sub(TAG_MASK + 1));

#[inline]
pub(crate) fn is_tagged(raw: u32) -> bool {
    raw & TAG_MASK == TAG_VALUE
}

fn generate_next_id() -> u32 {
    let id = COUNTER
        .fetch_add(TAG_MASK + 1, Ordering::Relaxed)
        .wrapping_add(TAG_MASK + 1);
    assert!(is_tagged(id), "allocated error identifier {id} lost its tag");
    id
}

/// Allocates a fresh identifier and makes it the thread's current one.
pub(crate) fn new_id() -> u32 {
    let id = generate_next_id();
    Registry::with(|registry| registry.set_current_id(id));
    id
}

/// The identifier most recently allocated on this thread, `0` if none.
pub(crate) fn current_id() -> u32 {
    let id = Registry::with(|registry| registry.current_id());
    assert!(id == 0 || is_tagged(id), "current error identifier {id} lost its tag");
    id
}

/// Identifier of one error occurrence.
///
/// `ErrorId` is a small `Copy` value. It does not own any payloads: it is the
/// key under which payloads are stored in whatever slots are active on the
/// thread when they are loaded. Equality and ordering compare the underlying
/// integer only.
///
/// # Examples
///
/// ```
/// use errleaf::{ErrorId, Value, new_error};
///
/// #[derive(Debug)]
/// struct Attempt(u32);
///
/// let id = new_error(Value(Attempt(3)));
/// assert!(id.is_error());
/// assert_eq!(id.value() & 0b11, 0b01);
///
/// // Loading onto "no error" does nothing.
/// assert_eq!(ErrorId::NONE.load(Value(Attempt(4))), ErrorId::NONE);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ErrorId(u32);

impl ErrorId {
    /// The identifier meaning "no error".
    pub const NONE: ErrorId = ErrorId(0);

    /// Wraps a raw identifier.
    ///
    /// # Panics
    ///
    /// Panics if `raw` is nonzero and not tagged.
    #[track_caller]
    pub(crate) fn from_raw(raw: u32) -> Self {
        assert!(
            raw == 0 || is_tagged(raw),
            "{raw} is not a valid error identifier"
        );
        Self(raw)
    }

    /// The identifier in canonical tagged form, `0` for [`ErrorId::NONE`].
    #[inline]
    #[must_use]
    pub const fn value(self) -> u32 {
        if self.0 == 0 {
            0
        } else {
            (self.0 & !TAG_MASK) | TAG_VALUE
        }
    }

    /// Returns `true` unless this is [`ErrorId::NONE`].
    #[inline]
    #[must_use]
    pub const fn is_error(self) -> bool {
        self.0 != 0
    }

    /// Attaches `items` to this error and returns `self`.
    ///
    /// `items` is a single [`Load`] item or a tuple of them, dispatched left to
    /// right. Each payload lands in the innermost active slot of its type on
    /// this thread. A no-op for [`ErrorId::NONE`]: no item is evaluated.
    ///
    /// # Examples
    ///
    /// ```
    /// use errleaf::{Compute, Context, Value, accumulate, new_error, with_context};
    ///
    /// #[derive(Debug, PartialEq)]
    /// struct Path(String);
    /// #[derive(Debug, Default, PartialEq)]
    /// struct Trail(Vec<&'static str>);
    ///
    /// let mut ctx = Context::<(Path, Trail)>::new();
    /// let id = with_context(&mut ctx, || {
    ///     new_error(()).load((
    ///         Compute(|| Path("/etc/app.toml".to_string())),
    ///         accumulate(|trail: &mut Trail| trail.0.push("open")),
    ///         accumulate(|trail: &mut Trail| trail.0.push("parse")),
    ///     ))
    /// });
    ///
    /// assert_eq!(ctx.get::<Path>(id), Some(&Path("/etc/app.toml".to_string())));
    /// assert_eq!(ctx.get::<Trail>(id), Some(&Trail(vec!["open", "parse"])));
    /// ```
    #[inline]
    pub fn load(self, items: impl Load) -> Self {
        if self.is_error() {
            items.load_into(self);
        }
        self
    }

    /// Attaches a [`SourceLocation`] payload and returns `self`.
    ///
    /// # Panics
    ///
    /// Panics if this is [`ErrorId::NONE`], if `file` or `function` is empty,
    /// or if `line` is zero.
    #[track_caller]
    pub fn load_source_location(self, file: &'static str, line: u32, function: &'static str) -> Self {
        assert!(self.is_error(), "source location loaded onto the zero error identifier");
        self.load(Value(SourceLocation::new(file, line, function)))
    }

    /// Converts this identifier into an [`ErrorCode`] of the errleaf
    /// category. Converting the code back yields this identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use errleaf::{ErrorId, is_error_id, new_error};
    ///
    /// let id = new_error(());
    /// let code = id.to_error_code();
    /// assert!(is_error_id(&code));
    /// assert_eq!(ErrorId::from(code), id);
    /// ```
    #[must_use]
    pub fn to_error_code(self) -> ErrorCode {
        ErrorCode::from(self)
    }
}

impl fmt::Debug for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ErrorId").field(&self.0).finish()
    }
}

impl fmt::Display for ErrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Allocates a new error identifier and attaches `items` to it.
///
/// The new identifier becomes the calling thread's [`current_error`]. Pass
/// `()` to allocate an identifier without payloads.
///
/// # Examples
///
/// ```
/// use errleaf::{Value, current_error, new_error};
///
/// #[derive(Debug)]
/// struct Port(u16);
///
/// let first = new_error(());
/// let second = new_error(Value(Port(8080)));
/// assert!(first < second);
/// assert_eq!(current_error(), second);
/// ```
pub fn new_error(items: impl Load) -> ErrorId {
    ErrorId::from_raw(new_id()).load(items)
}

/// The identifier most recently allocated on the calling thread, or
/// [`ErrorId::NONE`] if none was.
#[must_use]
pub fn current_error() -> ErrorId {
    ErrorId::from_raw(current_id())
}

/// Allocates a new error identifier carrying a [`SourceLocation`].
///
/// Usually reached through the [`new_error!`](crate::new_error!) macro,
/// which fills in the location of the call site.
///
/// # Panics
///
/// Panics if `file` or `function` is empty, or if `line` is zero.
#[track_caller]
pub fn new_error_at(file: &'static str, line: u32, function: &'static str) -> ErrorId {
    ErrorId::from_raw(new_id()).load_source_location(file, line, function)
}
