//! Integer error codes and their categories.
//!
//! An [`ErrorCode`] is an `i32` paired with the [`ErrorCategory`] that gives
//! it meaning, so codes from different sources can travel through one type.
//! Error identifiers convert to codes of the `errleaf` category and back,
//! which lets an [`ErrorId`] cross interfaces that only speak error codes.
//! Codes of any other category are foreign: converting one into an
//! [`ErrorId`] allocates a new identifier and loads the code as a payload.

use alloc::borrow::Cow;
use core::{
    any::{Any, TypeId},
    fmt, hash,
};

use crate::{
    ErrorId,
    id::{TAG_MASK, TAG_VALUE, new_id},
};

/// A family of error codes.
///
/// Categories are identified by their concrete type: two codes belong to the
/// same category when their categories are values of the same type. The
/// [`name`](ErrorCategory::name) is only used for display.
///
/// # Examples
///
/// ```
/// use std::borrow::Cow;
///
/// use errleaf::{ErrorCategory, ErrorCode};
///
/// struct HttpCategory;
///
/// impl ErrorCategory for HttpCategory {
///     fn name(&self) -> &'static str {
///         "http"
///     }
///
///     fn message(&self, value: i32) -> Cow<'static, str> {
///         match value {
///             404 => Cow::Borrowed("not found"),
///             _ => Cow::Owned(format!("status {value}")),
///         }
///     }
/// }
///
/// static HTTP: HttpCategory = HttpCategory;
///
/// let code = ErrorCode::new(404, &HTTP);
/// assert_eq!(code.message(), "not found");
/// assert_eq!(code.to_string(), "http:404: not found");
/// ```
pub trait ErrorCategory: Any + Sync {
    /// Name of the category, used when displaying codes.
    fn name(&self) -> &'static str;

    /// Human readable description of `value`. Defaults to the category name.
    fn message(&self, value: i32) -> Cow<'static, str> {
        let _ = value;
        Cow::Borrowed(self.name())
    }
}

/// Category of codes that wrap error identifiers.
struct ErrleafCategory;

impl ErrorCategory for ErrleafCategory {
    fn name(&self) -> &'static str {
        "errleaf"
    }
}

static ERRLEAF_CATEGORY: ErrleafCategory = ErrleafCategory;

/// An error code: a value and the category it belongs to.
///
/// A zero value means success in every category.
#[derive(Clone, Copy)]
pub struct ErrorCode {
    value: i32,
    category: &'static dyn ErrorCategory,
}

impl ErrorCode {
    /// Creates a code of `category`.
    #[must_use]
    pub const fn new(value: i32, category: &'static dyn ErrorCategory) -> Self {
        Self { value, category }
    }

    /// The numeric value.
    #[must_use]
    pub const fn value(&self) -> i32 {
        self.value
    }

    /// The category this code belongs to.
    #[must_use]
    pub const fn category(&self) -> &'static dyn ErrorCategory {
        self.category
    }

    /// Returns `true` for nonzero codes.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.value != 0
    }

    /// The category's description of this code.
    #[must_use]
    pub fn message(&self) -> Cow<'static, str> {
        self.category.message(self.value)
    }

    /// Returns `true` if this code belongs to category type `C`.
    #[must_use]
    pub fn is_category<C: ErrorCategory>(&self) -> bool {
        self.category_type() == TypeId::of::<C>()
    }

    /// Concrete type of the category.
    fn category_type(&self) -> TypeId {
        let category: &dyn Any = self.category;
        category.type_id()
    }
}

/// Returns `true` if `code` wraps an error identifier, i.e. it was produced
/// by [`ErrorId::to_error_code`].
///
/// Only the crate's own private category qualifies, whatever name another
/// category reports. A code of that category whose value is not a valid
/// identifier does not qualify either.
#[must_use]
pub fn is_error_id(code: &ErrorCode) -> bool {
    code.is_category::<ErrleafCategory>()
        && (code.value == 0 || code.value.cast_unsigned() & TAG_MASK == TAG_VALUE)
}

impl PartialEq for ErrorCode {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.category_type() == other.category_type()
    }
}

impl Eq for ErrorCode {}

impl hash::Hash for ErrorCode {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.category_type().hash(state);
    }
}

impl fmt::Debug for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorCode")
            .field("value", &self.value)
            .field("category", &self.category.name())
            .finish()
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}: {}",
            self.category.name(),
            self.value,
            self.message()
        )
    }
}

impl core::error::Error for ErrorCode {}

impl From<ErrorId> for ErrorCode {
    fn from(id: ErrorId) -> Self {
        Self::new(id.value().cast_signed(), &ERRLEAF_CATEGORY)
    }
}

impl From<ErrorCode> for ErrorId {
    /// Imports an error code.
    ///
    /// A zero code is [`ErrorId::NONE`]. A code for which [`is_error_id`]
    /// holds yields the identifier it wraps. Any other code allocates a new
    /// identifier and loads the code onto it as an [`ErrorCode`] payload.
    fn from(code: ErrorCode) -> Self {
        if !code.is_error() {
            return ErrorId::NONE;
        }
        let raw = if is_error_id(&code) {
            code.value.cast_unsigned()
        } else {
            let id = new_id();
            crate::load::load_slot(id, code);
            id
        };
        ErrorId::from_raw(raw)
    }
}

#[cfg(feature = "std")]
pub use self::os::OsCategory;

#[cfg(feature = "std")]
mod os {
    use alloc::{borrow::Cow, string::ToString};

    use super::{ErrorCategory, ErrorCode};
    use crate::{ErrorId, Value, new_error};

    /// Category of operating system error numbers (`errno`, `GetLastError`).
    #[derive(Clone, Copy, Debug, Default)]
    pub struct OsCategory;

    static OS_CATEGORY: OsCategory = OsCategory;

    impl OsCategory {
        /// Wraps a raw OS error number.
        #[must_use]
        pub fn code(value: i32) -> ErrorCode {
            ErrorCode::new(value, &OS_CATEGORY)
        }
    }

    impl ErrorCategory for OsCategory {
        fn name(&self) -> &'static str {
            "os"
        }

        fn message(&self, value: i32) -> Cow<'static, str> {
            Cow::Owned(std::io::Error::from_raw_os_error(value).to_string())
        }
    }

    impl ErrorId {
        /// Imports an I/O error.
        ///
        /// Errors carrying an OS error number become an [`ErrorCode`] of the
        /// [`OsCategory`] (see `From<ErrorCode> for ErrorId`). Other errors
        /// are loaded as a `std::io::Error` payload onto a new identifier.
        ///
        /// # Examples
        ///
        /// ```
        /// use errleaf::{Context, ErrorCode, ErrorId, OsCategory, with_context};
        ///
        /// let mut ctx = Context::<(ErrorCode, std::io::Error)>::new();
        /// let id = with_context(&mut ctx, || {
        ///     ErrorId::from_io_error(std::io::Error::from_raw_os_error(2))
        /// });
        /// assert_eq!(ctx.get::<ErrorCode>(id), Some(&OsCategory::code(2)));
        /// assert!(ctx.get::<std::io::Error>(id).is_none());
        /// ```
        pub fn from_io_error(error: std::io::Error) -> ErrorId {
            match error.raw_os_error() {
                Some(value) if value != 0 => ErrorId::from(OsCategory::code(value)),
                _ => new_error(Value(error)),
            }
        }
    }
}
