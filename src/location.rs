use core::fmt;

/// Where an error was created.
///
/// Loaded by [`ErrorId::load_source_location`](crate::ErrorId::load_source_location)
/// and by the [`new_error!`](crate::new_error!) macro. Receive it like any
/// other payload, by listing `SourceLocation` in a [`Context`](crate::Context).
///
/// # Examples
///
/// ```
/// use errleaf::{Context, SourceLocation, with_context};
///
/// let mut ctx = Context::<(SourceLocation,)>::new();
/// let (id, line) = with_context(&mut ctx, || (errleaf::new_error!(), line!()));
///
/// let location = ctx.get::<SourceLocation>(id).unwrap();
/// assert_eq!(location.line(), line);
/// assert!(location.file().ends_with(".rs"));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    file: &'static str,
    line: u32,
    function: &'static str,
}

impl SourceLocation {
    /// Creates a source location.
    ///
    /// # Panics
    ///
    /// Panics if `file` or `function` is empty, or if `line` is zero.
    #[track_caller]
    #[must_use]
    pub fn new(file: &'static str, line: u32, function: &'static str) -> Self {
        assert!(!file.is_empty(), "source location without a file name");
        assert!(line > 0, "source location with line number zero");
        assert!(!function.is_empty(), "source location without a function name");
        Self {
            file,
            line,
            function,
        }
    }

    /// Source file name.
    #[must_use]
    pub fn file(&self) -> &'static str {
        self.file
    }

    /// One-based line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Enclosing function, or module path when created by
    /// [`new_error!`](crate::new_error!).
    #[must_use]
    pub fn function(&self) -> &'static str {
        self.function
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) in function {}", self.file, self.line, self.function)
    }
}
