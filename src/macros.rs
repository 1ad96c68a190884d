/// Creates a new error identifier carrying the location of the call site.
///
/// Expands to [`new_error_at`](crate::new_error_at) with `file!()`,
/// `line!()` and `module_path!()`, followed by [`ErrorId::load`] of the
/// given items, if any.
///
/// [`ErrorId::load`]: crate::ErrorId::load
///
/// # Examples
///
/// ```
/// use errleaf::{Context, SourceLocation, Value, new_error, with_context};
///
/// #[derive(Debug, PartialEq)]
/// struct Offset(usize);
///
/// let mut ctx = Context::<(SourceLocation, Offset)>::new();
/// let id = with_context(&mut ctx, || new_error!(Value(Offset(128))));
///
/// assert_eq!(ctx.get::<Offset>(id), Some(&Offset(128)));
/// let location = ctx.get::<SourceLocation>(id).unwrap();
/// assert_eq!(location.function(), module_path!());
///
/// // Without payloads.
/// let id = new_error!();
/// assert!(id.is_error());
/// ```
#[macro_export]
macro_rules! new_error {
    () => {
        $crate::new_error_at(::core::file!(), ::core::line!(), ::core::module_path!())
    };
    ($($item:expr),+ $(,)?) => {
        $crate::new_error_at(::core::file!(), ::core::line!(), ::core::module_path!())
            .load(($($item,)+))
    };
}
