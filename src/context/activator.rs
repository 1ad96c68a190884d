use core::fmt;

#[cfg(feature = "std")]
use crate::util::thread_panicking;
use crate::{ErrorId, context::ErrorContext, current_error};

/// The result of a scope, as far as propagation is concerned.
///
/// Implemented for `Result` (a failure when `Err`) and for [`ErrorId`] (a
/// failure when nonzero).
pub trait Outcome {
    /// Returns `true` if the scope failed.
    fn is_failure(&self) -> bool;

    /// The identifier of the failure, [`ErrorId::NONE`] on success.
    fn error_id(&self) -> ErrorId;
}

impl<T, E> Outcome for Result<T, E> {
    #[inline]
    fn is_failure(&self) -> bool {
        self.is_err()
    }

    /// The thread's [`current_error`] for an `Err`.
    fn error_id(&self) -> ErrorId {
        if self.is_err() {
            current_error()
        } else {
            ErrorId::NONE
        }
    }
}

impl Outcome for ErrorId {
    #[inline]
    fn is_failure(&self) -> bool {
        self.is_error()
    }

    #[inline]
    fn error_id(&self) -> ErrorId {
        *self
    }
}

/// Scope guard that keeps a context active.
///
/// Creating the guard activates the context, unless it is already active,
/// in which case the guard does nothing at all. When the guard owns the
/// activation, ending the scope deactivates the context and, if the scope
/// failed, propagates its slots:
///
/// - [`finish`](Self::finish) ends the scope with an explicit [`Outcome`];
///   a failure is also recorded with [`ErrorContext::capture`].
/// - Dropping the guard ends the scope without failure, unless the thread
///   started panicking while the guard was alive (`std` only).
///
/// # Examples
///
/// ```
/// use errleaf::{Context, ContextActivator, Value, new_error};
///
/// #[derive(Debug, PartialEq)]
/// struct Query(&'static str);
///
/// fn run() -> Result<(), errleaf::ErrorId> {
///     Err(new_error(Value(Query("SELECT 1"))))
/// }
///
/// let mut outer = Context::<(Query,)>::new();
/// let outer_guard = ContextActivator::new(&mut outer);
///
/// let mut inner = Context::<(Query,)>::new();
/// let guard = ContextActivator::new(&mut inner);
/// let result = run();
/// guard.finish(&result);
///
/// drop(outer_guard);
/// let id = result.unwrap_err();
/// assert_eq!(outer.get::<Query>(id), Some(&Query("SELECT 1")));
/// assert_eq!(inner.get::<Query>(id), None);
/// ```
#[must_use = "the context is deactivated as soon as the activator is dropped"]
pub struct ContextActivator<'a, C: ErrorContext + ?Sized> {
    /// `None` when the context was already active.
    ctx: Option<&'a mut C>,
    #[cfg(feature = "std")]
    panicking_at_start: bool,
}

impl<'a, C: ErrorContext + ?Sized> ContextActivator<'a, C> {
    /// Activates `ctx` for the lifetime of the returned guard.
    #[track_caller]
    pub fn new(ctx: &'a mut C) -> Self {
        let ctx = if ctx.is_active() {
            trace_event!("context already active, activator is a no-op");
            None
        } else {
            ctx.activate();
            Some(ctx)
        };
        Self {
            ctx,
            #[cfg(feature = "std")]
            panicking_at_start: thread_panicking(),
        }
    }

    /// Returns `true` if this guard activated the context and will
    /// deactivate it.
    pub fn owns_activation(&self) -> bool {
        self.ctx.is_some()
    }

    /// Ends the scope: deactivates the context and, if `outcome` is a
    /// failure, captures its identifier and propagates.
    #[track_caller]
    pub fn finish<O: Outcome + ?Sized>(mut self, outcome: &O) {
        if let Some(ctx) = self.ctx.take() {
            ctx.deactivate();
            if outcome.is_failure() {
                ctx.capture(outcome.error_id());
                ctx.propagate();
            }
        }
    }
}

impl<C: ErrorContext + ?Sized> Drop for ContextActivator<'_, C> {
    fn drop(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            ctx.deactivate();
            #[cfg(feature = "std")]
            if !self.panicking_at_start && thread_panicking() {
                trace_event!("scope unwinding, propagating");
                ctx.propagate();
            }
        }
    }
}

impl<C: ErrorContext + ?Sized> fmt::Debug for ContextActivator<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextActivator")
            .field("owns_activation", &self.owns_activation())
            .finish_non_exhaustive()
    }
}

/// Shorthand for [`ContextActivator::new`].
#[track_caller]
pub fn activate_context<C: ErrorContext + ?Sized>(ctx: &mut C) -> ContextActivator<'_, C> {
    ContextActivator::new(ctx)
}

/// Runs `f` with `ctx` active and returns its result.
///
/// The context is deactivated but not propagated afterwards, so the caller
/// can inspect what `f` left in it. It is propagated if `f` panics (`std`
/// only).
///
/// # Examples
///
/// ```
/// use errleaf::{Context, Value, new_error, with_context};
///
/// #[derive(Debug, PartialEq)]
/// struct Retry(u8);
///
/// let mut ctx = Context::<(Retry,)>::new();
/// let id = with_context(&mut ctx, || new_error(Value(Retry(2))));
/// assert_eq!(ctx.get::<Retry>(id), Some(&Retry(2)));
/// ```
#[track_caller]
pub fn with_context<C, R>(ctx: &mut C, f: impl FnOnce() -> R) -> R
where
    C: ErrorContext + ?Sized,
{
    let activator = ContextActivator::new(ctx);
    let result = f();
    drop(activator);
    result
}

/// Runs `f` with `ctx` active, then propagates if `f` failed.
///
/// # Examples
///
/// ```
/// use errleaf::{Context, ErrorContext, ErrorId, Value, new_error, with_context_propagating};
///
/// #[derive(Debug, PartialEq)]
/// struct Step(&'static str);
///
/// let mut outer = Context::<(Step,)>::new();
/// let mut inner = Context::<(Step,)>::new();
///
/// let result: Result<(), ErrorId> = errleaf::with_context(&mut outer, || {
///     with_context_propagating(&mut inner, || Err(new_error(Value(Step("parse")))))
/// });
///
/// let id = result.unwrap_err();
/// assert_eq!(inner.captured_id(), id);
/// assert_eq!(outer.get::<Step>(id), Some(&Step("parse")));
/// ```
#[track_caller]
pub fn with_context_propagating<C, R>(ctx: &mut C, f: impl FnOnce() -> R) -> R
where
    C: ErrorContext + ?Sized,
    R: Outcome,
{
    let activator = ContextActivator::new(ctx);
    let result = f();
    activator.finish(&result);
    result
}
