use core::fmt;

use triomphe::Arc;
use unsize::CoerceUnsize;

use crate::{ErrorId, context::ErrorContext, lock::Lock};

/// [`ErrorContext`] through a shared reference, for contexts behind a lock.
pub(crate) trait LockedContext: Send + Sync + 'static {
    fn activate(&self);
    fn deactivate(&self);
    fn propagate(&self);
    fn is_active(&self) -> bool;
    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
    fn captured_id(&self) -> ErrorId;
    fn capture(&self, id: ErrorId);
    fn propagate_captured_errors(&self) -> ErrorId;
}

impl<C: ErrorContext + Send + 'static> LockedContext for Lock<C> {
    fn activate(&self) {
        self.lock().activate();
    }

    fn deactivate(&self) {
        self.lock().deactivate();
    }

    fn propagate(&self) {
        self.lock().propagate();
    }

    fn is_active(&self) -> bool {
        self.lock().is_active()
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.lock().print(f)
    }

    fn captured_id(&self) -> ErrorId {
        self.lock().captured_id()
    }

    fn capture(&self, id: ErrorId) {
        self.lock().capture(id);
    }

    fn propagate_captured_errors(&self) -> ErrorId {
        self.lock().propagate_captured_errors()
    }
}

/// A reference-counted, lock-protected context.
///
/// Clones share one context. This is how errors captured on one thread (or
/// in one task) are handed to another: the worker activates its clone while
/// it runs and records the failing identifier with
/// [`capture`](ErrorContext::capture); the receiver later calls
/// [`propagate_captured_errors`](ErrorContext::propagate_captured_errors)
/// inside its own active contexts.
///
/// The context must not be active on two threads at once.
///
/// # Examples
///
/// ```
/// use errleaf::{
///     Context, ErrorContext, Value, make_shared_context, new_error, with_context,
///     with_context_propagating,
/// };
///
/// #[derive(Debug, PartialEq)]
/// struct Job(u32);
///
/// let shared = make_shared_context(Context::<(Job,)>::new());
/// let mut worker = shared.clone();
/// std::thread::spawn(move || {
///     let id = with_context(&mut worker, || new_error(Value(Job(12))));
///     worker.capture(id);
/// })
/// .join()
/// .unwrap();
///
/// let mut receiver = Context::<(Job,)>::new();
/// let mut shared = shared;
/// let id = with_context(&mut receiver, || shared.propagate_captured_errors());
/// assert_eq!(receiver.get::<Job>(id), Some(&Job(12)));
/// ```
#[derive(Clone)]
pub struct ContextPtr(Arc<dyn LockedContext>);

/// Moves `ctx` behind a shared, lock-protected pointer.
pub fn make_shared_context<C>(ctx: C) -> ContextPtr
where
    C: ErrorContext + Send + 'static,
{
    let shared: Arc<Lock<C>> = Arc::new(Lock::new(ctx));
    ContextPtr(shared.unsize(unsize::Coercion!(to dyn LockedContext)))
}

impl ContextPtr {
    /// Returns `true` if both pointers share one context.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl ErrorContext for ContextPtr {
    fn activate(&mut self) {
        self.0.activate();
    }

    fn deactivate(&mut self) {
        self.0.deactivate();
    }

    fn propagate(&mut self) {
        self.0.propagate();
    }

    fn is_active(&self) -> bool {
        self.0.is_active()
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.print(f)
    }

    fn captured_id(&self) -> ErrorId {
        self.0.captured_id()
    }

    fn capture(&mut self, id: ErrorId) {
        self.0.capture(id);
    }

    fn propagate_captured_errors(&mut self) -> ErrorId {
        self.0.propagate_captured_errors()
    }
}

impl fmt::Display for ContextPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.print(f)
    }
}

impl fmt::Debug for ContextPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPtr")
            .field("active", &self.0.is_active())
            .field("captured", &self.0.captured_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;

    use super::*;
    use crate::{Context, Value, new_error, with_context};

    #[derive(Debug, PartialEq)]
    struct Host(&'static str);

    #[test]
    fn test_context_ptr_send_sync() {
        static_assertions::assert_impl_all!(ContextPtr: Clone, Send, Sync);
    }

    #[test]
    fn test_clones_share_state() {
        let mut first = make_shared_context(Context::<(Host,)>::new());
        let second = first.clone();
        assert!(first.ptr_eq(&second));

        let id = with_context(&mut first, || {
            assert!(second.is_active());
            new_error(Value(Host("a")))
        });
        first.capture(id);

        assert!(!second.is_active());
        assert_eq!(second.captured_id(), id);
        assert!(format!("{second}").contains("Host(\"a\")"));
    }

    #[test]
    #[cfg(feature = "std")]
    fn test_errors_cross_threads() {
        let shared = make_shared_context(Context::<(Host,)>::new());
        let mut worker = shared.clone();
        let sent = std::thread::spawn(move || {
            let id = with_context(&mut worker, || new_error(Value(Host("remote"))));
            worker.capture(id);
            id
        })
        .join()
        .unwrap();

        let mut receiver = Context::<(Host,)>::new();
        let mut shared = shared;
        let received = with_context(&mut receiver, || shared.propagate_captured_errors());
        assert_eq!(received, sent);
        assert_eq!(receiver.get::<Host>(received), Some(&Host("remote")));
    }
}
