use core::ops::{Deref, DerefMut};

#[cfg(feature = "std")]
use std::sync as impl_;

#[cfg(not(feature = "std"))]
use spin as impl_;

/// Mutex used for process-wide diagnostic state and shared contexts.
///
/// Backed by `std::sync::Mutex` with `std` and by `spin::Mutex` otherwise.
/// Poisoning is ignored: everything guarded by it stays consistent across a
/// panic in user code.
#[repr(transparent)]
pub(crate) struct Lock<T: ?Sized>(impl_::Mutex<T>);

#[repr(transparent)]
pub(crate) struct LockGuard<'a, T: ?Sized>(impl_::MutexGuard<'a, T>);

impl<T> Lock<T> {
    #[must_use]
    pub(crate) const fn new(value: T) -> Self {
        Self(impl_::Mutex::new(value))
    }
}

impl<T: ?Sized> Lock<T> {
    #[inline]
    pub(crate) fn lock(&self) -> LockGuard<'_, T> {
        #[cfg(not(feature = "std"))]
        let guard = self.0.lock();

        #[cfg(feature = "std")]
        let guard = self.0.lock().unwrap_or_else(impl_::PoisonError::into_inner);

        LockGuard(guard)
    }
}

impl<T: ?Sized> Deref for LockGuard<'_, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> DerefMut for LockGuard<'_, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}
