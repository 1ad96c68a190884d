//! Event macros that forward to `tracing` when the `tracing` feature is on
//! and expand to nothing otherwise. Arguments are not evaluated when the
//! feature is off.

macro_rules! trace_event {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!(target: "errleaf", $($arg)+);
    };
}

macro_rules! debug_event {
    ($($arg:tt)+) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!(target: "errleaf", $($arg)+);
    };
}

/// Whether the calling thread is unwinding. Always `false` without `std`.
#[inline]
pub(crate) fn thread_panicking() -> bool {
    #[cfg(feature = "std")]
    {
        std::thread::panicking()
    }
    #[cfg(not(feature = "std"))]
    {
        false
    }
}
