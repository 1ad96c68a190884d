//! Recording payloads that nobody was waiting for.
//!
//! A payload is *unexpected* when it is loaded while no slot of its type is
//! active on the thread, or when it propagates out of the outermost active
//! slot of its type. While at least one [`DiagnosticsGuard`] is alive on a
//! thread, unexpected payloads from that thread are recorded in a
//! process-wide record: a total count, the first payload type seen, per-type
//! counts and the `Debug` rendering of the first payload of every type.
//!
//! Payloads whose `Debug` output is empty, such as
//! [`Invisible`](crate::Invisible) ones, are counted but not rendered.
//!
//! Recording is best-effort and never fails.
//!
//! # Examples
//!
//! ```
//! use errleaf::{Value, diagnostics, new_error};
//!
//! #[derive(Debug)]
//! struct Orphan(u8);
//!
//! new_error(Value(Orphan(1)));
//! assert_eq!(diagnostics::count_of::<Orphan>(), 0);
//!
//! let guard = diagnostics::enable();
//! new_error(Value(Orphan(2)));
//! new_error(Value(Orphan(3)));
//! drop(guard);
//!
//! assert_eq!(diagnostics::count_of::<Orphan>(), 2);
//! let summary = diagnostics::summary();
//! assert!(summary.text().contains("Orphan(2)"));
//! assert!(!summary.text().contains("Orphan(3)"));
//! ```

use alloc::{format, string::String, vec::Vec};
use core::{
    any::{TypeId, type_name},
    fmt,
    marker::PhantomData,
};

use errleaf_internals::Registry;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use crate::{Payload, lock::Lock};

static RECORD: Lock<Option<UnexpectedRecord>> = Lock::new(None);

#[derive(Clone, Debug)]
struct TypeEntry {
    type_name: &'static str,
    count: usize,
}

#[derive(Clone, Debug, Default)]
struct UnexpectedRecord {
    count: usize,
    first_type: Option<&'static str>,
    per_type: IndexMap<TypeId, TypeEntry, FxBuildHasher>,
    text: String,
}

impl UnexpectedRecord {
    fn record(&mut self, type_id: TypeId, type_name: &'static str, rendered: Option<String>) {
        self.count += 1;
        self.first_type.get_or_insert(type_name);
        let first_of_type = !self.per_type.contains_key(&type_id);
        self.per_type
            .entry(type_id)
            .or_insert(TypeEntry {
                type_name,
                count: 0,
            })
            .count += 1;
        if first_of_type && let Some(rendered) = rendered.filter(|text| !text.is_empty()) {
            self.text.push_str(type_name);
            self.text.push_str(": ");
            self.text.push_str(&rendered);
            self.text.push('\n');
        }
    }

    fn knows(&self, type_id: TypeId) -> bool {
        self.per_type.contains_key(&type_id)
    }
}

/// Keeps recording of unexpected payloads enabled on the current thread.
///
/// Created by [`enable`]. Guards nest; recording stops once the last guard
/// on the thread is dropped.
#[must_use = "recording is disabled again when the guard is dropped"]
#[derive(Debug)]
pub struct DiagnosticsGuard {
    _not_send: PhantomData<*const ()>,
}

impl Drop for DiagnosticsGuard {
    fn drop(&mut self) {
        Registry::with(Registry::exit_diagnostics);
    }
}

/// Enables recording of unexpected payloads on the current thread until the
/// returned guard is dropped.
pub fn enable() -> DiagnosticsGuard {
    Registry::with(Registry::enter_diagnostics);
    DiagnosticsGuard {
        _not_send: PhantomData,
    }
}

/// Returns `true` while a [`DiagnosticsGuard`] is alive on this thread.
#[must_use]
pub fn is_enabled() -> bool {
    Registry::with(|registry| registry.diagnostics_depth() > 0)
}

/// Records `value` as unexpected if recording is enabled on this thread.
pub(crate) fn capture_unexpected<E: Payload>(value: &E) {
    if !is_enabled() {
        return;
    }
    let type_id = TypeId::of::<E>();
    let seen = RECORD.lock().as_ref().is_some_and(|record| record.knows(type_id));
    // Rendering runs user code and must not hold the lock.
    let rendered = (!seen).then(|| format!("{value:?}"));
    RECORD
        .lock()
        .get_or_insert_with(UnexpectedRecord::default)
        .record(type_id, type_name::<E>(), rendered);
}

/// How many unexpected payloads of type `E` were recorded since the last
/// [`reset`].
#[must_use]
pub fn count_of<E: Payload>() -> usize {
    RECORD
        .lock()
        .as_ref()
        .and_then(|record| record.per_type.get(&TypeId::of::<E>()))
        .map_or(0, |entry| entry.count)
}

/// Snapshot of everything recorded since the last [`reset`].
#[must_use]
pub fn summary() -> UnexpectedSummary {
    let record = RECORD.lock().as_ref().cloned().unwrap_or_default();
    UnexpectedSummary {
        count: record.count,
        first_type: record.first_type,
        per_type: record
            .per_type
            .into_values()
            .map(|entry| (entry.type_name, entry.count))
            .collect(),
        text: record.text,
    }
}

/// Discards everything recorded so far.
pub fn reset() {
    let previous = RECORD.lock().take();
    drop(previous);
}

/// A snapshot of the unexpected payloads recorded process-wide.
///
/// The `Display` output reads like:
///
/// ```text
/// Detected 2 attempts to communicate unexpected error objects, the first one of type my_crate::Orphan
/// Unexpected error objects:
/// my_crate::Orphan: Orphan(1)
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnexpectedSummary {
    count: usize,
    first_type: Option<&'static str>,
    per_type: Vec<(&'static str, usize)>,
    text: String,
}

impl UnexpectedSummary {
    /// Total number of unexpected payloads.
    #[must_use]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Type name of the first unexpected payload.
    #[must_use]
    pub fn first_type(&self) -> Option<&'static str> {
        self.first_type
    }

    /// Type names with their counts, in order of first occurrence.
    pub fn types(&self) -> impl Iterator<Item = (&'static str, usize)> + '_ {
        self.per_type.iter().copied()
    }

    /// One `type: value` line for the first payload of every visible type.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns `true` when nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl fmt::Display for UnexpectedSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.first_type.unwrap_or("?");
        match self.count {
            0 => return f.write_str("No unexpected error objects detected"),
            1 => write!(
                f,
                "Detected 1 attempt to communicate an unexpected error object of type {first}"
            )?,
            n => write!(
                f,
                "Detected {n} attempts to communicate unexpected error objects, the first one of type {first}"
            )?,
        }
        write!(f, "\nUnexpected error objects:\n{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;
    use crate::{Invisible, Slot, Value, new_error};

    #[test]
    fn test_guard_not_send() {
        static_assertions::assert_not_impl_any!(DiagnosticsGuard: Send, Sync);
    }

    #[test]
    fn test_guards_nest() {
        assert!(!is_enabled());
        let outer = enable();
        let inner = enable();
        assert!(is_enabled());
        drop(inner);
        assert!(is_enabled());
        drop(outer);
        assert!(!is_enabled());
    }

    #[test]
    fn test_nothing_recorded_while_disabled() {
        #[derive(Debug)]
        struct Quiet;
        new_error(Value(Quiet));
        assert_eq!(count_of::<Quiet>(), 0);
    }

    #[test]
    fn test_first_occurrence_is_rendered() {
        #[derive(Debug)]
        struct Lost(u32);

        let _guard = enable();
        new_error(Value(Lost(1)));
        new_error(Value(Lost(2)));
        assert_eq!(count_of::<Lost>(), 2);

        let text = summary().text().to_string();
        assert!(text.contains("Lost(1)"));
        assert!(!text.contains("Lost(2)"));
    }

    #[test]
    fn test_invisible_payloads_are_counted_only() {
        #[derive(Debug)]
        struct Secret;

        let _guard = enable();
        new_error(Value(Invisible(Secret)));
        assert_eq!(count_of::<Invisible<Secret>>(), 1);
        assert!(!summary().text().contains("Secret"));
    }

    #[test]
    fn test_outermost_propagation_is_recorded() {
        #[derive(Debug, PartialEq)]
        struct Escaped(u8);

        let _guard = enable();
        let mut slot = Slot::<Escaped>::new();
        slot.activate();
        let id = new_error(Value(Escaped(7)));
        slot.deactivate();
        assert_eq!(count_of::<Escaped>(), 0);

        slot.propagate();
        assert_eq!(count_of::<Escaped>(), 1);
        assert_eq!(slot.has_value(id), Some(&Escaped(7)));
    }

    #[test]
    fn test_record_bookkeeping() {
        let mut record = UnexpectedRecord::default();
        record.record(TypeId::of::<u8>(), "u8", Some("1".to_string()));
        record.record(TypeId::of::<u16>(), "u16", Some(String::new()));
        record.record(TypeId::of::<u8>(), "u8", None);

        assert_eq!(record.count, 3);
        assert_eq!(record.first_type, Some("u8"));
        assert_eq!(record.text, "u8: 1\n");
        assert_eq!(record.per_type[&TypeId::of::<u8>()].count, 2);
    }

    #[test]
    fn test_summary_display() {
        let summary = UnexpectedSummary {
            count: 2,
            first_type: Some("app::Orphan"),
            per_type: alloc::vec![("app::Orphan", 2)],
            text: "app::Orphan: Orphan(1)\n".to_string(),
        };
        assert_eq!(
            format!("{summary}"),
            "Detected 2 attempts to communicate unexpected error objects, the first one of type \
             app::Orphan\nUnexpected error objects:\napp::Orphan: Orphan(1)\n"
        );

        let single = UnexpectedSummary {
            count: 1,
            ..summary
        };
        assert!(format!("{single}").starts_with(
            "Detected 1 attempt to communicate an unexpected error object of type app::Orphan\n"
        ));
        assert_eq!(
            UnexpectedSummary::default().to_string(),
            "No unexpected error objects detected"
        );
    }
}
