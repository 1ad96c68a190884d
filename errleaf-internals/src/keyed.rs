//! Keyed optional storage.
//!
//! A [`Keyed`] holds at most one payload together with the raw error
//! identifier it was stored under. Lookups always name the identifier they
//! expect, so a payload left over from an earlier error is never mistaken for
//! one belonging to the current error.

use core::mem;

/// An optional payload tagged with the error identifier it was stored under.
///
/// The key `0` is reserved for "no error" and never stored.
#[derive(Debug)]
pub struct Keyed<E> {
    /// Identifier the payload was stored under, `0` when empty.
    key: u32,
    /// The payload itself.
    value: Option<E>,
}

impl<E> Default for Keyed<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Keyed<E> {
    /// Creates an empty container.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            key: 0,
            value: None,
        }
    }

    /// Returns the identifier of the stored payload, or `0` when empty.
    #[inline]
    pub fn key(&self) -> u32 {
        if self.value.is_some() { self.key } else { 0 }
    }

    /// Returns `true` when no payload is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Stores `value` under `key`, overwriting whatever was stored before.
    ///
    /// Returns a reference to the stored payload and the displaced payload,
    /// if any. The displaced value is handed back rather than dropped here so
    /// that its destructor can run outside of the registry.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `0`.
    pub fn put(&mut self, key: u32, value: E) -> (&mut E, Option<E>) {
        assert_ne!(key, 0, "payloads cannot be stored under the zero identifier");
        let displaced = self.value.take();
        self.key = key;
        (self.value.insert(value), displaced)
    }

    /// Returns the payload if one is stored under `key`.
    #[inline]
    pub fn has_value(&self, key: u32) -> Option<&E> {
        match &self.value {
            Some(value) if self.key == key => Some(value),
            _ => None,
        }
    }

    /// Returns the payload mutably if one is stored under `key`.
    #[inline]
    pub fn has_value_mut(&mut self, key: u32) -> Option<&mut E> {
        match &mut self.value {
            Some(value) if self.key == key => Some(value),
            _ => None,
        }
    }

    /// Returns the payload stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics if no payload is stored under `key`.
    #[track_caller]
    pub fn value(&self, key: u32) -> &E {
        match self.has_value(key) {
            Some(value) => value,
            None => panic!("no payload stored under error identifier {key}"),
        }
    }

    /// Moves the payload out together with its identifier, leaving the
    /// container empty.
    pub fn take(&mut self) -> Option<(u32, E)> {
        let value = self.value.take()?;
        Some((mem::replace(&mut self.key, 0), value))
    }

    /// Moves the payload out if it is stored under `key`.
    pub fn take_key(&mut self, key: u32) -> Option<E> {
        if self.key == key && self.value.is_some() {
            self.take().map(|(_, value)| value)
        } else {
            None
        }
    }
}
