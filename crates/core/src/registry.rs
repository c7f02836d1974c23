//! Handle registry: small opaque tokens mapped to live objects.
//!
//! Handles are allocated from a monotonic `u64` counter and are never
//! reused, so a stale handle held by a foreign caller can only ever resolve
//! to "not found". `0` is reserved as the null handle.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Opaque token identifying one registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    pub const NULL: Handle = Handle(0);

    pub const fn from_raw(raw: u64) -> Self {
        Handle(raw)
    }

    pub const fn into_raw(self) -> u64 {
        self.0
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Slots<T> {
    next: u64,
    entries: HashMap<Handle, T>,
}

/// Internally synchronized table of live entries.
///
/// `T` is expected to be cheap to clone (an enum of `Arc`s): [`get`](Self::get)
/// hands out a clone so the lock is never held while the caller works.
pub struct Registry<T> {
    slots: Mutex<Slots<T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                next: 1,
                entries: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Stores `value` under a fresh handle distinct from every handle ever issued.
    pub fn add(&self, value: T) -> Handle {
        let mut slots = self.lock();
        let handle = Handle(slots.next);
        // 2^64 allocations never happen in a process lifetime.
        slots.next += 1;
        slots.entries.insert(handle, value);
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<T> {
        if handle.is_null() {
            return None;
        }
        self.lock().entries.get(&handle).cloned()
    }

    /// Removes and returns the entry.
    pub fn remove(&self, handle: Handle) -> Option<T> {
        self.lock().entries.remove(&handle)
    }

    /// Removes the entry only if `predicate` accepts it.
    pub fn remove_if(&self, handle: Handle, predicate: impl FnOnce(&T) -> bool) -> Option<T> {
        let mut slots = self.lock();
        if !slots.entries.get(&handle).is_some_and(predicate) {
            return None;
        }
        slots.entries.remove(&handle)
    }

    /// Idempotent removal; unknown handles are a no-op.
    pub fn delete(&self, handle: Handle) {
        drop(self.remove(handle));
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn add_then_get_returns_value() {
        let registry = Registry::new();
        let h = registry.add("project");
        assert!(!h.is_null());
        assert_eq!(registry.get(h), Some("project"));
    }

    #[test]
    fn delete_then_get_reports_not_found() {
        let registry = Registry::new();
        let h = registry.add(7u32);
        registry.delete(h);
        assert_eq!(registry.get(h), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn delete_is_idempotent() {
        let registry: Registry<u32> = Registry::new();
        let h = registry.add(1);
        registry.delete(h);
        registry.delete(h);
        registry.delete(Handle::from_raw(9999));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn null_and_unknown_handles_resolve_to_nothing() {
        let registry = Registry::new();
        registry.add(1u8);
        assert_eq!(registry.get(Handle::NULL), None);
        assert_eq!(registry.get(Handle::from_raw(42)), None);
    }

    #[test]
    fn handles_are_never_reused() {
        let registry = Registry::new();
        let first = registry.add(1u8);
        registry.delete(first);
        let second = registry.add(2u8);
        assert_ne!(first, second);
        assert_eq!(registry.get(first), None);
        assert_eq!(registry.get(second), Some(2));
    }

    #[test]
    fn remove_if_respects_predicate() {
        let registry = Registry::new();
        let h = registry.add(10i32);
        assert_eq!(registry.remove_if(h, |v| *v < 0), None);
        assert_eq!(registry.get(h), Some(10));
        assert_eq!(registry.remove_if(h, |v| *v > 0), Some(10));
        assert_eq!(registry.get(h), None);
    }

    #[test]
    fn concurrent_adds_yield_distinct_handles() {
        let registry = Arc::new(Registry::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    (0..500)
                        .map(|i| registry.add(t * 1000 + i))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all = Vec::new();
        for t in threads {
            all.extend(t.join().unwrap());
        }
        let count = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), count);
        assert_eq!(registry.len(), count);
    }
}
