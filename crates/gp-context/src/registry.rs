//! Opaque handle registry
//!
//! Hands out non-zero integer handles for values that live across an FFI
//! boundary. Handles are never reused within one registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// Key naming a registered value
pub type Handle = u64;

/// Map from handles to shared, individually locked values
pub struct HandleRegistry<T> {
    entries: HashMap<Handle, Arc<Mutex<T>>>,
    next_handle: Handle,
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_handle: 1,
        }
    }

    /// Register `value`, returning its new handle
    pub fn insert(&mut self, value: T) -> Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.entries.insert(handle, Arc::new(Mutex::new(value)));
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        self.entries.get(&handle).cloned()
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Unregister `handle`. The value drops once the last outstanding clone does.
    pub fn remove(&mut self, handle: Handle) -> Option<Arc<Mutex<T>>> {
        self.entries.remove(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_start_at_one() {
        let mut registry = HandleRegistry::new();
        assert_eq!(registry.insert("a"), 1);
        assert_eq!(registry.insert("b"), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_handles_not_reused() {
        let mut registry = HandleRegistry::new();
        let first = registry.insert(10);
        assert!(registry.remove(first).is_some());
        let second = registry.insert(20);
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert_eq!(*registry.get(second).unwrap().lock(), 20);
    }

    #[test]
    fn test_remove_unknown() {
        let mut registry: HandleRegistry<u32> = HandleRegistry::new();
        assert!(registry.remove(0).is_none());
        assert!(registry.remove(42).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_value_outlives_removal_while_borrowed() {
        let mut registry = HandleRegistry::new();
        let handle = registry.insert(String::from("ctx"));
        let held = registry.get(handle).unwrap();
        registry.remove(handle);
        assert!(!registry.contains(handle));
        assert_eq!(held.lock().as_str(), "ctx");
    }
}
