//! Callback List Module
//!
//! Ordered hook registrations with replace-all and append-one semantics.

use std::fmt;
use std::sync::Arc;

// == Callback List ==
/// An ordered sequence of shared callbacks.
///
/// The list itself is not synchronized; owners keep it behind their own lock
/// and take a [`snapshot`](CallbackList::snapshot) before invoking anything,
/// so callbacks never run while that lock is held.
pub struct CallbackList<F: ?Sized> {
    callbacks: Vec<Arc<F>>,
}

impl<F: ?Sized> CallbackList<F> {
    // == Constructor ==
    /// Creates an empty callback list.
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    // == Set ==
    /// Discards every registered callback and installs `callback` as the only one.
    pub fn set(&mut self, callback: Arc<F>) {
        self.callbacks.clear();
        self.callbacks.push(callback);
    }

    // == Add ==
    /// Appends `callback` after the already registered ones.
    pub fn add(&mut self, callback: Arc<F>) {
        self.callbacks.push(callback);
    }

    // == Clear ==
    /// Removes every registered callback.
    pub fn clear(&mut self) {
        self.callbacks.clear();
    }

    // == Snapshot ==
    /// Returns the registered callbacks in registration order.
    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.callbacks.clone()
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Returns true if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }
}

impl<F: ?Sized> Default for CallbackList<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: ?Sized> fmt::Debug for CallbackList<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackList")
            .field("len", &self.callbacks.len())
            .finish()
    }
}
