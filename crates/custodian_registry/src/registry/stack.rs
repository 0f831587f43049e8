//! Concurrent LIFO storage for one scope.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposable::Disposable;

/// Type-erased registered resource.
pub(crate) type BoxedDisposable = Arc<dyn Disposable>;

/// A thread-safe stack of disposables.
///
/// Both operations are atomic with respect to each other: the lock is held
/// only for the duration of a single push or pop, never while a resource is
/// being disposed.
pub(crate) struct DisposableStack {
    entries: Mutex<VecDeque<BoxedDisposable>>,
}

impl DisposableStack {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Pushes a resource to the head, making it the next to be popped.
    pub(crate) fn push(&self, resource: BoxedDisposable) {
        self.entries.lock().push_front(resource);
    }

    /// Pops the most recently pushed resource.
    pub(crate) fn pop(&self) -> Option<BoxedDisposable> {
        self.entries.lock().pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
