//! Disposable resources.
//!
//! A [`Disposable`] is anything with a single fallible teardown action. The
//! registry never looks inside a disposable; it only calls
//! [`dispose()`](Disposable::dispose) once, when the owning scope unwinds.
//!
//! # Example
//!
//! ```
//! use core::sync::atomic::{AtomicBool, Ordering};
//! use custodian_registry::disposable::{BoxError, Disposable};
//!
//! struct TempTable {
//!     dropped: AtomicBool,
//! }
//!
//! impl Disposable for TempTable {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         self.dropped.store(true, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//! ```

use core::fmt;
use std::borrow::Cow;
use std::sync::Arc;

/// Error type returned by a failed teardown action.
pub type BoxError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A resource that needs an explicit teardown action.
///
/// `dispose` takes `&self` because the registry shares the value with the
/// test through an `Arc`. Implementations that mutate on teardown use
/// interior mutability (atomics, `Mutex`, `Option::take` behind a lock).
///
/// Only the registry should call `dispose`; calling it from test code as
/// well means the resource sees two teardowns.
pub trait Disposable: Send + Sync + 'static {
    /// Tears the resource down.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the teardown. The registry reports it and
    /// moves on to the next resource.
    fn dispose(&self) -> Result<(), BoxError>;

    /// Returns a human-readable label used in diagnostics.
    ///
    /// Defaults to the type name.
    fn describe(&self) -> Cow<'static, str> {
        Cow::Borrowed(core::any::type_name::<Self>())
    }
}

impl<T: Disposable> Disposable for Arc<T> {
    fn dispose(&self) -> Result<(), BoxError> {
        T::dispose(self)
    }

    fn describe(&self) -> Cow<'static, str> {
        T::describe(self)
    }
}

/// A [`Disposable`] backed by a closure.
///
/// Created with [`on_dispose`].
pub struct DisposeFn<F> {
    func: F,
    label: Option<Cow<'static, str>>,
}

impl<F> DisposeFn<F> {
    /// Sets the label reported in diagnostics.
    #[must_use]
    pub fn named(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<F> fmt::Debug for DisposeFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposeFn")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl<F> Disposable for DisposeFn<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    fn dispose(&self) -> Result<(), BoxError> {
        (self.func)()
    }

    fn describe(&self) -> Cow<'static, str> {
        match &self.label {
            Some(label) => label.clone(),
            None => Cow::Borrowed("<closure>"),
        }
    }
}

/// Wraps a teardown closure so it can be registered.
///
/// # Example
///
/// ```
/// use custodian_registry::disposable::{Disposable, on_dispose};
///
/// let cleanup = on_dispose(|| Ok(())).named("stop mock server");
/// assert_eq!(cleanup.describe(), "stop mock server");
/// ```
pub fn on_dispose<F>(func: F) -> DisposeFn<F>
where
    F: Fn() -> Result<(), BoxError> + Send + Sync + 'static,
{
    DisposeFn { func, label: None }
}
