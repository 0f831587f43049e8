//! Teardown failure reporting.
//!
//! Unwinding never fails from the caller's point of view. Each failed
//! teardown becomes a [`TeardownFailure`] that is handed to the registry's
//! [`DiagnosticSink`]. The default sink, [`TracingSink`], logs it.

use core::any::Any;

use parking_lot::Mutex;

use crate::disposable::BoxError;
use crate::registry::Scope;

/// Why a single teardown failed.
#[derive(Debug, thiserror::Error)]
pub enum TeardownError {
    /// The teardown action returned an error.
    #[error("teardown failed: {0}")]
    Failed(#[source] BoxError),

    /// The teardown action panicked.
    #[error("teardown panicked: {0}")]
    Panicked(String),
}

/// A failed teardown, as reported to a [`DiagnosticSink`].
#[derive(Debug, thiserror::Error)]
#[error("failed to dispose {resource} in {scope} scope: {cause}")]
pub struct TeardownFailure {
    /// The scope that was being unwound.
    pub scope: Scope,
    /// The resource's [`describe()`](crate::disposable::Disposable::describe) label.
    pub resource: String,
    /// What went wrong.
    #[source]
    pub cause: TeardownError,
}

/// Receives teardown failures during unwind.
///
/// Sinks are called synchronously from the unwinding thread, once per
/// failure, in unwind order.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Records one failure.
    fn record(&self, failure: TeardownFailure);
}

/// Logs each failure at `ERROR` level through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, failure: TeardownFailure) {
        tracing::error!(
            scope = %failure.scope,
            resource = %failure.resource,
            error = %failure.cause,
            "failed to dispose resource"
        );
    }
}

/// Keeps failures in memory so they can be inspected after unwind.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use custodian_registry::diagnostics::RecordingSink;
/// use custodian_registry::disposable::on_dispose;
/// use custodian_registry::registry::ScopedRegistry;
///
/// let sink = Arc::new(RecordingSink::new());
/// let registry = ScopedRegistry::new().with_sink(sink.clone());
///
/// registry.register_case(on_dispose(|| Err("boom".into())));
/// registry.unwind_case();
///
/// assert_eq!(sink.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct RecordingSink {
    failures: Mutex<Vec<TeardownFailure>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns everything recorded so far.
    pub fn take(&self) -> Vec<TeardownFailure> {
        core::mem::take(&mut *self.failures.lock())
    }

    /// Returns the number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }
}

impl DiagnosticSink for RecordingSink {
    fn record(&self, failure: TeardownFailure) {
        self.failures.lock().push(failure);
    }
}

/// Renders a panic payload as text.
///
/// Handles the `&str` and `String` payloads produced by `panic!`; anything
/// else becomes a placeholder.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}
