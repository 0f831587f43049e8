//! Scoped resource registry.
//!
//! [`ScopedRegistry`] owns two independent stacks of disposables:
//!
//! | Scope | Registered via | Unwound by | Lifetime |
//! |-------|----------------|------------|----------|
//! | [`Scope::Case`] | [`register_case()`](ScopedRegistry::register_case) | [`unwind_case()`](ScopedRegistry::unwind_case) | One test case |
//! | [`Scope::Group`] | [`register_group()`](ScopedRegistry::register_group) | [`unwind_group()`](ScopedRegistry::unwind_group) | All cases in a group |
//!
//! # Unwind
//!
//! Unwinding pops resources one at a time, newest first, and disposes each
//! with no lock held. A teardown that returns an error or panics is reported
//! to the registry's [`DiagnosticSink`] and the loop carries on. Unwind
//! itself never fails, and the stack is empty when it returns.
//!
//! ```text
//! register_case(A)   case: [A]
//! register_case(B)   case: [B, A]
//! register_group(C)  group: [C]
//! unwind_case()      dispose B, dispose A   case: []
//! unwind_group()     dispose C              group: []
//! ```

mod stack;

use core::fmt;
use core::panic::AssertUnwindSafe;
use std::panic;
use std::sync::Arc;

use crate::diagnostics::{
    DiagnosticSink, TeardownError, TeardownFailure, TracingSink, panic_message,
};
use crate::disposable::Disposable;

use stack::{BoxedDisposable, DisposableStack};

/// Upper bound on drain passes made by one [`ScopedRegistry::unwind`] call.
pub const MAX_UNWIND_PASSES: usize = 16;

/// Which lifetime a resource is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Torn down at the end of the current test case.
    Case,
    /// Torn down once every case in the group has finished.
    Group,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Case => write!(f, "case"),
            Self::Group => write!(f, "group"),
        }
    }
}

/// Owns registered resources until their scope is unwound.
///
/// The registry is a plain value: create one per test group and hand it (or a
/// handle to it) to each case. Registration is safe from any thread. Unwind
/// is expected to be driven by one thread at a time, but tolerates
/// registrations racing with it.
///
/// # Example
///
/// ```
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use custodian_registry::disposable::{BoxError, Disposable};
/// use custodian_registry::registry::ScopedRegistry;
///
/// struct Server {
///     stopped: AtomicBool,
/// }
///
/// impl Disposable for Server {
///     fn dispose(&self) -> Result<(), BoxError> {
///         self.stopped.store(true, Ordering::SeqCst);
///         Ok(())
///     }
/// }
///
/// let registry = ScopedRegistry::new();
/// let server = registry.register_case(Server { stopped: AtomicBool::new(false) });
///
/// // ... use `server` in the test ...
///
/// registry.unwind_case();
/// assert!(server.stopped.load(Ordering::SeqCst));
/// ```
pub struct ScopedRegistry {
    case: DisposableStack,
    group: DisposableStack,
    sink: Arc<dyn DiagnosticSink>,
}

impl Default for ScopedRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ScopedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedRegistry")
            .field("case", &self.case.len())
            .field("group", &self.group.len())
            .finish_non_exhaustive()
    }
}

impl ScopedRegistry {
    /// Creates an empty registry that logs teardown failures via `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            case: DisposableStack::new(),
            group: DisposableStack::new(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Replaces the sink that receives teardown failures.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    // ─────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────

    /// Registers a resource that lives until the end of the current case.
    ///
    /// Returns a shared handle for use inside the test. The registry is the
    /// only party that disposes the resource.
    pub fn register_case<T: Disposable>(&self, resource: T) -> Arc<T> {
        self.register(Scope::Case, resource)
    }

    /// Registers a resource that lives until the end of the group.
    pub fn register_group<T: Disposable>(&self, resource: T) -> Arc<T> {
        self.register(Scope::Group, resource)
    }

    /// Registers a resource into the given scope.
    pub fn register<T: Disposable>(&self, scope: Scope, resource: T) -> Arc<T> {
        self.register_shared(scope, Arc::new(resource))
    }

    /// Registers a resource that is already behind an `Arc`.
    pub fn register_shared<T: Disposable>(&self, scope: Scope, resource: Arc<T>) -> Arc<T> {
        let entry: BoxedDisposable = resource.clone();
        self.stack(scope).push(entry);
        tracing::trace!(%scope, resource = %resource.describe(), "registered resource");
        resource
    }

    // ─────────────────────────────────────────────────────────────────────
    // Unwind
    // ─────────────────────────────────────────────────────────────────────

    /// Disposes every case-scoped resource, newest first.
    pub fn unwind_case(&self) {
        self.unwind(Scope::Case);
    }

    /// Disposes every group-scoped resource, newest first.
    pub fn unwind_group(&self) {
        self.unwind(Scope::Group);
    }

    /// Disposes every resource in `scope`, newest first.
    ///
    /// Failures are sent to the sink and never stop the loop. Resources
    /// registered into `scope` while the unwind is running are disposed by
    /// the same call, in a further pass over the stack.
    ///
    /// At most [`MAX_UNWIND_PASSES`] passes are made. If teardowns keep
    /// registering new resources into the scope being unwound, whatever is
    /// left after the last pass stays registered for the next unwind and a
    /// warning is logged.
    pub fn unwind(&self, scope: Scope) {
        let stack = self.stack(scope);
        let mut disposed = 0_usize;
        let mut failed = 0_usize;

        for _ in 0..MAX_UNWIND_PASSES {
            let pending = stack.len();
            if pending == 0 {
                break;
            }
            for _ in 0..pending {
                let Some(resource) = stack.pop() else {
                    break;
                };
                match dispose_isolated(resource.as_ref()) {
                    Ok(()) => disposed += 1,
                    Err(cause) => {
                        failed += 1;
                        self.sink.record(TeardownFailure {
                            scope,
                            resource: resource.describe().into_owned(),
                            cause,
                        });
                    }
                }
            }
        }

        let remaining = stack.len();
        if remaining > 0 {
            tracing::warn!(
                %scope,
                remaining,
                passes = MAX_UNWIND_PASSES,
                "teardowns kept registering resources, leaving them for the next unwind"
            );
        }

        if disposed + failed > 0 {
            tracing::debug!(%scope, disposed, failed, "unwound scope");
        }
    }

    /// Disposes a resource immediately, without registering it.
    ///
    /// Uses the same isolation as [`unwind()`](Self::unwind): a failure is
    /// reported to the sink as belonging to `scope` and is not returned.
    pub fn dispose_now(&self, scope: Scope, resource: &dyn Disposable) {
        if let Err(cause) = dispose_isolated(resource) {
            self.sink.record(TeardownFailure {
                scope,
                resource: resource.describe().into_owned(),
                cause,
            });
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────

    /// Returns the number of live resources in `scope`.
    #[must_use]
    pub fn len(&self, scope: Scope) -> usize {
        self.stack(scope).len()
    }

    /// Returns `true` if `scope` holds no resources.
    #[must_use]
    pub fn is_empty(&self, scope: Scope) -> bool {
        self.stack(scope).is_empty()
    }

    fn stack(&self, scope: Scope) -> &DisposableStack {
        match scope {
            Scope::Case => &self.case,
            Scope::Group => &self.group,
        }
    }
}

impl Drop for ScopedRegistry {
    fn drop(&mut self) {
        for scope in [Scope::Case, Scope::Group] {
            let pending = self.len(scope);
            if pending > 0 {
                tracing::warn!(%scope, pending, "registry dropped with live resources, unwinding");
                self.unwind(scope);
            }
        }
    }
}

/// Runs one teardown, turning errors and panics into a [`TeardownError`].
fn dispose_isolated(resource: &dyn Disposable) -> Result<(), TeardownError> {
    match panic::catch_unwind(AssertUnwindSafe(|| resource.dispose())) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(TeardownError::Failed(source)),
        Err(payload) => Err(TeardownError::Panicked(panic_message(payload.as_ref()))),
    }
}
