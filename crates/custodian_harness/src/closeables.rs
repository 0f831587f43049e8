//! Automatic teardown of resources registered by test cases.
//!
//! [`ClosingExtension`] owns one [`ScopedRegistry`] for the group. Every
//! case that asks for a [`Closeables`] parameter receives a handle bound to
//! that case; resources added through it are disposed when the case ends
//! (`add_per_case`) or when the whole group ends (`add_per_group`).
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use custodian_harness::prelude::*;
//!
//! struct Socket {
//!     open: AtomicBool,
//! }
//!
//! impl Disposable for Socket {
//!     fn dispose(&self) -> Result<(), BoxError> {
//!         self.open.store(false, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! fn uses_socket(closeables: Closeables) -> Result<(), RegistrationError> {
//!     let socket = closeables.add_per_case(Socket { open: AtomicBool::new(true) })?;
//!     assert!(socket.open.load(Ordering::SeqCst));
//!     Ok(())
//! }
//!
//! let mut group = TestGroup::new("sockets");
//! group.add_extension(ClosingExtension::new());
//! group.add_case("uses_socket", uses_socket);
//! assert!(group.run().passed());
//! ```

use core::fmt;
use std::sync::Arc;

use custodian_registry::diagnostics::DiagnosticSink;
use custodian_registry::disposable::Disposable;
use custodian_registry::registry::{Scope, ScopedRegistry};
use parking_lot::RwLock;

use crate::case::CaseOutcome;
use crate::context::{CaseContext, CaseInfo, GroupInfo};
use crate::extension::Extension;
use crate::param::{CaseParam, ResolveError};

/// Errors returned when a registration is refused.
///
/// A refused resource is disposed immediately, so it never leaks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// The handle belongs to a case that has already finished.
    #[error("case '{case}' has already ended")]
    CaseEnded {
        /// Name of the finished case.
        case: String,
    },

    /// The group this handle belongs to has already been unwound.
    #[error("group '{group}' has already ended")]
    GroupEnded {
        /// Name of the finished group.
        group: String,
    },
}

/// Monotonic counters, bumped when a scope ends.
#[derive(Debug, Default, Clone, Copy)]
struct Epochs {
    case: u64,
    group: u64,
}

/// State shared between the extension and every handle it gives out.
struct Shared {
    registry: ScopedRegistry,
    epochs: RwLock<Epochs>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Closeables
// ─────────────────────────────────────────────────────────────────────────────

/// Registration handle injected into cases.
///
/// Cloning the handle is cheap; clones stay bound to the same case. Once that
/// case has ended, `add_per_case` is refused. Once the group has ended,
/// `add_per_group` is refused.
#[derive(Clone)]
pub struct Closeables {
    shared: Arc<Shared>,
    case: CaseInfo,
    epochs: Epochs,
}

impl fmt::Debug for Closeables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closeables")
            .field("case", &self.case.name)
            .field("registry", &self.shared.registry)
            .finish()
    }
}

impl Closeables {
    /// Adds a resource that will be disposed when the current case finishes.
    ///
    /// Returns a shared handle to the resource. Do not dispose it yourself.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::CaseEnded`] if the case this handle was
    /// created for has finished. The resource is disposed before returning.
    pub fn add_per_case<T: Disposable>(&self, resource: T) -> Result<Arc<T>, RegistrationError> {
        let epochs = self.shared.epochs.read();
        if epochs.case != self.epochs.case {
            drop(epochs);
            self.shared.registry.dispose_now(Scope::Case, &resource);
            return Err(RegistrationError::CaseEnded {
                case: self.case.name.clone(),
            });
        }
        Ok(self.shared.registry.register_case(resource))
    }

    /// Adds a resource that will be disposed when every case in the group
    /// has finished.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::GroupEnded`] if the group has already
    /// been unwound. The resource is disposed before returning.
    pub fn add_per_group<T: Disposable>(&self, resource: T) -> Result<Arc<T>, RegistrationError> {
        let epochs = self.shared.epochs.read();
        if epochs.group != self.epochs.group {
            drop(epochs);
            self.shared.registry.dispose_now(Scope::Group, &resource);
            return Err(RegistrationError::GroupEnded {
                group: self.case.group.clone(),
            });
        }
        Ok(self.shared.registry.register_group(resource))
    }

    /// Returns the case this handle is bound to.
    #[must_use]
    pub fn case(&self) -> &CaseInfo {
        &self.case
    }
}

impl CaseParam for Closeables {
    fn fetch(ctx: &CaseContext<'_>) -> Result<Self, ResolveError> {
        ctx.get::<Closeables>()
            .map(|handle| (*handle).clone())
            .ok_or_else(ResolveError::unrecognized::<Closeables>)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClosingExtension
// ─────────────────────────────────────────────────────────────────────────────

/// Extension that tears down registered resources at the end of each case
/// and at the end of the group.
///
/// # Capabilities Provided
///
/// | Capability | Scope | Description |
/// |------------|-------|-------------|
/// | [`Closeables`] | Case | Registration handle bound to the running case |
pub struct ClosingExtension {
    shared: Arc<Shared>,
}

impl Default for ClosingExtension {
    fn default() -> Self {
        Self::new()
    }
}

impl ClosingExtension {
    /// Creates an extension with a fresh registry that logs teardown
    /// failures through `tracing`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_registry(ScopedRegistry::new())
    }

    /// Creates an extension whose teardown failures go to `sink`.
    #[must_use]
    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self::from_registry(ScopedRegistry::new().with_sink(sink))
    }

    /// Creates an extension around an existing registry.
    #[must_use]
    pub fn from_registry(registry: ScopedRegistry) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry,
                epochs: RwLock::new(Epochs::default()),
            }),
        }
    }

    /// Returns the registry owned by this extension.
    #[must_use]
    pub fn registry(&self) -> &ScopedRegistry {
        &self.shared.registry
    }
}

impl Extension for ClosingExtension {
    fn prepare_case(&self, ctx: &mut CaseContext<'_>) {
        let handle = Closeables {
            shared: Arc::clone(&self.shared),
            case: ctx.info().clone(),
            epochs: *self.shared.epochs.read(),
        };
        ctx.insert(handle);
    }

    fn after_each(&self, case: &CaseInfo, _outcome: &CaseOutcome) {
        self.shared.epochs.write().case += 1;
        tracing::debug!(
            case = %case.name,
            resources = self.shared.registry.len(Scope::Case),
            "unwinding case resources"
        );
        self.shared.registry.unwind_case();
    }

    fn after_all(&self, group: &GroupInfo) {
        self.shared.epochs.write().group += 1;
        tracing::debug!(
            group = %group.name,
            resources = self.shared.registry.len(Scope::Group),
            "unwinding group resources"
        );
        self.shared.registry.unwind_group();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use custodian_registry::diagnostics::RecordingSink;
    use std::sync::Barrier;
    use std::thread;
    use custodian_registry::disposable::on_dispose;

    fn case(index: usize) -> CaseInfo {
        CaseInfo {
            group: "group".to_string(),
            name: format!("case{index}"),
            index,
        }
    }

    fn group() -> GroupInfo {
        GroupInfo {
            name: "group".to_string(),
            cases: 1,
        }
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl Disposable + use<> {
        let counter = Arc::clone(counter);
        on_dispose(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn handle_for(extension: &ClosingExtension, info: CaseInfo) -> Closeables {
        let mut ctx = CaseContext::new(info);
        extension.prepare_case(&mut ctx);
        Closeables::fetch(&ctx).unwrap()
    }

    #[test]
    fn prepare_case_injects_handle() {
        let extension = ClosingExtension::new();
        let handle = handle_for(&extension, case(0));

        assert_eq!(handle.case().name, "case0");
    }

    #[test]
    fn handle_is_unrecognized_without_extension() {
        let ctx = CaseContext::new(case(0));

        let err = Closeables::fetch(&ctx).unwrap_err();
        assert!(matches!(err, ResolveError::Unrecognized(name) if name.contains("Closeables")));
    }

    #[test]
    fn after_each_unwinds_case_scope_only() {
        let extension = ClosingExtension::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let handle = handle_for(&extension, case(0));

        handle.add_per_case(counting(&disposed)).unwrap();
        handle.add_per_group(counting(&disposed)).unwrap();

        extension.after_each(&case(0), &CaseOutcome::Passed);
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert_eq!(extension.registry().len(Scope::Group), 1);

        extension.after_all(&group());
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn stale_case_handle_is_refused_and_disposes() {
        let extension = ClosingExtension::new();
        let disposed = Arc::new(AtomicUsize::new(0));
        let stale = handle_for(&extension, case(0));

        extension.after_each(&case(0), &CaseOutcome::Passed);

        let err = stale
            .add_per_case(counting(&disposed))
            .err()
            .expect("registration refused");
        assert_eq!(
            err,
            RegistrationError::CaseEnded {
                case: "case0".to_string()
            }
        );
        assert_eq!(disposed.load(Ordering::SeqCst), 1);
        assert!(extension.registry().is_empty(Scope::Case));

        // Group registration through the same handle is still allowed.
        stale.add_per_group(counting(&disposed)).unwrap();
        assert_eq!(extension.registry().len(Scope::Group), 1);
        extension.after_all(&group());
    }

    #[test]
    fn stale_group_handle_is_refused() {
        let sink = Arc::new(RecordingSink::new());
        let extension = ClosingExtension::with_sink(sink.clone());
        let handle = handle_for(&extension, case(0));

        extension.after_all(&group());

        let err = handle
            .add_per_group(on_dispose(|| Err("late failure".into())))
            .err()
            .expect("registration refused");
        assert_eq!(err.to_string(), "group 'group' has already ended");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn new_case_gets_fresh_handle() {
        let extension = ClosingExtension::new();
        let disposed = Arc::new(AtomicUsize::new(0));

        let first = handle_for(&extension, case(0));
        extension.after_each(&case(0), &CaseOutcome::Passed);

        let second = handle_for(&extension, case(1));
        second.add_per_case(counting(&disposed)).unwrap();
        assert!(first.add_per_case(counting(&disposed)).is_err());

        extension.after_each(&case(1), &CaseOutcome::Passed);
        assert_eq!(disposed.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn registrations_racing_after_each_are_all_disposed() {
        const THREADS: usize = 4;
        const PER_THREAD: usize = 2000;

        let extension = Arc::new(ClosingExtension::new());
        let handle = handle_for(&extension, case(0));
        let disposed = Arc::new(AtomicUsize::new(0));
        let refused = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS + 1));

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let handle = handle.clone();
                let disposed = Arc::clone(&disposed);
                let refused = Arc::clone(&refused);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..PER_THREAD {
                        if handle.add_per_case(counting(&disposed)).is_err() {
                            refused.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        barrier.wait();
        extension.after_each(&case(0), &CaseOutcome::Passed);

        for worker in workers {
            worker.join().unwrap();
        }

        // Everything accepted before the epoch bump was unwound; everything
        // after it was refused and disposed on the spot.
        assert_eq!(disposed.load(Ordering::SeqCst), THREADS * PER_THREAD);
        assert!(extension.registry().is_empty(Scope::Case));
        assert!(refused.load(Ordering::SeqCst) <= THREADS * PER_THREAD);
    }
}
