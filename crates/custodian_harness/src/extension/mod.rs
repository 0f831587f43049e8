//! Extensions hook into the test-group lifecycle.
//!
//! An [`Extension`] is the seam between the runner and anything that needs to
//! act around test cases: the [`ClosingExtension`](crate::closeables::ClosingExtension)
//! tears down registered resources, the
//! [`TracingExtension`](crate::tracing_extension::TracingExtension) installs a
//! subscriber.
//!
//! # Lifecycle
//!
//! For a group with cases `a` and `b`:
//!
//! ```text
//! before_all                       (registration order)
//! prepare_case(a)                  (registration order)
//!   a runs
//! after_each(a)                    (reverse order)
//! prepare_case(b)
//!   b runs
//! after_each(b)
//! user after-all hooks
//! after_all                        (reverse order)
//! ```

use core::any::TypeId;

use crate::case::CaseOutcome;
use crate::context::{CaseContext, CaseInfo, GroupInfo};

// ─────────────────────────────────────────────────────────────────────────────
// ExtensionId
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for an extension type.
///
/// Used for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtensionId {
    type_id: TypeId,
    type_name: &'static str,
}

impl ExtensionId {
    /// Creates an `ExtensionId` for the given extension type.
    #[must_use]
    pub fn of<E: Extension>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            type_name: core::any::type_name::<E>(),
        }
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the type name for debugging.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Extension Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle callbacks around a test group and its cases.
///
/// Every hook has a no-op default. Hooks run on the runner's thread; a
/// panicking hook is recorded in the group report and the lifecycle
/// continues, so one extension cannot stop another's teardown.
///
/// # Example
///
/// ```
/// use core::sync::atomic::{AtomicUsize, Ordering};
/// use custodian_harness::case::CaseOutcome;
/// use custodian_harness::context::CaseInfo;
/// use custodian_harness::extension::Extension;
///
/// #[derive(Default)]
/// struct CountFailures {
///     failures: AtomicUsize,
/// }
///
/// impl Extension for CountFailures {
///     fn after_each(&self, _case: &CaseInfo, outcome: &CaseOutcome) {
///         if !outcome.is_success() {
///             self.failures.fetch_add(1, Ordering::SeqCst);
///         }
///     }
/// }
/// ```
pub trait Extension: Send + Sync + 'static {
    /// Called once before the first case of the group.
    fn before_all(&self, _group: &GroupInfo) {}

    /// Called before each case, after its context is created.
    ///
    /// Use this to insert capabilities the case can request as parameters.
    fn prepare_case(&self, _ctx: &mut CaseContext<'_>) {}

    /// Called after each case, whatever its outcome.
    ///
    /// Called in **reverse** registration order.
    fn after_each(&self, _case: &CaseInfo, _outcome: &CaseOutcome) {}

    /// Called once after every case and every user after-all hook.
    ///
    /// Called in **reverse** registration order.
    fn after_all(&self, _group: &GroupInfo) {}

    /// Returns the extension's name for logs and reports.
    ///
    /// Default implementation returns the type name.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Returns true if this extension can only be added once per group.
    ///
    /// Default is `true`.
    fn is_unique(&self) -> bool {
        true
    }
}
