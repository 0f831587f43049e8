//! The scoped resource registry at the core of `custodian` (Layer 1).
//!
//! `custodian_registry` tracks *disposable* resources on behalf of tests and
//! guarantees they are torn down when the scope that owns them ends:
//!
//! - [`disposable`] - The [`Disposable`] trait and closure adapters
//! - [`registry`] - The two-scope [`ScopedRegistry`] and its unwind algorithm
//! - [`diagnostics`] - Teardown failures and the sinks that report them
//!
//! # Architecture
//!
//! - **Layer 1** (`custodian_registry`): registration and unwind (this crate)
//! - **Layer 2** (`custodian_harness`): extensions, capability injection and
//!   the group/case runner that fires the unwind triggers
//!
//! # Example
//!
//! ```
//! use custodian_registry::disposable::on_dispose;
//! use custodian_registry::registry::ScopedRegistry;
//!
//! let registry = ScopedRegistry::new();
//!
//! let _conn = registry.register_group(on_dispose(|| Ok(())).named("connection"));
//! let _tmp = registry.register_case(on_dispose(|| Ok(())).named("scratch dir"));
//!
//! // End of the test case: only the scratch dir is torn down.
//! registry.unwind_case();
//! assert_eq!(registry.len(custodian_registry::registry::Scope::Group), 1);
//!
//! // End of the group.
//! registry.unwind_group();
//! ```

/// Teardown failure reporting.
pub mod diagnostics;

/// The disposable resource trait.
pub mod disposable;

/// The scoped resource registry.
pub mod registry;

pub use diagnostics::{
    DiagnosticSink, RecordingSink, TeardownError, TeardownFailure, TracingSink, panic_message,
};
pub use disposable::{BoxError, Disposable, DisposeFn, on_dispose};
pub use registry::{Scope, ScopedRegistry};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::diagnostics::*;
    pub use crate::disposable::*;
    pub use crate::registry::*;
}
