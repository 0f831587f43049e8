//! Test-group host for `custodian` (Layer 2).
//!
//! `custodian_harness` decides *when* registered resources are torn down. It
//! runs test cases in groups and fires the registry's unwind triggers at the
//! end of each case and at the end of the group:
//!
//! - [`extension`] - Lifecycle hooks around groups and cases
//! - [`closeables`] - The extension that owns the registry and the handle cases receive
//! - [`context`] / [`param`] - Capability storage and parameter injection
//! - [`case`] / [`group`] - Cases, outcomes and the group runner
//! - [`tracing_extension`] - Subscriber setup for test output
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use custodian_harness::prelude::*;
//!
//! fn opens_scratch(closeables: Closeables) -> Result<(), RegistrationError> {
//!     closeables.add_per_case(on_dispose(|| Ok(())).named("scratch dir"))?;
//!     Ok(())
//! }
//!
//! let sink = Arc::new(RecordingSink::new());
//!
//! let mut group = TestGroup::new("storage");
//! group
//!     .add_extension(ClosingExtension::with_sink(sink.clone()))
//!     .add_case("opens_scratch", opens_scratch);
//!
//! assert!(group.run().passed());
//! assert!(sink.is_empty());
//! ```

/// Cases and their outcomes.
pub mod case;

/// Automatic teardown through the scoped registry.
pub mod closeables;

/// Capability storage and the per-case context.
pub mod context;

/// Lifecycle extensions.
pub mod extension;

/// The group runner.
pub mod group;

/// Case parameter injection.
pub mod param;

/// Tracing subscriber setup.
pub mod tracing_extension;

pub use closeables::{Closeables, ClosingExtension, RegistrationError};
pub use group::{GroupReport, TestGroup};
pub use tracing_extension::{TracingConfig, TracingExtension, TracingFormat};

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::case::*;
    pub use crate::closeables::*;
    pub use crate::context::*;
    pub use crate::extension::*;
    pub use crate::group::*;
    pub use crate::param::*;
    pub use crate::tracing_extension::*;
    pub use custodian_registry::prelude::*;
}
