//! Scoped, automatic teardown of test resources.
//!
//! Register a resource against the current test case or the whole test
//! group, and `custodian` disposes it when that scope ends, in reverse
//! registration order, even if other teardowns fail.

pub use custodian_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use custodian_internal::prelude::*;
}
