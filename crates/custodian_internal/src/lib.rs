//! # Custodian Internal Library
//!
//! Re-exports the core custodian crates for convenience.

/// Layer 1: Scoped resource registry.
pub use custodian_registry;

/// Layer 2: Test-group host and extensions.
pub use custodian_harness;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use custodian_harness::prelude::*;
}
