//! Case parameter injection.
//!
//! Case functions declare what they need as parameters. Each parameter type
//! implements [`CaseParam`] and is resolved from the [`CaseContext`] just
//! before the case runs.
//!
//! # Built-in Parameters
//!
//! - [`Closeables`](crate::closeables::Closeables) - Resource registration handle
//! - [`Fixture<T>`] - A shared value inserted by an extension or the group
//! - [`CaseInfo`] - The running case's name and position
//! - Tuples of `CaseParam` types
//!
//! # Example
//!
//! ```
//! use custodian_harness::prelude::*;
//!
//! struct Endpoint(&'static str);
//!
//! fn pings(endpoint: Fixture<Endpoint>, info: CaseInfo) {
//!     assert_eq!(endpoint.0, "127.0.0.1:9000");
//!     assert_eq!(info.name, "pings");
//! }
//!
//! let mut group = TestGroup::new("network");
//! group.insert_fixture(Endpoint("127.0.0.1:9000"));
//! group.add_case("pings", pings);
//! assert!(group.run().passed());
//! ```

use std::sync::Arc;

use variadics_please::all_tuples;

use crate::context::{CaseContext, CaseInfo};

/// A value that can be injected into a case function.
pub trait CaseParam: Sized + 'static {
    /// Resolves this parameter from the case context.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Unrecognized`] if nothing in the context can
    /// satisfy the request.
    fn fetch(ctx: &CaseContext<'_>) -> Result<Self, ResolveError>;
}

/// Errors that can occur when resolving case parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// No extension or fixture provides the requested type.
    #[error("unrecognized capability request: {0}")]
    Unrecognized(&'static str),
}

impl ResolveError {
    /// Creates an [`Unrecognized`](Self::Unrecognized) error naming `T`.
    #[must_use]
    pub fn unrecognized<T: ?Sized>() -> Self {
        Self::Unrecognized(core::any::type_name::<T>())
    }
}

/// Shared access to a capability provided for the case.
///
/// `Fixture<T>` derefs to `T`. The value is shared with the group, so it is
/// read-only; use interior mutability for state that changes.
pub struct Fixture<T> {
    inner: Arc<T>,
}

impl<T> Fixture<T> {
    /// Returns the underlying shared pointer.
    #[must_use]
    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T> Clone for Fixture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> core::ops::Deref for Fixture<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Send + Sync + 'static> CaseParam for Fixture<T> {
    fn fetch(ctx: &CaseContext<'_>) -> Result<Self, ResolveError> {
        ctx.get::<T>()
            .map(|inner| Fixture { inner })
            .ok_or_else(ResolveError::unrecognized::<T>)
    }
}

impl CaseParam for CaseInfo {
    fn fetch(ctx: &CaseContext<'_>) -> Result<Self, ResolveError> {
        Ok(ctx.info().clone())
    }
}

macro_rules! impl_case_param_tuple {
    ($($param:ident),*) => {
        impl<$($param: CaseParam),*> CaseParam for ($($param,)*) {
            fn fetch(ctx: &CaseContext<'_>) -> Result<Self, ResolveError> {
                Ok(($($param::fetch(ctx)?,)*))
            }
        }
    };
}

// Generate impls for tuples of size 1 to 8
all_tuples!(impl_case_param_tuple, 1, 8, P);
