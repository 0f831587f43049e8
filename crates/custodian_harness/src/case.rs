//! Test cases and their outcomes.
//!
//! A case is usually a plain function whose parameters implement
//! [`CaseParam`]. [`IntoCase`] turns such functions (up to eight
//! parameters) into a [`Case`] the runner can store and execute.
//!
//! ```
//! use custodian_harness::prelude::*;
//!
//! fn no_params() {}
//!
//! fn fallible(closeables: Closeables) -> Result<(), RegistrationError> {
//!     closeables.add_per_case(on_dispose(|| Ok(())))?;
//!     Ok(())
//! }
//!
//! let mut group = TestGroup::new("cases");
//! group.add_extension(ClosingExtension::new());
//! group.add_case("no_params", no_params);
//! group.add_case("fallible", fallible);
//! assert!(group.run().passed());
//! ```

use core::fmt;
use core::marker::PhantomData;

use variadics_please::all_tuples;

use crate::context::CaseContext;
use crate::param::{CaseParam, ResolveError};

/// How a case finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    /// The case returned successfully.
    Passed,
    /// The case returned an error.
    Failed(String),
    /// The case panicked (assertion failures included).
    Panicked(String),
    /// One of the case's parameters could not be resolved; the body never ran.
    Unresolved(ResolveError),
}

impl CaseOutcome {
    /// Returns `true` for [`CaseOutcome::Passed`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

impl fmt::Display for CaseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            Self::Panicked(message) => write!(f, "panicked: {message}"),
            Self::Unresolved(err) => write!(f, "not run: {err}"),
        }
    }
}

/// Return types a case function may have.
pub trait IntoOutcome {
    /// Converts the case's return value into an outcome.
    fn into_outcome(self) -> CaseOutcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> CaseOutcome {
        CaseOutcome::Passed
    }
}

impl<E: fmt::Display> IntoOutcome for Result<(), E> {
    fn into_outcome(self) -> CaseOutcome {
        match self {
            Ok(()) => CaseOutcome::Passed,
            Err(err) => CaseOutcome::Failed(err.to_string()),
        }
    }
}

/// A runnable test case.
///
/// Most users won't implement `Case` directly; functions become cases via
/// [`IntoCase`].
pub trait Case: Send + Sync + 'static {
    /// Resolves parameters and runs the case body.
    ///
    /// Panics raised by the body propagate; the runner catches them.
    fn run(&self, ctx: &CaseContext<'_>) -> CaseOutcome;

    /// Returns the case's name.
    fn name(&self) -> &str;
}

/// Boxed type-erased case.
pub type BoxedCase = Box<dyn Case>;

/// Converts a type into a [`Case`].
///
/// The `Marker` type parameter allows implementations for functions of every
/// arity without overlapping.
pub trait IntoCase<Marker>: Sized {
    /// The resulting case type.
    type Case: Case;

    /// Converts this into a case with the given name.
    fn into_case(self, name: String) -> Self::Case;
}

/// A case wrapping a function.
///
/// Created via [`IntoCase`].
pub struct FunctionCase<F, Marker> {
    func: F,
    name: String,
    _marker: PhantomData<fn() -> Marker>,
}

impl<F, Marker> FunctionCase<F, Marker> {
    /// Creates a new function case with the given name.
    pub fn new(func: F, name: String) -> Self {
        Self {
            func,
            name,
            _marker: PhantomData,
        }
    }
}

/// Marker type for function cases.
pub struct FunctionMarker;

macro_rules! impl_into_case {
    ($($param:ident),*) => {
        impl<F, R, $($param: CaseParam),*> IntoCase<(FunctionMarker, $($param,)*)> for F
        where
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
        {
            type Case = FunctionCase<F, (FunctionMarker, $($param,)*)>;

            fn into_case(self, name: String) -> Self::Case {
                FunctionCase::new(self, name)
            }
        }

        impl<F, R, $($param: CaseParam),*> Case for FunctionCase<F, (FunctionMarker, $($param,)*)>
        where
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: IntoOutcome,
        {
            fn run(&self, ctx: &CaseContext<'_>) -> CaseOutcome {
                let _ = ctx;
                $(
                    #[expect(non_snake_case, reason = "bindings reuse the generic parameter names")]
                    let $param = match $param::fetch(ctx) {
                        Ok(param) => param,
                        Err(err) => return CaseOutcome::Unresolved(err),
                    };
                )*
                (self.func)($($param),*).into_outcome()
            }

            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

// Generate impls for functions with 0 to 8 parameters
all_tuples!(impl_into_case, 0, 8, P);
