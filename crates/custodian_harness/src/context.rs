//! Per-case execution context and capability storage.
//!
//! Capabilities live at two levels:
//!
//! ```text
//! TestGroup (fixtures: shared by every case)
//!    │
//!    └── CaseContext (capabilities inserted by extensions for one case)
//! ```
//!
//! Lookups check the case first, then the group fixtures.

use core::any::{Any, TypeId};
use std::sync::Arc;

use hashbrown::HashMap;

/// Type-erased shared capability.
type BoxedCapability = Arc<dyn Any + Send + Sync>;

/// Type-keyed storage of shared values.
#[derive(Default)]
pub struct Capabilities {
    storage: HashMap<TypeId, BoxedCapability>,
}

impl Capabilities {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: HashMap::new(),
        }
    }

    /// Inserts a value, replacing any previous value of the same type.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.insert_shared(Arc::new(value));
    }

    /// Inserts a value that is already shared.
    pub fn insert_shared<T: Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.storage.insert(TypeId::of::<T>(), value);
    }

    /// Returns the value of type `T`, if present.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.storage
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    /// Returns `true` if a value of type `T` is present.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.storage.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

/// Identifies a test group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    /// The group's name.
    pub name: String,
    /// Number of cases in the group.
    pub cases: usize,
}

/// Identifies a test case within its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseInfo {
    /// Name of the owning group.
    pub group: String,
    /// The case's name.
    pub name: String,
    /// Position of the case within the group, starting at zero.
    pub index: usize,
}

/// The context a case's parameters are resolved from.
pub struct CaseContext<'g> {
    info: CaseInfo,
    capabilities: Capabilities,
    fixtures: Option<&'g Capabilities>,
}

impl<'g> CaseContext<'g> {
    /// Creates a context with no access to group fixtures.
    #[must_use]
    pub fn new(info: CaseInfo) -> Self {
        Self {
            info,
            capabilities: Capabilities::new(),
            fixtures: None,
        }
    }

    /// Creates a context that falls back to the group's fixtures.
    #[must_use]
    pub fn with_fixtures(info: CaseInfo, fixtures: &'g Capabilities) -> Self {
        Self {
            info,
            capabilities: Capabilities::new(),
            fixtures: Some(fixtures),
        }
    }

    /// Returns the case this context belongs to.
    #[must_use]
    pub fn info(&self) -> &CaseInfo {
        &self.info
    }

    /// Inserts a case-local capability.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        self.capabilities.insert(value);
    }

    /// Looks up a capability, checking the case before the group.
    #[must_use]
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.capabilities
            .get::<T>()
            .or_else(|| self.fixtures.and_then(Capabilities::get::<T>))
    }

    /// Returns `true` if a capability of type `T` is reachable.
    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.capabilities.contains::<T>()
            || self.fixtures.is_some_and(Capabilities::contains::<T>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Port(u16);

    #[derive(Debug, PartialEq)]
    struct Host(&'static str);

    fn info() -> CaseInfo {
        CaseInfo {
            group: "group".to_string(),
            name: "case".to_string(),
            index: 0,
        }
    }

    #[test]
    fn capabilities_insert_and_get() {
        let mut caps = Capabilities::new();
        assert!(caps.is_empty());

        caps.insert(Port(8080));

        assert_eq!(caps.len(), 1);
        assert!(caps.contains::<Port>());
        assert!(!caps.contains::<Host>());
        assert_eq!(*caps.get::<Port>().unwrap(), Port(8080));
        assert!(caps.get::<Host>().is_none());
    }

    #[test]
    fn capabilities_insert_replaces() {
        let mut caps = Capabilities::new();
        caps.insert(Port(1));
        caps.insert(Port(2));

        assert_eq!(caps.len(), 1);
        assert_eq!(*caps.get::<Port>().unwrap(), Port(2));
    }

    #[test]
    fn capabilities_insert_shared_keeps_identity() {
        let mut caps = Capabilities::new();
        let shared = Arc::new(Port(9));
        caps.insert_shared(Arc::clone(&shared));

        assert!(Arc::ptr_eq(&caps.get::<Port>().unwrap(), &shared));
    }

    #[test]
    fn context_falls_back_to_fixtures() {
        let mut fixtures = Capabilities::new();
        fixtures.insert(Host("localhost"));

        let ctx = CaseContext::with_fixtures(info(), &fixtures);

        assert!(ctx.contains::<Host>());
        assert_eq!(*ctx.get::<Host>().unwrap(), Host("localhost"));
        assert!(!ctx.contains::<Port>());
    }

    #[test]
    fn context_local_shadows_fixture() {
        let mut fixtures = Capabilities::new();
        fixtures.insert(Port(1));

        let mut ctx = CaseContext::with_fixtures(info(), &fixtures);
        ctx.insert(Port(2));

        assert_eq!(*ctx.get::<Port>().unwrap(), Port(2));
    }

    #[test]
    fn context_without_fixtures() {
        let ctx = CaseContext::new(info());

        assert_eq!(ctx.info().name, "case");
        assert!(ctx.get::<Port>().is_none());
        assert!(!ctx.contains::<Port>());
    }
}
