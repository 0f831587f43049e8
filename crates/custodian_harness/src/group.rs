//! The test-group runner.
//!
//! [`TestGroup`] owns the extensions, fixtures, cases and after-all hooks of
//! one group and drives them through the lifecycle described in
//! [`extension`](crate::extension). Running a group never panics: failing
//! cases and panicking hooks end up in the returned [`GroupReport`].
//!
//! # Example
//!
//! ```
//! use custodian_harness::prelude::*;
//!
//! fn passes() {}
//!
//! fn fails() -> Result<(), String> {
//!     Err("connection refused".to_string())
//! }
//!
//! let mut group = TestGroup::new("example");
//! group
//!     .add_extension(ClosingExtension::new())
//!     .add_case("passes", passes)
//!     .add_case("fails", fails);
//!
//! let report = group.run();
//! assert!(!report.passed());
//! assert_eq!(report.outcome("passes"), Some(&CaseOutcome::Passed));
//! assert_eq!(report.failures().count(), 1);
//! ```

use core::fmt;
use std::panic::{self, AssertUnwindSafe};

use custodian_registry::diagnostics::panic_message;
use hashbrown::HashSet;

use crate::case::{BoxedCase, Case, CaseOutcome, IntoCase};
use crate::context::{Capabilities, CaseContext, CaseInfo, GroupInfo};
use crate::extension::{Extension, ExtensionId};

/// A user hook run after the last case, before extensions tear down.
type AfterAllHook = Box<dyn Fn(&GroupReport) + Send + Sync>;

/// Lifecycle stage a hook failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    /// [`Extension::before_all`].
    BeforeAll,
    /// [`Extension::prepare_case`].
    PrepareCase,
    /// [`Extension::after_each`].
    AfterEach,
    /// A user hook added with [`TestGroup::add_after_all`].
    UserAfterAll,
    /// [`Extension::after_all`].
    AfterAll,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeAll => "before_all",
            Self::PrepareCase => "prepare_case",
            Self::AfterEach => "after_each",
            Self::UserAfterAll => "user after_all",
            Self::AfterAll => "after_all",
        };
        f.write_str(name)
    }
}

/// A hook that panicked while the group ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    /// Where in the lifecycle the panic happened.
    pub hook: Hook,
    /// Extension name, or `"group"` for user hooks.
    pub owner: String,
    /// The rendered panic message.
    pub message: String,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hook of {} panicked: {}", self.hook, self.owner, self.message)
    }
}

/// The result of one case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseReport {
    /// The case that ran.
    pub info: CaseInfo,
    /// How it finished.
    pub outcome: CaseOutcome,
}

/// Everything that happened while a group ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReport {
    /// The group's name.
    pub name: String,
    /// One entry per case, in execution order.
    pub cases: Vec<CaseReport>,
    /// Hooks that panicked.
    pub hook_failures: Vec<HookFailure>,
}

impl GroupReport {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cases: Vec::new(),
            hook_failures: Vec::new(),
        }
    }

    /// Returns `true` if every case passed and no hook panicked.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.hook_failures.is_empty() && self.cases.iter().all(|case| case.outcome.is_success())
    }

    /// Returns the outcome of the case with the given name.
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&CaseOutcome> {
        self.cases
            .iter()
            .find(|case| case.info.name == name)
            .map(|case| &case.outcome)
    }

    /// Iterates over the cases that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|case| !case.outcome.is_success())
    }
}

struct ExtensionEntry {
    name: String,
    extension: Box<dyn Extension>,
}

/// A named group of test cases sharing extensions and fixtures.
///
/// Cases run sequentially, in the order they were added.
pub struct TestGroup {
    name: String,
    extensions: Vec<ExtensionEntry>,
    extension_ids: HashSet<ExtensionId>,
    fixtures: Capabilities,
    cases: Vec<BoxedCase>,
    after_all: Vec<AfterAllHook>,
}

impl TestGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extensions: Vec::new(),
            extension_ids: HashSet::new(),
            fixtures: Capabilities::new(),
            cases: Vec::new(),
            after_all: Vec::new(),
        }
    }

    /// Returns the group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an extension.
    ///
    /// # Panics
    ///
    /// Panics if a unique extension is added twice.
    pub fn add_extension<E: Extension>(&mut self, extension: E) -> &mut Self {
        let id = ExtensionId::of::<E>();
        let name = extension.name().to_string();

        if extension.is_unique() && self.extension_ids.contains(&id) {
            panic!(
                "Extension '{}' is unique and was already added.\n\
                 If you intended to add this extension multiple times, \
                 set `is_unique()` to return `false`.",
                name
            );
        }

        self.extension_ids.insert(id);
        self.extensions.push(ExtensionEntry {
            name,
            extension: Box::new(extension),
        });
        self
    }

    /// Returns `true` if an extension of type `E` has been added.
    #[must_use]
    pub fn contains_extension<E: Extension>(&self) -> bool {
        self.extension_ids.contains(&ExtensionId::of::<E>())
    }

    /// Inserts a fixture every case can request as [`Fixture<T>`](crate::param::Fixture).
    pub fn insert_fixture<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.fixtures.insert(value);
        self
    }

    /// Adds a case.
    pub fn add_case<M>(&mut self, name: impl Into<String>, case: impl IntoCase<M>) -> &mut Self {
        self.cases.push(Box::new(case.into_case(name.into())));
        self
    }

    /// Adds a hook that runs after the last case, before any extension's
    /// `after_all`.
    ///
    /// The hook receives the report so far. A panic inside the hook is
    /// recorded as a [`HookFailure`].
    pub fn add_after_all<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&GroupReport) + Send + Sync + 'static,
    {
        self.after_all.push(Box::new(hook));
        self
    }

    /// Returns the number of cases.
    #[must_use]
    pub fn case_count(&self) -> usize {
        self.cases.len()
    }

    /// Runs every case and returns the report.
    pub fn run(&self) -> GroupReport {
        let group = GroupInfo {
            name: self.name.clone(),
            cases: self.cases.len(),
        };
        let span = tracing::info_span!("group", name = %self.name);
        let _enter = span.enter();

        let mut report = GroupReport::new(&self.name);

        for entry in &self.extensions {
            guarded(&mut report, Hook::BeforeAll, &entry.name, || {
                entry.extension.before_all(&group);
            });
        }

        for (index, case) in self.cases.iter().enumerate() {
            let info = CaseInfo {
                group: self.name.clone(),
                name: case.name().to_string(),
                index,
            };
            let outcome = self.run_case(case.as_ref(), &info, &mut report);

            match &outcome {
                CaseOutcome::Passed => tracing::info!(case = %info.name, "case passed"),
                other => tracing::warn!(case = %info.name, outcome = %other, "case did not pass"),
            }

            for entry in self.extensions.iter().rev() {
                guarded(&mut report, Hook::AfterEach, &entry.name, || {
                    entry.extension.after_each(&info, &outcome);
                });
            }

            report.cases.push(CaseReport { info, outcome });
        }

        for hook in &self.after_all {
            let snapshot = report.clone();
            guarded(&mut report, Hook::UserAfterAll, "group", || hook(&snapshot));
        }

        for entry in self.extensions.iter().rev() {
            guarded(&mut report, Hook::AfterAll, &entry.name, || {
                entry.extension.after_all(&group);
            });
        }

        tracing::info!(
            cases = report.cases.len(),
            failures = report.failures().count(),
            hook_failures = report.hook_failures.len(),
            "group finished"
        );
        report
    }

    fn run_case(&self, case: &dyn Case, info: &CaseInfo, report: &mut GroupReport) -> CaseOutcome {
        let span = tracing::debug_span!("case", name = %info.name, index = info.index);
        let _enter = span.enter();

        let mut ctx = CaseContext::with_fixtures(info.clone(), &self.fixtures);
        for entry in &self.extensions {
            guarded(report, Hook::PrepareCase, &entry.name, || {
                entry.extension.prepare_case(&mut ctx);
            });
        }

        match panic::catch_unwind(AssertUnwindSafe(|| case.run(&ctx))) {
            Ok(outcome) => outcome,
            Err(payload) => CaseOutcome::Panicked(panic_message(&*payload)),
        }
    }
}

/// Runs `hook`, recording a panic instead of propagating it.
fn guarded(report: &mut GroupReport, hook: Hook, owner: &str, f: impl FnOnce()) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(f)) {
        let message = panic_message(&*payload);
        tracing::error!(hook = %hook, owner, error = %message, "hook panicked");
        report.hook_failures.push(HookFailure {
            hook,
            owner: owner.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Extension that records every hook call into a shared log.
    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Extension for Recorder {
        fn before_all(&self, group: &GroupInfo) {
            self.log.lock().push(format!("{}:before_all:{}", self.label, group.cases));
        }

        fn prepare_case(&self, ctx: &mut CaseContext<'_>) {
            self.log.lock().push(format!("{}:prepare:{}", self.label, ctx.info().name));
        }

        fn after_each(&self, case: &CaseInfo, _outcome: &CaseOutcome) {
            self.log.lock().push(format!("{}:after_each:{}", self.label, case.name));
        }

        fn after_all(&self, _group: &GroupInfo) {
            self.log.lock().push(format!("{}:after_all", self.label));
        }

        fn name(&self) -> &str {
            self.label
        }

        fn is_unique(&self) -> bool {
            false
        }
    }

    struct Unique;
    impl Extension for Unique {}

    #[test]
    fn hooks_run_in_lifecycle_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut group = TestGroup::new("order");
        group
            .add_extension(Recorder {
                label: "a",
                log: Arc::clone(&log),
            })
            .add_extension(Recorder {
                label: "b",
                log: Arc::clone(&log),
            })
            .add_case("one", || {});

        let hook_log = Arc::clone(&log);
        group.add_after_all(move |_report| hook_log.lock().push("user:after_all".to_string()));

        assert!(group.run().passed());
        assert_eq!(
            *log.lock(),
            vec![
                "a:before_all:1",
                "b:before_all:1",
                "a:prepare:one",
                "b:prepare:one",
                "b:after_each:one",
                "a:after_each:one",
                "user:after_all",
                "b:after_all",
                "a:after_all",
            ]
        );
    }

    #[test]
    fn case_panic_is_captured() {
        fn boom() {
            panic!("kaboom");
        }

        let mut group = TestGroup::new("panics");
        group.add_case("boom", boom);

        let report = group.run();
        assert_eq!(
            report.outcome("boom"),
            Some(&CaseOutcome::Panicked("kaboom".to_string()))
        );
        assert!(!report.passed());
    }

    #[test]
    fn hook_panic_is_recorded_and_lifecycle_continues() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut group = TestGroup::new("hooks");
        group
            .add_extension(Recorder {
                label: "r",
                log: Arc::clone(&log),
            })
            .add_case("one", || {})
            .add_after_all(|_report| panic!("check failed"));

        let report = group.run();

        assert_eq!(report.outcome("one"), Some(&CaseOutcome::Passed));
        assert_eq!(
            report.hook_failures,
            vec![HookFailure {
                hook: Hook::UserAfterAll,
                owner: "group".to_string(),
                message: "check failed".to_string(),
            }]
        );
        assert!(!report.passed());
        assert_eq!(log.lock().last().map(String::as_str), Some("r:after_all"));
    }

    #[test]
    fn after_all_hook_sees_case_outcomes() {
        let seen = Arc::new(Mutex::new(None));
        let mut group = TestGroup::new("report");
        group
            .add_case("ok", || {})
            .add_case("bad", || -> Result<(), String> { Err("bad".to_string()) });

        let sink = Arc::clone(&seen);
        group.add_after_all(move |report| *sink.lock() = Some(report.failures().count()));

        let report = group.run();
        assert_eq!(*seen.lock(), Some(1));
        assert_eq!(report.cases.len(), 2);
        assert_eq!(report.cases[1].info.index, 1);
    }

    #[test]
    fn fixtures_reach_cases() {
        struct Greeting(&'static str);

        let mut group = TestGroup::new("fixtures");
        group
            .insert_fixture(Greeting("hello"))
            .add_case("greets", |greeting: crate::param::Fixture<Greeting>| {
                assert_eq!(greeting.0, "hello");
            });

        assert!(group.run().passed());
    }

    #[test]
    #[should_panic(expected = "is unique and was already added")]
    fn unique_extension_added_twice_panics() {
        let mut group = TestGroup::new("dup");
        group.add_extension(Unique).add_extension(Unique);
    }

    #[test]
    fn non_unique_extension_can_repeat() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut group = TestGroup::new("dup");
        group
            .add_extension(Recorder {
                label: "x",
                log: Arc::clone(&log),
            })
            .add_extension(Recorder {
                label: "y",
                log: Arc::clone(&log),
            });

        assert!(group.contains_extension::<Recorder>());
        assert!(!group.contains_extension::<Unique>());
        assert_eq!(group.case_count(), 0);
        assert_eq!(group.name(), "dup");
    }

    #[test]
    fn empty_group_passes() {
        let report = TestGroup::new("empty").run();
        assert!(report.passed());
        assert!(report.cases.is_empty());
        assert_eq!(report.outcome("missing"), None);
    }

    #[test]
    fn hook_failure_display() {
        let failure = HookFailure {
            hook: Hook::AfterEach,
            owner: "ext".to_string(),
            message: "oops".to_string(),
        };
        assert_eq!(failure.to_string(), "after_each hook of ext panicked: oops");
    }
}
