//! Tracing subscriber setup for test groups.
//!
//! [`TracingExtension`] installs a `tracing` subscriber in `before_all`, so the
//! teardown diagnostics emitted by the registry (failed disposals, unwind
//! summaries) become visible without any other setup. Every case can also
//! request the active [`TracingConfig`] as a [`Fixture`](crate::param::Fixture).
//!
//! # Example
//!
//! ```
//! use custodian_harness::prelude::*;
//! use tracing::Level;
//!
//! fn logs(config: Fixture<TracingConfig>) {
//!     tracing::info!(level = %config.level, "running");
//! }
//!
//! let mut group = TestGroup::new("logged");
//! group
//!     .add_extension(
//!         TracingExtension::new()
//!             .with_level(Level::DEBUG)
//!             .with_format(TracingFormat::Compact)
//!             .with_test_writer(true),
//!     )
//!     .add_extension(ClosingExtension::new())
//!     .add_case("logs", logs);
//! assert!(group.run().passed());
//! ```

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::TestWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::context::{CaseContext, GroupInfo};
use crate::extension::Extension;

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Tracing output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable multi-line output (default).
    #[default]
    Pretty,
    /// Compact single-line output.
    Compact,
    /// JSON structured output.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingConfig
// ─────────────────────────────────────────────────────────────────────────────

/// The tracing configuration a group runs with.
///
/// Provided to every case by [`TracingExtension`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// The configured maximum log level.
    pub level: Level,
    /// The configured output format.
    pub format: TracingFormat,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingExtension
// ─────────────────────────────────────────────────────────────────────────────

/// Extension that configures the global `tracing` subscriber.
///
/// The subscriber is installed once, in `before_all`. If another subscriber
/// is already installed (for example by an earlier group in the same test
/// binary), the existing one is kept.
///
/// # Capabilities Provided
///
/// | Capability | Scope | Description |
/// |------------|-------|-------------|
/// | [`TracingConfig`] | Case | Tracing configuration (read-only) |
///
/// # Configuration Options
///
/// ```
/// use custodian_harness::tracing_extension::{TracingExtension, TracingFormat};
/// use tracing::Level;
///
/// // Local runs: pretty output captured by the test harness
/// let local = TracingExtension::new()
///     .with_level(Level::DEBUG)
///     .with_test_writer(true);
///
/// // CI: JSON output with per-target levels
/// let ci = TracingExtension::new()
///     .with_format(TracingFormat::Json)
///     .with_env_filter("custodian_registry=debug,warn")
///     .with_span_events(true);
/// ```
#[derive(Clone)]
pub struct TracingExtension {
    /// Maximum log level.
    level: Level,
    /// Output format.
    format: TracingFormat,
    /// Environment filter (e.g., "custodian_registry=debug,warn").
    env_filter: Option<String>,
    /// Whether to include span events (enter/exit).
    span_events: bool,
    /// Whether to write through libtest's output capture.
    test_writer: bool,
}

impl Default for TracingExtension {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
            test_writer: false,
        }
    }
}

impl TracingExtension {
    /// Creates a new `TracingExtension` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum log level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets a custom environment filter string.
    ///
    /// Format: `target=level,target=level,...`. An invalid filter falls back
    /// to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables span enter/exit events in output.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// Writes through libtest's capture instead of straight to stdout.
    #[must_use]
    pub fn with_test_writer(mut self, enabled: bool) -> Self {
        self.test_writer = enabled;
        self
    }

    /// Returns the configuration this extension installs.
    #[must_use]
    pub fn config(&self) -> TracingConfig {
        TracingConfig {
            level: self.level,
            format: self.format,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        match &self.env_filter {
            Some(filter) => {
                EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
            }
            None => EnvFilter::new(self.level.as_str()),
        }
    }

    fn writer(&self) -> BoxMakeWriter {
        if self.test_writer {
            BoxMakeWriter::new(TestWriter::new())
        } else {
            BoxMakeWriter::new(std::io::stdout)
        }
    }
}

impl Extension for TracingExtension {
    fn before_all(&self, group: &GroupInfo) {
        let span_events = if self.span_events {
            FmtSpan::ENTER | FmtSpan::EXIT
        } else {
            FmtSpan::NONE
        };

        // try_init().ok() keeps an already-installed subscriber
        match self.format {
            TracingFormat::Pretty => {
                tracing_subscriber::registry()
                    .with(self.env_filter())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .pretty()
                            .with_writer(self.writer())
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            TracingFormat::Compact => {
                tracing_subscriber::registry()
                    .with(self.env_filter())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .compact()
                            .with_writer(self.writer())
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
            TracingFormat::Json => {
                tracing_subscriber::registry()
                    .with(self.env_filter())
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(self.writer())
                            .with_span_events(span_events),
                    )
                    .try_init()
                    .ok();
            }
        }

        tracing::info!(
            group = %group.name,
            level = %self.level,
            format = ?self.format,
            "TracingExtension initialized"
        );
    }

    fn prepare_case(&self, ctx: &mut CaseContext<'_>) {
        ctx.insert(self.config());
    }

    fn after_all(&self, group: &GroupInfo) {
        tracing::info!(group = %group.name, "TracingExtension shutting down");
    }
}
