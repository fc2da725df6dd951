//! Logging setup for component-dispatcher
//!
//! Everything the crate logs goes through `tracing` under the
//! `component_dispatcher` target. This module installs a `tracing-subscriber`
//! for applications that do not bring their own.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - JSON subscriber output
//! - `logging-pretty` - human-readable subscriber output
//!
//! # Example
//!
//! ```rust,ignore
//! use component_dispatcher::logging;
//!
//! // JSON if logging-json, pretty if logging-pretty
//! logging::init();
//!
//! // Only this crate's events, at TRACE, with source locations
//! logging::builder()
//!     .trace()
//!     .dispatcher_only()
//!     .with_file()
//!     .with_line_number()
//!     .compact()
//!     .init();
//! ```

#[cfg(feature = "logging")]
use tracing::Level;

/// Target used by every event this crate emits
pub const TARGET: &str = "component_dispatcher";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line colored output
    Pretty,
    /// Single-line output
    Compact,
}

/// Builder for the logging subscriber
#[cfg(feature = "logging")]
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    with_file: bool,
    with_line_number: bool,
    with_thread_ids: bool,
    with_thread_names: bool,
}

#[cfg(feature = "logging")]
impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            target: None,
            with_file: false,
            with_line_number: false,
            with_thread_ids: false,
            with_thread_names: false,
        }
    }
}

#[cfg(feature = "logging")]
impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the minimum log level
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Per-request routing and binding detail
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    /// Registration and singleton creation
    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Scan report only
    pub fn info(self) -> Self {
        self.with_level(Level::INFO)
    }

    /// Ambiguous routes and unhandled errors
    pub fn warn(self) -> Self {
        self.with_level(Level::WARN)
    }

    pub fn error(self) -> Self {
        self.with_level(Level::ERROR)
    }

    /// Filter to only show events from a specific target
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show component-dispatcher events
    pub fn dispatcher_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    pub fn with_file(mut self) -> Self {
        self.with_file = true;
        self
    }

    pub fn with_line_number(mut self) -> Self {
        self.with_line_number = true;
        self
    }

    pub fn with_thread_ids(mut self) -> Self {
        self.with_thread_ids = true;
        self
    }

    pub fn with_thread_names(mut self) -> Self {
        self.with_thread_names = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// The `EnvFilter` directive this builder installs
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{}={}", target, self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// Returns silently if a global subscriber is already set.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let filter = EnvFilter::new(self.directive());
        let layer = fmt::layer()
            .with_file(self.with_file)
            .with_line_number(self.with_line_number)
            .with_thread_ids(self.with_thread_ids)
            .with_thread_names(self.with_thread_names)
            .with_target(true);

        let registry = tracing_subscriber::registry().with(filter);
        let _ = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            // Without the json feature the plain formatter stands in
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => registry.with(layer).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            LogFormat::Compact => registry.with(layer.compact()).try_init(),
        };
    }

    /// No-op without a subscriber feature
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) {}
}

/// Create a new logging builder
#[cfg(feature = "logging")]
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Initialize logging with default settings
///
/// JSON when `logging-json` is enabled, otherwise pretty.
#[cfg(feature = "logging")]
pub fn init() {
    if cfg!(feature = "logging-json") {
        builder().json().debug().init();
    } else {
        builder().pretty().debug().init();
    }
}

/// JSON output at DEBUG.
///
/// ```json
/// {"timestamp":"2026-01-01T00:00:00.000Z","level":"INFO","target":"component_dispatcher","fields":{"message":"Scan complete","routes":11}}
/// ```
#[cfg(feature = "logging")]
pub fn init_json() {
    builder().json().debug().init();
}

/// Pretty output at DEBUG.
#[cfg(feature = "logging")]
pub fn init_pretty() {
    builder().pretty().debug().init();
}

/// Only this crate's events, at DEBUG
#[cfg(feature = "logging")]
pub fn init_dispatcher_only() {
    builder().dispatcher_only().debug().init();
}
