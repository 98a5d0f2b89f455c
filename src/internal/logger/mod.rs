// src/internal/logger/mod.rs

pub mod artifact;
pub mod context;
pub mod filter;
pub mod format;
pub mod handle;
pub mod hooks;
pub mod level;
pub mod logger;
pub mod marker;
pub mod paths;
pub mod perf;
pub mod record;
pub mod sinks;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use artifact::{
    ArtifactForwarder, ArtifactRecord, Collector, CollectorError, JsonLinesCollector, NullCollector,
    LOG_MESSAGE_HOOK,
};
pub use context::{FileOverrides, LogContext, DEFAULT_LOGGER, PERF_LOGGER};
pub use filter::{Flow, Interceptor, NamedPrefix, SourceAttribution};
pub use format::{Formatter, Template, TimeStyle};
pub use handle::{render_error_chain, LogCallback, Logger, Pipeline};
pub use hooks::{install_panic_hook, WarningBridge};
pub use level::{Level, ParseLevelError};
pub use logger::init_logger;
pub use marker::{format_marker, MARKER_LEN};
pub use paths::ProjectPaths;
pub use perf::PerfLog;
pub use record::{CallSite, Extra, Origin, Record};
pub use sinks::{ConsoleSink, RotatingFileSink, Sink, SyslogSink};

// The log_* macros are exported at the crate root via #[macro_export]

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logger name '{0}' clashes with a logging config option")]
    ReservedName(String),

    #[error("Logger '{0}' is closed")]
    Closed(String),

    #[error("Cannot resolve syslog address: {0}")]
    SyslogAddress(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}
