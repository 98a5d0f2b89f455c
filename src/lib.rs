pub mod cli;
pub mod internal;

// Re-export commonly used types
pub use internal::logger::{
    format_marker, install_panic_hook, FileOverrides, Level, LogContext, LogError, Logger, PerfLog,
    ProjectPaths, DEFAULT_LOGGER,
};
