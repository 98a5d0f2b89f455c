// src/internal/logger/logger.rs

use tracing_subscriber::{
    fmt::{self},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use super::hooks::WarningBridge;
use crate::internal::config::DiagnosticsConfig;

/// Initialize the process-wide `tracing` subscriber for the crate's own
/// diagnostics, optionally bridging WARN events into a project logger.
pub fn init_logger(cfg: &DiagnosticsConfig, bridge: Option<WarningBridge>) -> anyhow::Result<()> {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(cfg.color)
                .with_level(true)
                .with_target(true)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(bridge)
        .try_init()?;

    Ok(())
}

// Convenience logging macros. Each takes a logger and `format!` arguments;
// the call site is the macro invocation.
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $($arg:tt)*) => {
        $logger.trace(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warning(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $($arg:tt)*) => {
        $logger.critical(format!($($arg)*))
    };
}
