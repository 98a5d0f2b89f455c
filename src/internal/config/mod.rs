// src/internal/config/mod.rs

#[path = "_config.rs"]
pub mod config;

pub use self::config::{
    get_version_info, is_reserved_name, DiagnosticsConfig, LogSettings, LoggerConfig,
    SyslogSettings, DEFAULT_FILE_FORMAT, DEFAULT_STREAM_FORMAT, RECOGNIZED_KEYS, VERSION,
};
