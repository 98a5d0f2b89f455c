use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map, Value};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::internal::logger::Level;

// Version information from build script - using option_env! for safety
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version information
pub fn get_version_info() -> String {
    let build_timestamp = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown");
    let build_date = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let rustc_semver = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");
    let cargo_target_triple = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");

    format!(
        "cfme-log version {}\n\
         Built: {} ({})\n\
         Rust: {}\n\
         Target: {}",
        VERSION, build_date, build_timestamp, rustc_semver, cargo_target_triple
    )
}

pub const DEFAULT_FILE_FORMAT: &str = "%(asctime)-15s [%(levelname).1s] %(message)s (%(source)s)";
pub const DEFAULT_STREAM_FORMAT: &str = "[%(levelname)s] %(message)s (%(source)s)";

/// Option names understood in the `logging` section. A logger may not be
/// named after one of these, since its override block would shadow them.
pub const RECOGNIZED_KEYS: [&str; 6] = [
    "level",
    "max_file_size",
    "max_file_backups",
    "errors_to_console",
    "file_format",
    "stream_format",
];

pub fn is_reserved_name(name: &str) -> bool {
    RECOGNIZED_KEYS.contains(&name)
}

/// Fully resolved options for one named logger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggerConfig {
    pub level: Level,
    /// Bytes before the file is rotated; 0 disables rotation
    pub max_file_size: u64,
    pub max_file_backups: usize,
    /// Mirror ERROR and above to stderr
    pub errors_to_console: bool,
    pub file_format: String,
    pub stream_format: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            max_file_size: 0,
            max_file_backups: 0,
            errors_to_console: false,
            file_format: DEFAULT_FILE_FORMAT.to_string(),
            stream_format: DEFAULT_STREAM_FORMAT.to_string(),
        }
    }
}

impl LoggerConfig {
    /// Defaults, then the global `logging` keys, then the `logging.<name>`
    /// block, each layer overriding the previous one key by key.
    pub fn resolve(logging: &Map<String, Value>, name: &str) -> Self {
        let mut conf = Self::default();
        conf.apply(logging);
        if let Some(block) = logging.get(name) {
            match block.clone().into_table() {
                Ok(table) => conf.apply(&table),
                Err(e) => warn!(logger = name, error = %e, "ignoring non-table logger override"),
            }
        }
        conf
    }

    fn apply(&mut self, table: &Map<String, Value>) {
        for (key, value) in table {
            match key.as_str() {
                "level" => match value.clone().into_string().ok().and_then(|s| s.parse::<Level>().ok()) {
                    Some(level) => self.level = level,
                    None => warn!(value = %value, "ignoring malformed logging.level"),
                },
                "max_file_size" => match value.clone().into_int() {
                    Ok(n) if n >= 0 => self.max_file_size = n as u64,
                    _ => warn!(value = %value, "ignoring malformed logging.max_file_size"),
                },
                "max_file_backups" => match value.clone().into_int() {
                    Ok(n) if n >= 0 => self.max_file_backups = n as usize,
                    _ => warn!(value = %value, "ignoring malformed logging.max_file_backups"),
                },
                "errors_to_console" => match value.clone().into_bool() {
                    Ok(flag) => self.errors_to_console = flag,
                    Err(_) => warn!(value = %value, "ignoring malformed logging.errors_to_console"),
                },
                "file_format" => match value.clone().into_string() {
                    Ok(fmt) => self.file_format = fmt,
                    Err(_) => warn!(value = %value, "ignoring malformed logging.file_format"),
                },
                "stream_format" => match value.clone().into_string() {
                    Ok(fmt) => self.stream_format = fmt,
                    Err(_) => warn!(value = %value, "ignoring malformed logging.stream_format"),
                },
                // per-logger blocks and unknown keys
                _ => {}
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyslogSettings {
    pub address: String,
    pub port: u16,
}

/// The process's own `tracing` output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    #[serde(default = "default_diagnostics_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub color: bool,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            level: default_diagnostics_level(),
            color: default_true(),
        }
    }
}

fn default_diagnostics_level() -> String {
    "warn".to_string()
}
fn default_true() -> bool {
    true
}

/// Environment configuration relevant to logging.
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    pub logging: Map<String, Value>,
    pub syslog: Option<SyslogSettings>,
    pub log_dir: Option<PathBuf>,
    pub project_root: Option<PathBuf>,
    pub diagnostics: DiagnosticsConfig,
}

impl LogSettings {
    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("logging.level", "INFO")?
            .set_default("logging.max_file_size", 0)?
            .set_default("logging.max_file_backups", 0)?
            .set_default("logging.errors_to_console", false)?
            .set_default("logging.file_format", DEFAULT_FILE_FORMAT)?
            .set_default("logging.stream_format", DEFAULT_STREAM_FORMAT)?
            .set_default("diagnostics.level", "warn")?
            .set_default("diagnostics.color", true)
    }

    /// Loads `env.yaml` and `env.local.yaml` from `conf_dir`, then
    /// `CFME_LOG_*` environment variables (`__` separates nested keys).
    pub fn load(conf_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let conf_dir = conf_dir.as_ref();
        let config = Self::builder()?
            // Load config files in order of precedence
            .add_source(File::with_name(&conf_dir.join("env").to_string_lossy()).required(false))
            .add_source(File::with_name(&conf_dir.join("env.local").to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("CFME_LOG")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self::from_config(&config))
    }

    /// Settings from a YAML document, without touching the filesystem.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config = Self::builder()?
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(Self::from_config(&config))
    }

    pub fn from_config(config: &Config) -> Self {
        let logging = config.get_table("logging").unwrap_or_default();

        let syslog = match config.get::<SyslogSettings>("syslog") {
            Ok(settings) => Some(settings),
            Err(ConfigError::NotFound(_)) => None,
            Err(e) => {
                warn!(error = %e, "ignoring malformed syslog settings");
                None
            }
        };

        let diagnostics = config
            .get::<DiagnosticsConfig>("diagnostics")
            .unwrap_or_default();

        Self {
            logging,
            syslog,
            log_dir: config.get_string("log_dir").ok().map(PathBuf::from),
            project_root: config.get_string("project_root").ok().map(PathBuf::from),
            diagnostics,
        }
    }

    pub fn logger_config(&self, name: &str) -> LoggerConfig {
        LoggerConfig::resolve(&self.logging, name)
    }

    pub fn with_syslog(mut self, syslog: Option<SyslogSettings>) -> Self {
        self.syslog = syslog;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}
