// src/internal/logger/context.rs

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

use super::artifact::{ArtifactForwarder, Collector};
use super::filter::SourceAttribution;
use super::format::Formatter;
use super::handle::{Logger, Pipeline};
use super::hooks::WarningBridge;
use super::paths::ProjectPaths;
use super::perf::PerfLog;
use super::sinks::{session_tag, ConsoleSink, RotatingFileSink, SyslogSink};
use super::LogError;
use crate::internal::config::{is_reserved_name, LogSettings, LoggerConfig};

/// Main project logger.
pub const DEFAULT_LOGGER: &str = "cfme";
/// Logger used by [`PerfLog`].
pub const PERF_LOGGER: &str = "perf";

/// Per-call overrides for [`LogContext::create_logger`].
///
/// `Some(0)` is an explicit value, not a request for the configured one.
#[derive(Debug, Clone, Default)]
pub struct FileOverrides {
    pub file: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub max_file_backups: Option<usize>,
}

impl FileOverrides {
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn max_file_backups(mut self, count: usize) -> Self {
        self.max_file_backups = Some(count);
        self
    }
}

struct Registered {
    logger: Logger,
    overrides: FileOverrides,
}

/// Owns the settings, the named-logger registry and the shared performance
/// timer. Create one at the program entry point and pass it (or the loggers
/// it hands out) to whatever needs logging.
pub struct LogContext {
    settings: RwLock<LogSettings>,
    paths: ProjectPaths,
    log_dir: PathBuf,
    console: Arc<BoxMakeWriter>,
    loggers: RwLock<HashMap<String, Registered>>,
    perf: Mutex<Option<Arc<PerfLog>>>,
}

impl LogContext {
    /// The project root and log directory come from the settings when set,
    /// else the current directory and `<root>/log`.
    pub fn new(settings: LogSettings) -> Self {
        let paths = match &settings.project_root {
            Some(root) => ProjectPaths::new(root.clone()),
            None => ProjectPaths::default(),
        };
        let log_dir = settings
            .log_dir
            .clone()
            .unwrap_or_else(|| paths.root().join("log"));

        Self {
            settings: RwLock::new(settings),
            paths,
            log_dir,
            console: Arc::new(BoxMakeWriter::new(std::io::stderr)),
            loggers: RwLock::new(HashMap::new()),
            perf: Mutex::new(None),
        }
    }

    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.paths = ProjectPaths::new(root);
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    /// Writer used by console sinks created from now on (stderr by default).
    pub fn with_console_writer<M>(mut self, writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.console = Arc::new(BoxMakeWriter::new(writer));
        self
    }

    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn settings(&self) -> LogSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn logger_config(&self, name: &str) -> LoggerConfig {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .logger_config(name)
    }

    /// Builds (or rebuilds) the named logger from the current settings.
    ///
    /// An existing logger of the same name is reopened in place with the new
    /// sinks, so handles already given out keep working and no sink is ever
    /// duplicated. If the new sinks cannot be built the old ones stay live.
    pub fn create_logger(&self, name: &str, overrides: FileOverrides) -> Result<Logger, LogError> {
        if is_reserved_name(name) {
            return Err(LogError::ReservedName(name.to_string()));
        }

        let existing = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|r| r.logger.clone());

        let pipeline = self.build_pipeline(name, &overrides)?;
        let logger = match existing {
            Some(logger) => {
                logger.reopen(pipeline);
                logger
            }
            None => Logger::new(name, pipeline),
        };

        self.loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                name.to_string(),
                Registered {
                    logger: logger.clone(),
                    overrides,
                },
            );
        debug!(logger = name, sinks = ?logger.sink_kinds(), "logger created");
        Ok(logger)
    }

    fn build_pipeline(&self, name: &str, overrides: &FileOverrides) -> Result<Pipeline, LogError> {
        let settings = self.settings();
        let conf = settings.logger_config(name);

        fs::create_dir_all(&self.log_dir)?;
        let file = overrides
            .file
            .clone()
            .unwrap_or_else(|| self.log_dir.join(format!("{}.log", name)));

        let file_sink = RotatingFileSink::open(
            &file,
            overrides.max_file_size.unwrap_or(conf.max_file_size),
            overrides.max_file_backups.unwrap_or(conf.max_file_backups),
            Formatter::new(&conf.file_format),
        )?;

        let mut pipeline = Pipeline::new(conf.level)
            .with_interceptor(SourceAttribution::new(self.paths.clone()))
            .with_sink(file_sink)
            .with_file_path(&file);

        if let Some(syslog) = &settings.syslog {
            let tag = session_tag();
            pipeline = pipeline
                .with_sink(SyslogSink::connect(syslog, tag.clone())?)
                .with_session_tag(tag);
        }

        if conf.errors_to_console {
            pipeline = pipeline.with_sink(ConsoleSink::new(
                Arc::clone(&self.console),
                Formatter::new(&conf.stream_format),
            ));
        }

        Ok(pipeline)
    }

    pub fn get(&self, name: &str) -> Option<Logger> {
        self.loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(|r| r.logger.clone())
    }

    /// The registered logger, creating it with default file options if needed.
    pub fn logger(&self, name: &str) -> Result<Logger, LogError> {
        match self.get(name) {
            Some(logger) => Ok(logger),
            None => self.create_logger(name, FileOverrides::default()),
        }
    }

    /// A view of `parent_name` that prefixes every message with `(sub_name) `.
    pub fn create_sublogger(&self, sub_name: &str, parent_name: &str) -> Result<Logger, LogError> {
        Ok(self.logger(parent_name)?.sub(sub_name))
    }

    /// The main logger behind an [`ArtifactForwarder`].
    pub fn artifact_logger<C, W>(&self, collector: C, worker_id: W) -> Result<Logger, LogError>
    where
        C: Fn() -> Arc<dyn Collector> + Send + Sync + 'static,
        W: Fn() -> Option<String> + Send + Sync + 'static,
    {
        let forwarder = ArtifactForwarder::new(self.paths.clone(), collector, worker_id);
        Ok(self.logger(DEFAULT_LOGGER)?.with_interceptor(forwarder))
    }

    /// Shared timer writing to the `perf` logger.
    pub fn perflog(&self) -> Result<Arc<PerfLog>, LogError> {
        let mut perf = self.perf.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = perf.as_ref() {
            return Ok(Arc::clone(existing));
        }
        let created = Arc::new(PerfLog::new(self.logger(PERF_LOGGER)?));
        *perf = Some(Arc::clone(&created));
        Ok(created)
    }

    /// Layer routing project WARN diagnostics into the main logger.
    pub fn warning_bridge(&self) -> Result<WarningBridge, LogError> {
        Ok(WarningBridge::new(self.logger(DEFAULT_LOGGER)?, self.paths.clone()))
    }

    pub fn close_logger(&self, name: &str) -> bool {
        let removed = self
            .loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(registered) => registered.logger.close(),
            None => false,
        }
    }

    pub fn logger_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Swaps in new settings and rebuilds every registered logger.
    pub fn reload(&self, settings: LogSettings) -> Result<(), LogError> {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;

        let registered: Vec<(String, FileOverrides)> = self
            .loggers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, r)| (name.clone(), r.overrides.clone()))
            .collect();

        let mut first_error = None;
        for (name, overrides) in registered {
            if let Err(e) = self.create_logger(&name, overrides) {
                warn!(logger = %name, error = %e, "keeping previous sinks after failed reload");
                first_error.get_or_insert(e);
            }
        }
        info!(count = self.logger_names().len(), "logging configuration reloaded");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Closes every registered logger.
    pub fn shutdown(&self) {
        let drained: Vec<Registered> = self
            .loggers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, r)| r)
            .collect();
        for registered in drained {
            registered.logger.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::config::SyslogSettings;
    use crate::internal::logger::level::Level;
    use crate::internal::logger::mock::SharedBuffer;

    fn context(yaml: &str, dir: &Path) -> (LogContext, SharedBuffer) {
        let buffer = SharedBuffer::new();
        let settings = LogSettings::from_yaml_str(yaml).unwrap();
        let ctx = LogContext::new(settings)
            .with_project_root(dir)
            .with_log_dir(dir.join("log"))
            .with_console_writer(buffer.clone());
        (ctx, buffer)
    }

    #[test]
    fn test_reserved_name_is_rejected_before_any_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let err = ctx.create_logger("level", FileOverrides::default()).unwrap_err();
        assert!(matches!(err, LogError::ReservedName(name) if name == "level"));
        assert!(!dir.path().join("log").exists());
        assert!(ctx.get("level").is_none());
    }

    #[test]
    fn test_creates_dir_and_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let logger = ctx.create_logger("cfme", FileOverrides::default()).unwrap();
        assert_eq!(logger.file_path(), Some(dir.path().join("log").join("cfme.log")));
        assert_eq!(logger.sink_kinds(), vec!["file"]);
        assert!(dir.path().join("log").join("cfme.log").exists());
    }

    #[test]
    fn test_console_sink_only_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("logging:\n  errors_to_console: true\n", dir.path());

        let logger = ctx.create_logger("cfme", FileOverrides::default()).unwrap();
        assert_eq!(logger.sink_kinds(), vec!["file", "console"]);
    }

    #[test]
    fn test_sublogger_reuses_registered_parent() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let sub = ctx.create_sublogger("ssh", DEFAULT_LOGGER).unwrap();
        assert_eq!(sub.name(), DEFAULT_LOGGER);
        assert_eq!(ctx.logger_names(), vec!["cfme".to_string()]);

        ctx.create_sublogger("ui", DEFAULT_LOGGER).unwrap();
        assert_eq!(ctx.logger_names(), vec!["cfme".to_string()]);
    }

    #[test]
    fn test_perflog_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let a = ctx.perflog().unwrap();
        let b = ctx.perflog().unwrap();
        a.start("shared");
        assert!(b.is_tracking("shared"));
        assert_eq!(a.logger().name(), PERF_LOGGER);
    }

    #[test]
    fn test_syslog_sink_attached_when_configured() {
        let receiver = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings::from_yaml_str("")
            .unwrap()
            .with_syslog(Some(SyslogSettings {
                address: "127.0.0.1".to_string(),
                port: receiver.local_addr().unwrap().port(),
            }));
        let ctx = LogContext::new(settings)
            .with_project_root(dir.path())
            .with_log_dir(dir.path().join("log"));

        let logger = ctx.create_logger("cfme", FileOverrides::default()).unwrap();
        assert_eq!(logger.sink_kinds(), vec!["file", "syslog"]);
        let tag = logger.session_tag().unwrap();
        assert_eq!(tag.len(), 8);
        assert!(tag.chars().all(|c| c.is_ascii_alphanumeric()));

        logger.warning("appliance slow");

        let mut buf = [0u8; 512];
        let n = receiver.recv(&mut buf).unwrap();
        let datagram = String::from_utf8_lossy(&buf[..n]).into_owned();
        assert!(datagram.starts_with("<12>"), "got {:?}", datagram);
        assert!(datagram.ends_with(&format!("[{}] appliance slow\0", tag)));
    }

    #[test]
    fn test_failed_recreate_keeps_old_sinks() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let logger = ctx.create_logger("cfme", FileOverrides::default()).unwrap();
        logger.info("before");

        // a directory cannot be opened as the log file
        let err = ctx.create_logger("cfme", FileOverrides::default().file(dir.path().join("log")));
        assert!(matches!(err, Err(LogError::Io(_))));
        assert!(logger.is_open());

        logger.info("after");
        let content = fs::read_to_string(dir.path().join("log").join("cfme.log")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("[I] after"));
    }

    #[test]
    fn test_reload_rebuilds_all_and_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());
        let blocked = dir.path().join("perf-target.log");

        let cfme = ctx.logger("cfme").unwrap();
        let perf = ctx
            .create_logger("perf", FileOverrides::default().file(&blocked))
            .unwrap();
        fs::remove_file(&blocked).unwrap();
        fs::create_dir(&blocked).unwrap();

        let err = ctx.reload(LogSettings::from_yaml_str("logging:\n  level: DEBUG\n").unwrap());
        assert!(matches!(err, Err(LogError::Io(_))));

        assert!(perf.is_open());
        assert_eq!(perf.level(), Some(Level::Info));
        assert_eq!(cfme.level(), Some(Level::Debug));
    }

    #[test]
    fn test_close_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx, _) = context("", dir.path());

        let cfme = ctx.logger("cfme").unwrap();
        let perf = ctx.logger("perf").unwrap();
        assert!(ctx.close_logger("cfme"));
        assert!(!cfme.is_open());
        assert!(!ctx.close_logger("cfme"));

        ctx.shutdown();
        assert!(!perf.is_open());
        assert!(ctx.logger_names().is_empty());
    }
}
