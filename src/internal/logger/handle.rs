// src/internal/logger/handle.rs

use std::error::Error;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::warn;

use super::filter::{Flow, Interceptor, NamedPrefix};
use super::level::Level;
use super::record::{CallSite, Extra, Record};
use super::sinks::Sink;
use super::LogError;

/// Threshold, interceptors and sinks of one opened logger.
pub struct Pipeline {
    level: Level,
    interceptors: Vec<Box<dyn Interceptor>>,
    sinks: Vec<Box<dyn Sink>>,
    file_path: Option<PathBuf>,
    session_tag: Option<String>,
}

impl Pipeline {
    pub fn new(level: Level) -> Self {
        Self {
            level,
            interceptors: Vec::new(),
            sinks: Vec::new(),
            file_path: None,
            session_tag: None,
        }
    }

    pub fn with_interceptor(mut self, stage: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Box::new(stage));
        self
    }

    pub fn with_sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_session_tag(mut self, tag: impl Into<String>) -> Self {
        self.session_tag = Some(tag.into());
        self
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn sink_kinds(&self) -> Vec<&'static str> {
        self.sinks.iter().map(|s| s.kind()).collect()
    }

    /// Every sink is attempted; the first failure is returned.
    fn deliver(&self, record: &mut Record) -> Result<(), LogError> {
        if record.level < self.level {
            return Ok(());
        }
        for stage in &self.interceptors {
            if stage.intercept(record) == Flow::Drop {
                return Ok(());
            }
        }

        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(record) {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            if let Err(e) = sink.flush() {
                warn!(sink = sink.kind(), error = %e, "failed to flush sink");
            }
        }
    }
}

type Slot = Arc<RwLock<Option<Arc<Pipeline>>>>;

/// A named logger.
///
/// Clones share the same pipeline slot, so reopening a logger with fresh
/// sinks is seen by every clone, including prefixed and forwarding views.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    front: Vec<Arc<dyn Interceptor>>,
    slot: Slot,
}

impl Logger {
    pub fn new(name: &str, pipeline: Pipeline) -> Self {
        Self {
            name: Arc::from(name),
            front: Vec::new(),
            slot: Arc::new(RwLock::new(Some(Arc::new(pipeline)))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn pipeline(&self) -> Option<Arc<Pipeline>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_open(&self) -> bool {
        self.pipeline().is_some()
    }

    pub fn level(&self) -> Option<Level> {
        self.pipeline().map(|p| p.level())
    }

    pub fn is_enabled_for(&self, level: Level) -> bool {
        self.level().is_some_and(|threshold| level >= threshold)
    }

    pub fn sink_kinds(&self) -> Vec<&'static str> {
        self.pipeline().map(|p| p.sink_kinds()).unwrap_or_default()
    }

    pub fn file_path(&self) -> Option<PathBuf> {
        self.pipeline().and_then(|p| p.file_path.clone())
    }

    pub fn session_tag(&self) -> Option<String> {
        self.pipeline().and_then(|p| p.session_tag.clone())
    }

    /// Flushes and drops the current sinks. Returns false if already closed.
    pub fn close(&self) -> bool {
        let old = self
            .slot
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match old {
            Some(pipeline) => {
                pipeline.flush();
                true
            }
            None => false,
        }
    }

    /// Closes the current sinks, if any, and installs `pipeline`.
    pub fn reopen(&self, pipeline: Pipeline) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(old) = slot.take() {
            old.flush();
        }
        *slot = Some(Arc::new(pipeline));
    }

    /// A view of this logger with `stage` run before the pipeline.
    pub fn with_interceptor(&self, stage: impl Interceptor + 'static) -> Logger {
        let mut view = self.clone();
        view.front.push(Arc::new(stage));
        view
    }

    /// A view that prefixes every message with `(sub_name) `.
    ///
    /// The prefix is applied ahead of the stages of the view it was taken
    /// from, so a forwarder sees the same message the sinks do.
    pub fn sub(&self, sub_name: &str) -> Logger {
        let mut view = self.clone();
        view.front.insert(0, Arc::new(NamedPrefix::new(sub_name)));
        view
    }

    pub fn emit(&self, mut record: Record) -> Result<(), LogError> {
        let pipeline = self
            .pipeline()
            .ok_or_else(|| LogError::Closed(self.name.to_string()))?;
        for stage in &self.front {
            if stage.intercept(&mut record) == Flow::Drop {
                return Ok(());
            }
        }
        pipeline.deliver(&mut record)
    }

    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> Result<(), LogError> {
        self.log_with(level, message, Extra::default())
    }

    #[track_caller]
    pub fn log_with(
        &self,
        level: Level,
        message: impl Into<String>,
        extra: Extra,
    ) -> Result<(), LogError> {
        let record = Record::new(level, self.name(), message, CallSite::caller()).with_extra(extra);
        self.emit(record)
    }

    #[track_caller]
    pub fn trace(&self, message: impl Into<String>) {
        self.report(self.log(Level::Trace, message));
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) {
        self.report(self.log(Level::Debug, message));
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) {
        self.report(self.log(Level::Info, message));
    }

    #[track_caller]
    pub fn warning(&self, message: impl Into<String>) {
        self.report(self.log(Level::Warning, message));
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) {
        self.report(self.log(Level::Error, message));
    }

    #[track_caller]
    pub fn critical(&self, message: impl Into<String>) {
        self.report(self.log(Level::Critical, message));
    }

    /// Logs at ERROR with the error and its source chain as the traceback.
    #[track_caller]
    pub fn exception<E>(&self, message: impl Into<String>, error: &E)
    where
        E: Error + ?Sized,
    {
        let record = Record::new(Level::Error, self.name(), message, CallSite::caller())
            .with_traceback(render_error_chain(error));
        self.report(self.emit(record));
    }

    fn report(&self, result: Result<(), LogError>) {
        match result {
            Ok(()) | Err(LogError::Closed(_)) => {}
            Err(e) => warn!(logger = %self.name, error = %e, "failed to deliver log record"),
        }
    }
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level())
            .field("sinks", &self.sink_kinds())
            .finish()
    }
}

/// `error` followed by an indented `Caused by:` list of its sources.
pub fn render_error_chain<E: Error + ?Sized>(error: &E) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    if source.is_some() {
        out.push_str("\nCaused by:");
    }
    while let Some(cause) = source {
        let _ = write!(out, "\n    {}", cause);
        source = cause.source();
    }
    out
}

type Callback = Box<dyn Fn(&str) + Send + Sync>;

/// Formats progress messages through a `{}` template and hands them to a
/// callback, defaulting to the logger's `info`.
pub struct LogCallback {
    logger: Logger,
    template: String,
    callback: Option<Callback>,
}

impl LogCallback {
    pub fn new(logger: Logger, template: impl Into<String>) -> Self {
        Self {
            logger,
            template: template.into(),
            callback: None,
        }
    }

    pub fn with_callback(mut self, callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn format(&self, message: &str) -> String {
        self.template.replace("{}", message)
    }

    #[track_caller]
    pub fn call(&self, message: &str) {
        let formatted = self.format(message);
        match &self.callback {
            Some(callback) => callback(&formatted),
            None => self.logger.info(formatted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::internal::logger::filter::SourceAttribution;
    use crate::internal::logger::format::Formatter;
    use crate::internal::logger::mock::SharedBuffer;
    use crate::internal::logger::paths::ProjectPaths;
    use crate::internal::logger::sinks::ConsoleSink;
    use std::sync::Mutex;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;

    fn console_logger(level: Level, buffer: &SharedBuffer) -> Logger {
        let sink = ConsoleSink::new(
            Arc::new(BoxMakeWriter::new(buffer.clone())),
            Formatter::new("[%(levelname)s] %(message)s (%(source)s)"),
        )
        .with_threshold(Level::Trace);
        let pipeline = Pipeline::new(level)
            .with_interceptor(SourceAttribution::new(ProjectPaths::new("/nowhere")))
            .with_sink(sink);
        Logger::new("cfme", pipeline)
    }

    #[test]
    fn test_threshold_filters() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Info, &buffer);

        logger.debug("hidden");
        logger.info("shown");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[INFO] shown ("));
    }

    #[test]
    fn test_call_site_is_the_caller() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Trace, &buffer);

        let line = line!() + 1;
        logger.trace("here");

        assert_eq!(
            buffer.lines()[0],
            format!("[TRACE] here ({}:{})", file!(), line)
        );
    }

    #[test]
    fn test_sub_logger_prefix_and_trace() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Trace, &buffer);
        let sub = logger.sub("ssh");

        sub.trace("connected");
        sub.error("dropped");

        let lines = buffer.lines();
        assert!(lines[0].starts_with("[TRACE] (ssh) connected"));
        assert!(lines[1].starts_with("[ERROR] (ssh) dropped"));
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Interceptor for Recorder {
        fn intercept(&self, record: &mut Record) -> Flow {
            self.0.lock().unwrap().push(record.message.clone());
            Flow::Continue
        }
    }

    #[test]
    fn test_sub_prefix_runs_before_existing_stages() {
        let buffer = SharedBuffer::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let logger = console_logger(Level::Info, &buffer)
            .with_interceptor(Recorder(seen.clone()))
            .sub("ssh")
            .sub("retry");

        logger.info("connected");

        assert_eq!(*seen.lock().unwrap(), vec!["(ssh) (retry) connected".to_string()]);
        assert!(buffer.contents().starts_with("[INFO] (ssh) (retry) connected"));
    }

    #[test]
    fn test_closed_logger_rejects_records() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Info, &buffer);

        assert!(logger.close());
        assert!(!logger.close());
        assert!(matches!(logger.log(Level::Info, "x"), Err(LogError::Closed(_))));
        logger.info("silently dropped");
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_reopen_is_seen_by_views() {
        let first = SharedBuffer::new();
        let second = SharedBuffer::new();
        let logger = console_logger(Level::Info, &first);
        let sub = logger.sub("ui");

        let pipeline = Pipeline::new(Level::Info).with_sink(
            ConsoleSink::new(
                Arc::new(BoxMakeWriter::new(second.clone())),
                Formatter::new("%(message)s"),
            )
            .with_threshold(Level::Trace),
        );
        logger.reopen(pipeline);
        sub.info("after");

        assert!(first.contents().is_empty());
        assert_eq!(second.contents(), "(ui) after\n");
    }

    #[derive(Debug, thiserror::Error)]
    #[error("connection refused")]
    struct Refused;

    #[derive(Debug, thiserror::Error)]
    #[error("ssh command failed")]
    struct SshFailed(#[source] Refused);

    #[test]
    fn test_exception_carries_error_chain() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Info, &buffer);

        logger.exception("command crashed", &SshFailed(Refused));

        let contents = buffer.contents();
        assert!(contents.starts_with("[ERROR] command crashed ("));
        assert!(contents.contains("\nssh command failed\nCaused by:\n    connection refused"));
    }

    #[test]
    fn test_log_callback_default_and_custom() {
        let buffer = SharedBuffer::new();
        let logger = console_logger(Level::Info, &buffer);

        LogCallback::new(logger.clone(), "Appliance: {}").call("rebooting");
        assert!(buffer.contents().starts_with("[INFO] Appliance: rebooting"));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        LogCallback::new(logger, "[{}]")
            .with_callback(move |msg| sink.lock().unwrap().push(msg.to_string()))
            .call("ok");
        assert_eq!(*seen.lock().unwrap(), vec!["[ok]".to_string()]);
    }
}
