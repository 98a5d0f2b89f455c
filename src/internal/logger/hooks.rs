// src/internal/logger/hooks.rs

//! Process-wide capture of panics and `tracing` warnings into a [`Logger`].

use std::backtrace::Backtrace;
use std::fmt;
use std::io::Write;
use std::panic;
use std::sync::{Once, OnceLock, PoisonError, RwLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, Layer};

use super::handle::Logger;
use super::level::Level;
use super::paths::ProjectPaths;
use super::record::Extra;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

static PANIC_HOOK: Once = Once::new();
static PANIC_TARGET: OnceLock<RwLock<Option<Logger>>> = OnceLock::new();

fn panic_target() -> &'static RwLock<Option<Logger>> {
    PANIC_TARGET.get_or_init(|| RwLock::new(None))
}

/// Routes unhandled panics to `logger`.
///
/// The hook is installed once per process and chains to whatever hook was
/// installed before it. Later calls only change the target logger.
pub fn install_panic_hook(logger: &Logger) {
    *panic_target()
        .write()
        .unwrap_or_else(PoisonError::into_inner) = Some(logger.clone());

    PANIC_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let target = panic_target()
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();

            if let Some(logger) = target {
                let payload = if let Some(s) = info.payload().downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = info.payload().downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Box<dyn Any>".to_string()
                };

                let mut extra = Extra::new();
                if let Some(location) = info.location() {
                    extra = extra.origin(location.file(), Some(location.line()));
                }
                let summary = format!("Unhandled panic: {}", payload);
                let backtrace = Backtrace::force_capture().to_string();
                for message in [summary, backtrace] {
                    if let Err(e) = logger.log_with(Level::Error, message, extra.clone()) {
                        eprintln!("[ERROR] failed to log panic: {}", e);
                    }
                }
            }

            previous(info);
        }));
    });
}

#[derive(Default)]
struct WarningVisitor {
    message: Option<String>,
    category: Option<String>,
}

impl Visit for WarningVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = Some(value.to_string()),
            "category" => self.category = Some(value.to_string()),
            _ => {}
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = Some(format!("{:?}", value)),
            "category" => self.category = Some(format!("{:?}", value)),
            _ => {}
        }
    }
}

/// `tracing` layer that copies WARN events raised inside the project into
/// a [`Logger`] as `<Category> from <file>:<line>: <message>`.
///
/// Lines the logger refuses go to the fallback writer (stderr by default)
/// as `[WARNING] <line>`.
pub struct WarningBridge {
    logger: Logger,
    paths: ProjectPaths,
    fallback: BoxMakeWriter,
}

impl WarningBridge {
    pub fn new(logger: Logger, paths: ProjectPaths) -> Self {
        Self {
            logger,
            paths,
            fallback: BoxMakeWriter::new(std::io::stderr),
        }
    }

    pub fn with_fallback_writer<M>(mut self, writer: M) -> Self
    where
        M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
    {
        self.fallback = BoxMakeWriter::new(writer);
        self
    }

    /// The line to log for a warning, or `None` when it was raised outside
    /// the project.
    pub fn render(
        &self,
        file: Option<&str>,
        line: Option<u32>,
        category: &str,
        message: &str,
    ) -> Option<(String, String)> {
        let relpath = self.paths.project_relative(file?)?;
        let formatted = format!(
            "{} from {}:{}: {}",
            category,
            relpath,
            line.unwrap_or(0),
            message
        );
        Some((relpath, formatted))
    }
}

impl<S> Layer<S> for WarningBridge
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if Level::from(*metadata.level()) != Level::Warning
            || metadata.target().starts_with(OWN_TARGET)
        {
            return;
        }
        // open but filtering warnings out
        if self.logger.is_open() && !self.logger.is_enabled_for(Level::Warning) {
            return;
        }

        let mut visitor = WarningVisitor::default();
        event.record(&mut visitor);
        let category = visitor
            .category
            .unwrap_or_else(|| metadata.target().to_string());
        let message = visitor.message.unwrap_or_default();

        let Some((relpath, formatted)) =
            self.render(metadata.file(), metadata.line(), &category, &message)
        else {
            return;
        };

        let extra = Extra::new().origin(relpath, metadata.line());
        if self.logger.log_with(Level::Warning, formatted.clone(), extra).is_err() {
            let mut writer = self.fallback.make_writer();
            let _ = writeln!(writer, "[WARNING] {}", formatted);
        }
    }
}
