// src/internal/logger/record.rs

use chrono::{DateTime, Local};
use serde_json::{Map, Value};
use std::panic::Location;

use super::level::Level;

/// File and line of the logging call expression, captured automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub file: String,
    pub line: u32,
}

impl CallSite {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }

    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&Location<'_>> for CallSite {
    fn from(location: &Location<'_>) -> Self {
        Self::new(location.file(), location.line())
    }
}

/// Caller-supplied provenance, overriding the captured call site.
///
/// A `lineno` of `None` drops the `:lineno` suffix from the resolved source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: String,
    pub lineno: Option<u32>,
}

impl Origin {
    pub fn new(file: impl Into<String>, lineno: Option<u32>) -> Self {
        Self {
            file: file.into(),
            lineno,
        }
    }
}

/// Optional data attached to a single log call.
#[derive(Debug, Clone, Default)]
pub struct Extra {
    pub origin: Option<Origin>,
    pub fields: Map<String, Value>,
}

impl Extra {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(mut self, file: impl Into<String>, lineno: Option<u32>) -> Self {
        self.origin = Some(Origin::new(file, lineno));
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// One emitted message.
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub logger: String,
    pub message: String,
    pub created: DateTime<Local>,
    pub call_site: CallSite,
    pub origin: Option<Origin>,
    pub fields: Map<String, Value>,
    pub traceback: Option<String>,
    pub thread: Option<String>,
    source: Option<String>,
}

impl Record {
    pub fn new(
        level: Level,
        logger: impl Into<String>,
        message: impl Into<String>,
        call_site: CallSite,
    ) -> Self {
        Self {
            level,
            logger: logger.into(),
            message: message.into(),
            created: Local::now(),
            call_site,
            origin: None,
            fields: Map::new(),
            traceback: None,
            thread: std::thread::current().name().map(str::to_string),
            source: None,
        }
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        if extra.origin.is_some() {
            self.origin = extra.origin;
        }
        self.fields.extend(extra.fields);
        self
    }

    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }

    /// Resolved `file:line` provenance. Before attribution has run this is
    /// the raw call site.
    pub fn source(&self) -> String {
        match &self.source {
            Some(source) => source.clone(),
            None => format_source(&self.call_site.file, Some(self.call_site.line)),
        }
    }

    /// Sets the provenance once; later calls are ignored.
    pub(crate) fn attribute(&mut self, source: String) {
        if self.source.is_none() {
            self.source = Some(source);
        }
    }
}

/// `path` alone when there is no usable line number, else `path:lineno`.
pub fn format_source(path: &str, lineno: Option<u32>) -> String {
    match lineno {
        Some(n) if n > 0 => format!("{}:{}", path, n),
        _ => path.to_string(),
    }
}
