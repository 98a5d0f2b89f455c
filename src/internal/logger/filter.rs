// src/internal/logger/filter.rs

use super::paths::ProjectPaths;
use super::record::{format_source, Record};

/// Whether a record continues down the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Drop,
}

/// A pipeline stage that may rewrite a record before it reaches the sinks.
pub trait Interceptor: Send + Sync {
    fn intercept(&self, record: &mut Record) -> Flow;
}

/// Resolves the `source` attribute of every record.
///
/// Caller-supplied provenance wins over the captured call site. Never drops.
pub struct SourceAttribution {
    paths: ProjectPaths,
}

impl SourceAttribution {
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }
}

impl Interceptor for SourceAttribution {
    fn intercept(&self, record: &mut Record) -> Flow {
        let source = match &record.origin {
            Some(origin) => format_source(&self.paths.relativize(&origin.file), origin.lineno),
            None => format_source(
                &self.paths.relativize(&record.call_site.file),
                Some(record.call_site.line),
            ),
        };
        record.attribute(source);
        Flow::Continue
    }
}

/// Prefixes every message with `(name) `.
pub struct NamedPrefix {
    name: String,
}

impl NamedPrefix {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Interceptor for NamedPrefix {
    fn intercept(&self, record: &mut Record) -> Flow {
        record.message = format!("({}) {}", self.name, record.message);
        Flow::Continue
    }
}
