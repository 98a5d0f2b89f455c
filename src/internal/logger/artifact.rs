// src/internal/logger/artifact.rs

//! Hands a copy of every log record to an external artifact collector
//! before it is logged locally.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::warn;

use super::filter::{Flow, Interceptor};
use super::paths::ProjectPaths;
use super::record::{Origin, Record};

/// Hook fired for every forwarded record.
pub const LOG_MESSAGE_HOOK: &str = "log_message";

/// Normalized record handed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub level: String,
    pub message: String,
    pub extra: Map<String, Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Collector unavailable: {0}")]
    Unavailable(String),
}

/// The external reporting backend.
pub trait Collector: Send + Sync {
    fn fire_hook(
        &self,
        hook: &str,
        record: &ArtifactRecord,
        worker_id: &str,
    ) -> Result<(), CollectorError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl Collector for NullCollector {
    fn fire_hook(&self, _: &str, _: &ArtifactRecord, _: &str) -> Result<(), CollectorError> {
        Ok(())
    }
}

#[derive(Serialize)]
struct HookLine<'a> {
    hook: &'a str,
    slaveid: &'a str,
    log_record: &'a ArtifactRecord,
}

/// Appends one JSON object per fired hook to a file.
pub struct JsonLinesCollector {
    file: Mutex<File>,
}

impl JsonLinesCollector {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl Collector for JsonLinesCollector {
    fn fire_hook(
        &self,
        hook: &str,
        record: &ArtifactRecord,
        worker_id: &str,
    ) -> Result<(), CollectorError> {
        let mut line = serde_json::to_string(&HookLine {
            hook,
            slaveid: worker_id,
            log_record: record,
        })?;
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

type CollectorSource = Box<dyn Fn() -> Arc<dyn Collector> + Send + Sync>;
type WorkerSource = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Interceptor that forwards every record to a [`Collector`].
///
/// The collector and worker id are looked up on first use and then cached
/// for the lifetime of the forwarder. Collector failures are reported and
/// swallowed so the local log line is always written.
pub struct ArtifactForwarder {
    paths: ProjectPaths,
    collector_source: CollectorSource,
    worker_source: WorkerSource,
    collector: OnceLock<Arc<dyn Collector>>,
    worker_id: OnceLock<String>,
}

impl ArtifactForwarder {
    pub fn new<C, W>(paths: ProjectPaths, collector: C, worker_id: W) -> Self
    where
        C: Fn() -> Arc<dyn Collector> + Send + Sync + 'static,
        W: Fn() -> Option<String> + Send + Sync + 'static,
    {
        Self {
            paths,
            collector_source: Box::new(collector),
            worker_source: Box::new(worker_id),
            collector: OnceLock::new(),
            worker_id: OnceLock::new(),
        }
    }

    /// Forwarder over an already-built collector.
    pub fn with_collector(paths: ProjectPaths, collector: Arc<dyn Collector>, worker_id: Option<String>) -> Self {
        Self::new(paths, move || Arc::clone(&collector), move || worker_id.clone())
    }

    fn collector(&self) -> &Arc<dyn Collector> {
        self.collector.get_or_init(|| (self.collector_source)())
    }

    fn worker_id(&self) -> &str {
        self.worker_id
            .get_or_init(|| (self.worker_source)().unwrap_or_default())
    }

    fn artifact_record(record: &Record) -> ArtifactRecord {
        let mut extra = record.fields.clone();
        if let Some(origin) = &record.origin {
            extra.insert("source_file".to_string(), Value::from(origin.file.clone()));
            extra.insert(
                "source_lineno".to_string(),
                origin.lineno.map(Value::from).unwrap_or(Value::Null),
            );
        }
        ArtifactRecord {
            level: record.level.as_lower_str().to_string(),
            message: normalize_message(&record.message),
            extra,
        }
    }
}

impl Interceptor for ArtifactForwarder {
    fn intercept(&self, record: &mut Record) -> Flow {
        if record.origin.is_none() {
            let origin = if record.call_site.file.is_empty() {
                Origin::new("unknown", Some(0))
            } else {
                Origin::new(
                    self.paths.relativize(&record.call_site.file),
                    Some(record.call_site.line),
                )
            };
            record.origin = Some(origin);
        }

        let artifact = Self::artifact_record(record);
        if let Err(e) = self
            .collector()
            .fire_hook(LOG_MESSAGE_HOOK, &artifact, self.worker_id())
        {
            warn!(logger = %record.logger, error = %e, "artifact collector rejected log record");
        }
        Flow::Continue
    }
}

/// Escapes control characters other than newline and tab.
pub fn normalize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    for c in message.chars() {
        if c.is_control() && c != '\n' && c != '\t' {
            out.extend(c.escape_default());
        } else {
            out.push(c);
        }
    }
    out
}
