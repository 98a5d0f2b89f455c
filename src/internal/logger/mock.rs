// src/internal/logger/mock.rs

use std::io;
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

use super::artifact::{ArtifactRecord, Collector, CollectorError};

/// In-memory writer for capturing console output in tests
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[derive(Debug, Clone)]
pub struct FiredHook {
    pub hook: String,
    pub record: ArtifactRecord,
    pub worker_id: String,
}

/// Collector that remembers every hook it was fired with
#[derive(Default)]
pub struct RecordingCollector {
    fired: Mutex<Vec<FiredHook>>,
}

impl RecordingCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> Vec<FiredHook> {
        self.fired.lock().unwrap().clone()
    }
}

impl Collector for RecordingCollector {
    fn fire_hook(
        &self,
        hook: &str,
        record: &ArtifactRecord,
        worker_id: &str,
    ) -> Result<(), CollectorError> {
        self.fired.lock().unwrap().push(FiredHook {
            hook: hook.to_string(),
            record: record.clone(),
            worker_id: worker_id.to_string(),
        });
        Ok(())
    }
}

/// Collector that always fails
#[derive(Default, Clone, Copy)]
pub struct FailingCollector;

impl Collector for FailingCollector {
    fn fire_hook(&self, _: &str, _: &ArtifactRecord, _: &str) -> Result<(), CollectorError> {
        Err(CollectorError::Unavailable("artifactor is not running".to_string()))
    }
}
