//! Shared setup for the logging integration tests

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use cfme_log::internal::config::LogSettings;
use cfme_log::internal::logger::LogContext;
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Console capture that does not depend on the `test-utils` feature
#[derive(Clone, Default)]
pub struct Captured {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Captured {
    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.bytes.lock().unwrap())
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A logging context rooted in a fresh temporary directory
pub struct TestEnv {
    pub dir: TempDir,
    pub ctx: LogContext,
    pub console: Captured,
}

impl TestEnv {
    pub fn new(yaml: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let console = Captured::default();
        let settings = LogSettings::from_yaml_str(yaml).expect("settings");
        let ctx = LogContext::new(settings)
            .with_project_root(dir.path())
            .with_log_dir(dir.path().join("log"))
            .with_console_writer(console.clone());
        Self { dir, ctx, console }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.dir.path().join("log").join(format!("{}.log", name))
    }

    pub fn read_log(&self, name: &str) -> Vec<String> {
        std::fs::read_to_string(self.log_file(name))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }
}
