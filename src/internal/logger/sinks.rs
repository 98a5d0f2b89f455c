// src/internal/logger/sinks.rs

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::debug;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;

use super::format::{Formatter, TimeStyle};
use super::level::Level;
use super::record::Record;
use super::LogError;
use crate::internal::config::SyslogSettings;

/// A destination for formatted records.
pub trait Sink: Send + Sync {
    fn emit(&self, record: &Record) -> Result<(), LogError>;

    fn flush(&self) -> Result<(), LogError> {
        Ok(())
    }

    /// Short label used in diagnostics.
    fn kind(&self) -> &'static str;
}

struct FileState {
    file: File,
    size: u64,
}

/// Size-based rotating file, `name.log` -> `name.log.1` -> `name.log.2` ...
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: usize,
    formatter: Formatter,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    /// Opens `path` for appending. `max_bytes == 0` disables rotation.
    pub fn open(
        path: impl Into<PathBuf>,
        max_bytes: u64,
        backup_count: usize,
        formatter: Formatter,
    ) -> Result<Self, LogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes,
            backup_count,
            formatter,
            state: Mutex::new(FileState { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn should_rollover(&self, state: &FileState, incoming: u64) -> bool {
        self.max_bytes > 0 && state.size > 0 && state.size + incoming >= self.max_bytes
    }

    fn rollover(&self, state: &mut FileState) -> Result<(), LogError> {
        debug!(path = %self.path.display(), "rotating log file");
        state.file.flush()?;

        if self.backup_count > 0 {
            for i in (1..self.backup_count).rev() {
                let src = backup_path(&self.path, i);
                let dst = backup_path(&self.path, i + 1);
                if src.exists() {
                    if dst.exists() {
                        fs::remove_file(&dst)?;
                    }
                    fs::rename(&src, &dst)?;
                }
            }
            let first = backup_path(&self.path, 1);
            if first.exists() {
                fs::remove_file(&first)?;
            }
            fs::rename(&self.path, &first)?;
        }

        state.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        state.size = 0;
        Ok(())
    }
}

impl Sink for RotatingFileSink {
    fn emit(&self, record: &Record) -> Result<(), LogError> {
        let mut line = self.formatter.format(record);
        line.push('\n');
        let incoming = line.len() as u64;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if self.should_rollover(&state, incoming) {
            self.rollover(&mut state)?;
        }
        state.file.write_all(line.as_bytes())?;
        state.file.flush()?;
        state.size += incoming;
        Ok(())
    }

    fn flush(&self) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.file.flush()?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "file"
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// `<path>.<n>`
pub fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

/// Facility LOG_USER.
const SYSLOG_FACILITY_USER: u8 = 1;

/// Forwards records to a syslog collector over UDP.
pub struct SyslogSink {
    socket: UdpSocket,
    target: SocketAddr,
    formatter: Formatter,
    session_tag: String,
}

impl SyslogSink {
    pub fn connect(settings: &SyslogSettings, session_tag: impl Into<String>) -> Result<Self, LogError> {
        let endpoint = format!("{}:{}", settings.address, settings.port);
        let target = (settings.address.as_str(), settings.port)
            .to_socket_addrs()
            .map_err(|e| LogError::SyslogAddress(format!("{}: {}", endpoint, e)))?
            .next()
            .ok_or_else(|| LogError::SyslogAddress(endpoint.clone()))?;

        let bind_addr = if target.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.connect(target)?;

        let session_tag = session_tag.into();
        let formatter = Formatter::new(&format!("%(asctime)s [{}] %(message)s", session_tag))
            .with_time_style(TimeStyle::Syslog);

        Ok(Self {
            socket,
            target,
            formatter,
            session_tag,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }

    pub fn session_tag(&self) -> &str {
        &self.session_tag
    }

    fn frame(&self, record: &Record) -> String {
        let priority = SYSLOG_FACILITY_USER * 8 + record.level.syslog_severity();
        format!("<{}>{}\0", priority, self.formatter.format(record))
    }
}

impl Sink for SyslogSink {
    fn emit(&self, record: &Record) -> Result<(), LogError> {
        self.socket.send(self.frame(record).as_bytes())?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "syslog"
    }
}

/// Random 8-character alphanumeric tag embedded in every syslog line.
pub fn session_tag() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Mirrors records at or above a threshold to a console writer (stderr by
/// default).
pub struct ConsoleSink {
    writer: Arc<BoxMakeWriter>,
    formatter: Formatter,
    threshold: Level,
}

impl ConsoleSink {
    pub fn new(writer: Arc<BoxMakeWriter>, formatter: Formatter) -> Self {
        Self {
            writer,
            formatter,
            threshold: Level::Error,
        }
    }

    pub fn with_threshold(mut self, threshold: Level) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Sink for ConsoleSink {
    fn emit(&self, record: &Record) -> Result<(), LogError> {
        if record.level < self.threshold {
            return Ok(());
        }
        let line = self.formatter.format(record);
        let mut writer = self.writer.make_writer();
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "console"
    }
}
