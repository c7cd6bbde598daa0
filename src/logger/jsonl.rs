//! Activity log: one JSON object per line, appended.
//!
//! Lines are built in memory and handed to a single `write_all`, so a reader
//! tailing the file never sees half a record. When a file cannot be written
//! the writer steps down the sink chain:
//!
//! 1. primary path
//! 2. fallback path
//! 3. stderr, each line prefixed with `[RPT-JSONL]`
//! 4. discard
//!
//! Loading a report never fails because its activity log did.

#![allow(missing_docs)]

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::errors::{ReportError, Result};

const BUFFER_BYTES: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// What the session records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ReportLoaded,
    IntegrityViolation,
    SelectionTruncated,
    StaleLoadDiscarded,
    LoadFailed,
    ConfigLoaded,
}

/// One log line. Only `ts`, `event` and `severity` are always present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// RFC 3339 UTC timestamp, millisecond precision.
    pub ts: String,
    pub event: EventType,
    pub severity: Severity,
    /// Load generation the event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Integrity violation label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
    /// Selection path after the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    /// Nodes changed, added or removed against the previous load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed: Option<usize>,
    /// Hex subtree fingerprint of the loaded root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl LogEntry {
    #[must_use]
    pub fn new(event: EventType, severity: Severity) -> Self {
        Self {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            severity,
            generation: None,
            uid: None,
            diagnostic: None,
            selection: None,
            passed: None,
            failed: None,
            changed: None,
            root_hash: None,
            error_code: None,
            details: None,
        }
    }
}

/// Where lines currently go, in degradation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSink {
    Primary,
    Fallback,
    Stderr,
    Discard,
}

impl LogSink {
    #[must_use]
    pub const fn is_degraded(self) -> bool {
        !matches!(self, Self::Primary)
    }

    const fn next(self) -> Self {
        match self {
            Self::Primary => Self::Fallback,
            Self::Fallback => Self::Stderr,
            Self::Stderr | Self::Discard => Self::Discard,
        }
    }
}

/// Writer settings; built from `[logging]` by `LoggingConfig::jsonl_config`.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    pub path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    /// Rotate once the current file would grow past this.
    pub max_size_bytes: u64,
    /// Rotated generations kept as `<path>.1` .. `<path>.N`.
    pub max_rotated_files: u32,
    pub fsync_interval_secs: u64,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("report-tree.jsonl"),
            fallback_path: Some(std::env::temp_dir().join("report-tree.jsonl")),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
            fsync_interval_secs: 10,
        }
    }
}

/// Appending JSONL writer with rotation and a degrading sink chain.
#[derive(Debug)]
pub struct JsonlWriter {
    config: JsonlConfig,
    file: Option<BufWriter<File>>,
    sink: LogSink,
    /// Size of the file behind `file`, including buffered bytes.
    size: u64,
    last_sync: Instant,
}

impl JsonlWriter {
    /// Open the primary path, stepping down the chain as needed.
    #[must_use]
    pub fn open(config: JsonlConfig) -> Self {
        let mut writer = Self {
            config,
            file: None,
            sink: LogSink::Discard,
            size: 0,
            last_sync: Instant::now(),
        };
        writer.attach(LogSink::Primary);
        writer
    }

    #[must_use]
    pub const fn sink(&self) -> LogSink {
        self.sink
    }

    pub fn write_entry(&mut self, entry: &LogEntry) {
        match serde_json::to_string(entry) {
            Ok(mut line) => {
                line.push('\n');
                self.emit(&line);
            }
            Err(e) => notice(format_args!("cannot encode {:?} entry: {e}", entry.event)),
        }
    }

    pub fn flush(&mut self) {
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
        }
    }

    /// Move back to the primary path if it has become writable again.
    /// Returns whether the writer is on the primary path afterwards.
    pub fn recover(&mut self) -> bool {
        if !self.sink.is_degraded() {
            return true;
        }
        let Ok((file, size)) = open_append(&self.config.path) else {
            return false;
        };
        self.flush();
        self.file = Some(BufWriter::with_capacity(BUFFER_BYTES, file));
        self.size = size;
        self.sink = LogSink::Primary;
        notice(format_args!(
            "back on primary path {}",
            self.config.path.display()
        ));
        true
    }

    fn path_of(&self, sink: LogSink) -> Option<&Path> {
        match sink {
            LogSink::Primary => Some(&self.config.path),
            LogSink::Fallback => self.config.fallback_path.as_deref(),
            LogSink::Stderr | LogSink::Discard => None,
        }
    }

    /// Settle on the first usable sink at or after `from`.
    fn attach(&mut self, from: LogSink) {
        self.file = None;
        let mut sink = from;
        while matches!(sink, LogSink::Primary | LogSink::Fallback) {
            if let Some(path) = self.path_of(sink).map(Path::to_path_buf) {
                if let Ok((file, size)) = open_append(&path) {
                    if sink == LogSink::Fallback {
                        notice(format_args!("using fallback path {}", path.display()));
                    }
                    self.file = Some(BufWriter::with_capacity(BUFFER_BYTES, file));
                    self.size = size;
                    self.sink = sink;
                    return;
                }
            }
            sink = sink.next();
        }
        if sink == LogSink::Stderr {
            notice(format_args!("no writable log file, writing to stderr"));
        }
        self.sink = sink;
    }

    fn emit(&mut self, line: &str) {
        let len = line.len() as u64;
        if self.file.is_some() && self.size + len > self.config.max_size_bytes {
            self.rotate();
        }

        match self.sink {
            LogSink::Primary | LogSink::Fallback => {
                let written = self
                    .file
                    .as_mut()
                    .is_some_and(|file| file.write_all(line.as_bytes()).is_ok());
                if written {
                    self.size += len;
                    self.sync_if_due();
                } else {
                    self.attach(self.sink.next());
                    self.emit(line);
                }
            }
            LogSink::Stderr => {
                if write!(io::stderr(), "[RPT-JSONL] {line}").is_err() {
                    self.sink = LogSink::Discard;
                }
            }
            LogSink::Discard => {}
        }
    }

    fn sync_if_due(&mut self) {
        let interval = Duration::from_secs(self.config.fsync_interval_secs);
        if self.last_sync.elapsed() < interval {
            return;
        }
        if let Some(file) = self.file.as_mut() {
            let _ = file.flush();
            let _ = file.get_ref().sync_data();
        }
        self.last_sync = Instant::now();
    }

    /// `<path>` becomes `<path>.1`, older generations shift up, the oldest
    /// beyond `max_rotated_files` is dropped.
    fn rotate(&mut self) {
        let Some(base) = self.path_of(self.sink).map(Path::to_path_buf) else {
            return;
        };
        self.flush();
        self.file = None;

        let keep = self.config.max_rotated_files;
        let _ = fs::remove_file(rotated_name(&base, keep));
        for generation in (1..keep).rev() {
            let _ = fs::rename(
                rotated_name(&base, generation),
                rotated_name(&base, generation + 1),
            );
        }
        let _ = fs::rename(&base, rotated_name(&base, 1));

        match open_append(&base) {
            Ok((file, _)) => {
                self.file = Some(BufWriter::with_capacity(BUFFER_BYTES, file));
                self.size = 0;
            }
            Err(_) => self.attach(self.sink.next()),
        }
    }
}

impl Drop for JsonlWriter {
    fn drop(&mut self) {
        self.flush();
    }
}

fn notice(message: fmt::Arguments<'_>) {
    let _ = writeln!(io::stderr(), "[RPT-JSONL] {message}");
}

/// Open `path` for appending, creating parent directories.
fn open_append(path: &Path) -> Result<(File, u64)> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ReportError::io(parent, source))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ReportError::io(path, source))?;
    let size = file.metadata().map_or(0, |meta| meta.len());
    Ok((file, size))
}

/// `activity.jsonl` → `activity.jsonl.2`.
fn rotated_name(base: &Path, generation: u32) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(format!(".{generation}"));
    PathBuf::from(name)
}
