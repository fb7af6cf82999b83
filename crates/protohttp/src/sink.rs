// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Downstream event sinks.
//!
//! A sink accepts one `(tag, time, record)` event or an ordered stream of
//! `(time, record)` pairs sharing a tag. Sinks are shared by all request
//! handlers and synchronise internally.

use crate::codec::WireMode;
use crate::config::SinkConfig;
use base64::Engine as _;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Event timestamp, nanoseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct EventTime(i64);

impl EventTime {
    /// Sample the current wall clock.
    pub fn now() -> Self {
        Self::from(Utc::now())
    }

    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    pub fn as_nanos(&self) -> i64 {
        self.0
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        Utc.timestamp_nanos(self.0)
    }
}

impl From<DateTime<Utc>> for EventTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_nanos_opt().unwrap_or_default())
    }
}

/// Emitted record: the re-encoded message payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub message: Bytes,
}

impl Record {
    pub fn new(message: impl Into<Bytes>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Ordered `(time, record)` pairs emitted as one unit.
pub type EventStream = Vec<(EventTime, Record)>;

/// Downstream event pipeline.
pub trait EventSink: Send + Sync {
    /// Emit a single event.
    fn emit_one(&self, tag: &str, time: EventTime, record: Record);

    /// Emit an ordered stream of events sharing `tag`.
    fn emit_batch(&self, tag: &str, stream: EventStream);
}

/// One `emit_one` or `emit_batch` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub tag: String,
    pub stream: EventStream,
    pub batch: bool,
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Keeps every emission in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    emissions: Mutex<Vec<Emission>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Emissions in arrival order.
    pub fn emissions(&self) -> Vec<Emission> {
        self.emissions
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// All records, flattened in arrival order.
    pub fn records(&self) -> Vec<(String, EventTime, Record)> {
        self.emissions()
            .into_iter()
            .flat_map(|e| {
                let tag = e.tag;
                e.stream
                    .into_iter()
                    .map(move |(time, record)| (tag.clone(), time, record))
            })
            .collect()
    }

    fn push(&self, emission: Emission) {
        if let Ok(mut emissions) = self.emissions.lock() {
            emissions.push(emission);
        }
    }
}

impl EventSink for MemorySink {
    fn emit_one(&self, tag: &str, time: EventTime, record: Record) {
        self.push(Emission {
            tag: tag.to_string(),
            stream: vec![(time, record)],
            batch: false,
        });
    }

    fn emit_batch(&self, tag: &str, stream: EventStream) {
        self.push(Emission {
            tag: tag.to_string(),
            stream,
            batch: true,
        });
    }
}

// ---------------------------------------------------------------------------
// ChannelSink
// ---------------------------------------------------------------------------

/// Forwards emissions to a pipeline task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Emission>,
}

impl ChannelSink {
    /// Create the sink and the receiving end for the pipeline.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Emission>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, emission: Emission) {
        let tag = emission.tag.clone();
        if self.tx.send(emission).is_err() {
            tracing::error!("Pipeline closed, dropping events [tag: {}]", tag);
        }
    }
}

impl EventSink for ChannelSink {
    fn emit_one(&self, tag: &str, time: EventTime, record: Record) {
        self.send(Emission {
            tag: tag.to_string(),
            stream: vec![(time, record)],
            batch: false,
        });
    }

    fn emit_batch(&self, tag: &str, stream: EventStream) {
        self.send(Emission {
            tag: tag.to_string(),
            stream,
            batch: true,
        });
    }
}

// ---------------------------------------------------------------------------
// WriterSink
// ---------------------------------------------------------------------------

/// Line-oriented destination.
pub trait LineOutput: Send {
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Stdout destination.
pub struct StdoutOutput {
    handle: io::Stdout,
}

impl StdoutOutput {
    pub fn new() -> Self {
        Self {
            handle: io::stdout(),
        }
    }
}

impl Default for StdoutOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl LineOutput for StdoutOutput {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        writeln!(self.handle, "{}", line)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.handle.flush()
    }
}

/// File destination rotated by size: `events.log` -> `events.1.log` -> ...
pub struct FileOutput {
    path: PathBuf,
    writer: BufWriter<File>,
    max_size: u64,
    max_files: u32,
    current_size: u64,
}

impl FileOutput {
    pub fn open(path: impl AsRef<Path>, max_size: u64, max_files: u32) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let current_size = file.metadata()?.len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            max_size,
            max_files,
            current_size,
        })
    }

    fn maybe_rotate(&mut self) -> io::Result<()> {
        if self.current_size < self.max_size {
            return Ok(());
        }

        self.writer.flush()?;

        // Shift .N-1 -> .N, dropping the oldest.
        for i in (1..self.max_files).rev() {
            let old_path = rotated_path(&self.path, i);
            if !old_path.exists() {
                continue;
            }
            if i + 1 >= self.max_files {
                std::fs::remove_file(&old_path)?;
            } else {
                std::fs::rename(&old_path, rotated_path(&self.path, i + 1))?;
            }
        }
        std::fs::rename(&self.path, rotated_path(&self.path, 1))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.current_size = 0;

        Ok(())
    }
}

impl LineOutput for FileOutput {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.maybe_rotate()?;

        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.current_size += line.len() as u64 + 1;

        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

fn rotated_path(base: &Path, index: u32) -> PathBuf {
    let stem = base.file_stem().unwrap_or_default().to_string_lossy();
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy())
        .unwrap_or_default();

    let new_name = if ext.is_empty() {
        format!("{}.{}", stem, index)
    } else {
        format!("{}.{}.{}", stem, index, ext)
    };

    base.with_file_name(new_name)
}

/// Writes one JSON object per event to a [`LineOutput`].
///
/// JSON payloads are embedded as text, binary payloads as base64.
pub struct WriterSink {
    output: Mutex<Box<dyn LineOutput>>,
    mode: WireMode,
    written: AtomicU64,
    errors: AtomicU64,
}

impl WriterSink {
    pub fn new(output: Box<dyn LineOutput>, mode: WireMode) -> Self {
        Self {
            output: Mutex::new(output),
            mode,
            written: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn stdout(mode: WireMode) -> Self {
        Self::new(Box::new(StdoutOutput::new()), mode)
    }

    /// Events written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Events lost to write errors.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Render one event as a JSON line.
    pub fn format_line(&self, tag: &str, time: EventTime, record: &Record) -> String {
        let message = match self.mode {
            WireMode::Json => String::from_utf8_lossy(&record.message).into_owned(),
            WireMode::Binary => base64::engine::general_purpose::STANDARD.encode(&record.message),
        };
        serde_json::json!({
            "tag": tag,
            "time": time,
            "message": message,
        })
        .to_string()
    }

    fn write_all<'a, I>(&self, tag: &str, events: I)
    where
        I: IntoIterator<Item = (EventTime, &'a Record)>,
    {
        let mut output = match self.output.lock() {
            Ok(output) => output,
            Err(poisoned) => poisoned.into_inner(),
        };

        for (time, record) in events {
            let line = self.format_line(tag, time, record);
            match output.write_line(&line) {
                Ok(()) => {
                    self.written.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::Relaxed);
                    tracing::error!("Could not write event [tag: {}]: {}", tag, e);
                }
            }
        }

        if let Err(e) = output.flush() {
            tracing::error!("Could not flush events [tag: {}]: {}", tag, e);
        }
    }
}

impl EventSink for WriterSink {
    fn emit_one(&self, tag: &str, time: EventTime, record: Record) {
        self.write_all(tag, [(time, &record)]);
    }

    fn emit_batch(&self, tag: &str, stream: EventStream) {
        self.write_all(tag, stream.iter().map(|(time, record)| (*time, record)));
    }
}

/// Create the sink described by `config`.
pub fn create_sink(config: &SinkConfig, mode: WireMode) -> io::Result<WriterSink> {
    let output: Box<dyn LineOutput> = match config {
        SinkConfig::Stdout => Box::new(StdoutOutput::new()),
        SinkConfig::File {
            path,
            max_size,
            max_files,
        } => Box::new(FileOutput::open(path, *max_size, *max_files)?),
    };
    Ok(WriterSink::new(output, mode))
}
