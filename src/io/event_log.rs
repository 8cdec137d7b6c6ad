//! Event log - append-only record of probe and detection events
//!
//! Events are written in JSONL format (one JSON object per line) to the file
//! specified in config. Each record is flushed as soon as it is written, so a
//! crash loses at most the line in flight.

use crate::domain::Event;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Append-only event writer
pub struct EventLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl EventLog {
    /// Open (or create) the log for appending
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();

        // Create parent directories if they don't exist
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!(path = %path.display(), "event_log_opened");
        Ok(Self { path: path.to_path_buf(), writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event and flush it
    pub fn write_event(&mut self, event: &Event) -> io::Result<()> {
        let line = event.to_json_line().map_err(io::Error::other)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        debug!(kind = %event.kind(), bytes = %line.len(), "event_written");
        Ok(())
    }

    /// Write events in order; returns how many were written
    pub fn write_events(&mut self, events: &[Event]) -> usize {
        let mut written = 0;
        for event in events {
            match self.write_event(event) {
                Ok(()) => written += 1,
                Err(e) => {
                    error!(
                        kind = %event.kind(),
                        identity = %event.identity(),
                        error = %e,
                        "event_write_failed"
                    );
                }
            }
        }
        written
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Decoded contents of an event log
#[derive(Debug, Default)]
pub struct EventLogContents {
    pub events: Vec<Event>,
    /// Lines that could not be decoded (partial writes, unknown types)
    pub skipped: usize,
}

/// Read and decode every line of an event log
pub fn read_event_log<P: AsRef<Path>>(path: P) -> io::Result<EventLogContents> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut contents = EventLogContents::default();

    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match Event::from_json_line(line) {
            Ok(event) => contents.events.push(event),
            Err(e) => {
                contents.skipped += 1;
                warn!(path = %path.display(), line = %(line_no + 1), error = %e, "event_line_skipped");
            }
        }
    }

    Ok(contents)
}
