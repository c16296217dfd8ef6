//! # Telemetry
//!
//! Telemetry is a stream of `(key, value)` samples produced every cycle. Sinks decide how the
//! samples are persisted: `CsvTelemetry` writes timestamped rows to a CSV archive, `LogTelemetry`
//! forwards them to the log. Nothing is created when the configuration turns telemetry off.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use std::path::Path;
use log::{trace, warn};
use serde::Serialize;

// Internal
use util::{
    archive::{ArchiveError, Archiver},
    session::{self, Session}
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of rows buffered before they are written to the archive.
pub const CSV_BUFFER_ROWS: usize = 1024;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A destination for telemetry samples.
pub trait TelemetrySink {
    /// Record a sample.
    fn add(&mut self, key: &'static str, value: f64);

    /// Persist all recorded samples.
    fn flush(&mut self) -> Result<(), TelemError>;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Sink writing `key,time_s,value` rows to a CSV file.
pub struct CsvTelemetry {
    archiver: Archiver,
    buffer: Vec<TelemRow>,
    capacity: usize,
}

/// Sink forwarding samples to the log at trace level.
#[derive(Default)]
pub struct LogTelemetry;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
struct TelemRow {
    key: &'static str,
    time_s: f64,
    value: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TelemError {
    #[error("Could not write telemetry: {0}")]
    ArchiveError(#[from] ArchiveError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

/// Choose the sink for a session.
///
/// Returns `None` when `write_csv` is off, without calling `open_csv`. Otherwise samples go to the
/// log if `to_log` is set, or to the CSV sink built by `open_csv`.
pub fn select_sink<F>(
    write_csv: bool,
    to_log: bool,
    open_csv: F
) -> Result<Option<Box<dyn TelemetrySink>>, TelemError>
where
    F: FnOnce() -> Result<CsvTelemetry, TelemError>
{
    if !write_csv {
        return Ok(None)
    }

    let sink: Box<dyn TelemetrySink> = match to_log {
        true => Box::new(LogTelemetry),
        false => Box::new(open_csv()?)
    };

    Ok(Some(sink))
}

impl CsvTelemetry {
    /// Create a sink writing into the session's archive directory.
    pub fn new(session: &Session, path: &str) -> Result<Self, TelemError> {
        Ok(Self::from_archiver(Archiver::from_path(session, path)?, CSV_BUFFER_ROWS))
    }

    /// Create a sink writing to the given file, buffering up to `capacity` rows.
    pub fn from_file_path<P: AsRef<Path>>(path: P, capacity: usize) -> Result<Self, TelemError> {
        Ok(Self::from_archiver(Archiver::from_file_path(path)?, capacity))
    }

    fn from_archiver(archiver: Archiver, capacity: usize) -> Self {
        Self {
            archiver,
            buffer: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Number of samples waiting to be written.
    pub fn num_buffered(&self) -> usize {
        self.buffer.len()
    }

    fn write_buffer(&mut self) -> Result<(), TelemError> {
        for row in self.buffer.drain(..) {
            self.archiver.serialise(row)?;
        }
        self.archiver.flush()?;
        Ok(())
    }
}

impl TelemetrySink for CsvTelemetry {
    fn add(&mut self, key: &'static str, value: f64) {
        self.buffer.push(TelemRow {
            key,
            time_s: session::get_elapsed_seconds(),
            value
        });

        if self.buffer.len() >= self.capacity {
            if let Err(e) = self.write_buffer() {
                warn!("Telemetry samples lost: {}", e);
            }
        }
    }

    fn flush(&mut self) -> Result<(), TelemError> {
        self.write_buffer()
    }
}

impl TelemetrySink for LogTelemetry {
    fn add(&mut self, key: &'static str, value: f64) {
        trace!("{}: {}", key, value);
    }

    fn flush(&mut self) -> Result<(), TelemError> {
        Ok(())
    }
}
