//! Position records: one CSV row per host sample, written synchronously.
//!
//! ```text
//! Timestamp,Level,X,Y,SessionTime,Deaths
//! 2025-01-15T10:30:45.1234567Z,Summit,12.500,-3.250,10.000,2
//! ```
//!
//! Rows go straight to the file, one `write_all` each, so a crash loses at
//! most the row being written. Downstream plotting reads these files
//! directly; the column set and number formats are fixed.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use jiff::Timestamp;
use tracing::{debug, warn};

use crate::{
    error::{Result, TelemetryError},
    model::PositionSample,
};

/// Column header, written once right after the file is created.
pub const HEADER: &str = "Timestamp,Level,X,Y,SessionTime,Deaths";

/// Writes position samples to a single CSV file per session.
pub struct RecordLogger {
    path: PathBuf,
    file: Option<File>,
}

impl RecordLogger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    /// Where records are written while open.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Truncates (or creates) the output file and writes the header.
    pub fn open(&mut self) -> Result<PathBuf> {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close previous records file");
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| TelemetryError::io("create directory", parent, e))?;
        }
        let mut file =
            File::create(&self.path).map_err(|e| TelemetryError::io("create", &self.path, e))?;
        file.write_all(format!("{HEADER}\n").as_bytes())
            .map_err(|e| TelemetryError::io("write header to", &self.path, e))?;

        debug!(path = %self.path.display(), "opened records file");
        self.file = Some(file);
        Ok(self.path.clone())
    }

    /// Appends one row for `sample`, stamped with the current UTC time.
    pub fn log_row(&mut self, sample: &PositionSample) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(TelemetryError::NotOpen("records file"));
        };
        let row = format_row(Timestamp::now(), sample);
        file.write_all(row.as_bytes())
            .map_err(|e| TelemetryError::io("append to", &self.path, e))
    }

    /// Flushes and releases the file.
    ///
    /// A file holding nothing past its header is deleted, the same rule the
    /// event log applies to empty files. The decision is made on the file's
    /// length, so a partially written row still keeps it. Returns the kept
    /// path, if any.
    pub fn close(&mut self) -> Result<Option<PathBuf>> {
        let Some(mut file) = self.file.take() else {
            return Ok(None);
        };
        file.flush()
            .map_err(|e| TelemetryError::io("flush", &self.path, e))?;
        drop(file);

        let len = fs::metadata(&self.path)
            .map_err(|e| TelemetryError::io("inspect", &self.path, e))?
            .len();
        if len > header_len() {
            debug!(path = %self.path.display(), bytes = len, "closed records file");
            return Ok(Some(self.path.clone()));
        }
        fs::remove_file(&self.path)
            .map_err(|e| TelemetryError::io("delete empty", &self.path, e))?;
        debug!(path = %self.path.display(), "deleted records file without rows");
        Ok(None)
    }
}

/// Bytes taken by the header line, newline included.
fn header_len() -> u64 {
    HEADER.len() as u64 + 1
}

/// Formats one CSV row, newline included.
fn format_row(at: Timestamp, sample: &PositionSample) -> String {
    format!(
        "{},{},{:.3},{:.3},{:.3},{}\n",
        format_utc(at),
        csv_field(&sample.label),
        sample.x,
        sample.y,
        sample.session_time,
        sample.deaths
    )
}

/// ISO-8601 UTC with seven fractional digits: `2025-01-15T10:30:45.1234567Z`.
fn format_utc(at: Timestamp) -> String {
    format!(
        "{}.{:07}Z",
        at.strftime("%Y-%m-%dT%H:%M:%S"),
        at.subsec_nanosecond() / 100
    )
}

/// Quotes a field that would otherwise break the row.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
