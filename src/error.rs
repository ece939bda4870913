//! Errors shared by the telemetry outputs and the archive sweep.
//!
//! Every I/O failure carries the operation and the path it touched, so a
//! single log line at the boundary is enough to diagnose it.

use std::{io, path::PathBuf};

/// Errors that can occur while writing or relocating telemetry files.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid file pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: ignore::Error,
    },

    #[error("{0} is not open")]
    NotOpen(&'static str),

    #[error("timed out after {waited_ms}ms draining writes to {}", path.display())]
    DrainTimeout { path: PathBuf, waited_ms: u64 },
}

impl TelemetryError {
    /// Wraps an I/O error with the operation and path it failed on.
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = core::result::Result<T, TelemetryError>;
