//! Event log: an append-only text file written from a background thread.
//!
//! Callers hand lines to [`LogSink::log`] and return immediately. A single
//! writer thread per open file owns the handle, appends each line with one
//! `write_all`, and flushes whenever its queue runs dry. Lines from
//! concurrent callers never interleave.
//!
//! ```text
//! <log-dir>/<prefix>-20250115103045.log
//! <log-dir>/<prefix>-20250115103045-1.log   # same second, already taken
//! ```

use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::mpsc::{self, RecvTimeoutError},
    thread,
    time::Duration,
};

use jiff::Zoned;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::error::{Result, TelemetryError};

/// Owns at most one open event log and the thread writing to it.
pub struct LogSink {
    dir: PathBuf,
    prefix: String,
    drain_timeout: Duration,
    active: Mutex<Option<ActiveLog>>,
}

/// The open file: its path and the queue feeding its writer thread.
///
/// Path and queue live and die together, so "open" is simply `Some`.
struct ActiveLog {
    path: PathBuf,
    lines: mpsc::Sender<String>,
    finished: mpsc::Receiver<WriterReport>,
    handle: thread::JoinHandle<()>,
}

/// What the writer thread reports once its queue is closed and drained.
struct WriterReport {
    written: u64,
    dropped: u64,
    flushed: io::Result<()>,
}

impl LogSink {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, drain_timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            drain_timeout,
            active: Mutex::new(None),
        }
    }

    /// Path of the currently open log, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.active.lock().as_ref().map(|log| log.path.clone())
    }

    pub fn is_open(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Starts a new log file named after the current local time.
    ///
    /// Any open file is closed first. On failure the sink stays closed and
    /// later [`log`](Self::log) calls are dropped with a warning.
    pub fn open(&self) -> Result<PathBuf> {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close previous event log");
        }

        let stamp = Zoned::now().strftime("%Y%m%d%H%M%S").to_string();
        fs::create_dir_all(&self.dir)
            .map_err(|e| TelemetryError::io("create directory", &self.dir, e))?;
        let (path, file) = create_unique(&self.dir, &self.prefix, &stamp)?;

        let (lines, queue) = mpsc::channel::<String>();
        let (report, finished) = mpsc::channel();
        let writer_path = path.clone();
        let spawned = thread::Builder::new()
            .name("tally-event-log".into())
            .spawn(move || {
                let outcome = write_queue(&writer_path, file, &queue);
                // The receiver is gone only if close gave up waiting.
                let _ = report.send(outcome);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return Err(discard_unused(
                    &path,
                    TelemetryError::io("spawn writer for", &path, e),
                ));
            }
        };

        debug!(path = %path.display(), "opened event log");
        *self.active.lock() = Some(ActiveLog {
            path: path.clone(),
            lines,
            finished,
            handle,
        });
        Ok(path)
    }

    /// Queues one timestamped line. Returns `false` if the line was dropped
    /// because no log is open.
    pub fn log(&self, message: &str) -> bool {
        let line = format_line(&Zoned::now(), message);
        let active = self.active.lock();
        let Some(log) = active.as_ref() else {
            warn!(line = line.trim_end(), "event log not open, dropping line");
            return false;
        };
        if log.lines.send(line).is_err() {
            // Writer thread is gone; it already logged why.
            warn!(path = %log.path.display(), "event log writer stopped, dropping line");
            return false;
        }
        true
    }

    /// Drains every queued line, flushes, and releases the file.
    ///
    /// A file that ended up empty is deleted. Returns the path of the kept
    /// file, or `None` if nothing was open or the file was removed.
    /// Idempotent.
    pub fn close(&self) -> Result<Option<PathBuf>> {
        // Taking the log under the lock is the cut-off: later `log` calls
        // see a closed sink.
        let Some(log) = self.active.lock().take() else {
            return Ok(None);
        };
        let ActiveLog {
            path,
            lines,
            finished,
            handle,
        } = log;
        drop(lines);

        let report = match finished.recv_timeout(self.drain_timeout) {
            Ok(report) => report,
            Err(RecvTimeoutError::Timeout) => {
                let waited_ms = u64::try_from(self.drain_timeout.as_millis()).unwrap_or(u64::MAX);
                error!(path = %path.display(), waited_ms, "event log writer did not drain in time");
                return Err(TelemetryError::DrainTimeout { path, waited_ms });
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                return Err(TelemetryError::io(
                    "drain",
                    path,
                    io::Error::other("writer thread exited without reporting"),
                ));
            }
        };
        let _ = handle.join();

        debug!(
            path = %path.display(),
            written = report.written,
            dropped = report.dropped,
            "closed event log"
        );
        report
            .flushed
            .map_err(|e| TelemetryError::io("flush", &path, e))?;

        remove_if_empty(&path)
    }
}

impl Drop for LogSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close event log on drop");
        }
    }
}

/// Formats `[yyyy-MM-dd HH:mm:ss.fff] message` with a trailing newline.
fn format_line(now: &Zoned, message: &str) -> String {
    format!(
        "[{}.{:03}] {message}\n",
        now.strftime("%Y-%m-%d %H:%M:%S"),
        now.millisecond()
    )
}

/// Creates `<prefix>-<stamp>.log`, or `<prefix>-<stamp>-<n>.log` with the
/// smallest `n` not already taken.
fn create_unique(dir: &Path, prefix: &str, stamp: &str) -> Result<(PathBuf, File)> {
    let mut suffix = 0u32;
    loop {
        let name = if suffix == 0 {
            format!("{prefix}-{stamp}.log")
        } else {
            format!("{prefix}-{stamp}-{suffix}.log")
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => suffix += 1,
            Err(e) => return Err(TelemetryError::io("create", path, e)),
        }
    }
}

/// Writer thread body: append lines until every sender is gone.
///
/// After the first write error the rest of the queue is counted and dropped.
fn write_queue(path: &Path, file: File, queue: &mpsc::Receiver<String>) -> WriterReport {
    let mut out = BufWriter::new(file);
    let mut written = 0;
    let mut dropped = 0;
    let mut failed = false;

    let mut append = |out: &mut BufWriter<File>, line: String| {
        if failed {
            dropped += 1;
            return;
        }
        match out.write_all(line.as_bytes()) {
            Ok(()) => written += 1,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to write event log, dropping further lines");
                failed = true;
                dropped += 1;
            }
        }
    };

    while let Ok(line) = queue.recv() {
        append(&mut out, line);
        while let Ok(line) = queue.try_recv() {
            append(&mut out, line);
        }
        // Queue is momentarily empty: push what we have to disk.
        if let Err(e) = out.flush() {
            warn!(path = %path.display(), error = %e, "failed to flush event log");
        }
    }

    WriterReport {
        written,
        dropped,
        flushed: out.flush(),
    }
}

/// Removes a freshly created log that will never be written, then hands
/// back `cause`.
fn discard_unused(path: &Path, cause: TelemetryError) -> TelemetryError {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove unused event log");
    }
    cause
}

fn remove_if_empty(path: &Path) -> Result<Option<PathBuf>> {
    let len = fs::metadata(path)
        .map_err(|e| TelemetryError::io("inspect", path, e))?
        .len();
    if len > 0 {
        return Ok(Some(path.to_path_buf()));
    }
    fs::remove_file(path).map_err(|e| TelemetryError::io("delete empty", path, e))?;
    debug!(path = %path.display(), "deleted empty event log");
    Ok(None)
}
