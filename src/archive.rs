//! Archive sweep: relocate a finished session's files into a dated directory.
//!
//! ```text
//! <archive-root>/<yyyy-MM-dd_HH-mm-ss>_<session-id>/
//!   <prefix>-20250115103045.log
//!   positions.csv
//!   <session-id>.txt        # "Experiment ID: <session-id>"
//! ```
//!
//! The outputs must be closed before a sweep runs; moving a file that is
//! still being written races the writer. A sweep never fails outright:
//! each step is logged, failures are accumulated, and the caller gets a
//! [`SweepOutcome`] with a status line for the user.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use ignore::{WalkBuilder, overrides::OverrideBuilder};
use jiff::Zoned;
use tracing::{debug, error, info, warn};

use crate::error::{Result, TelemetryError};

/// Files to collect: every regular file directly inside `dir` whose name
/// matches `pattern` (a gitignore-style glob such as `*.log`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePattern {
    pub dir: PathBuf,
    pub pattern: String,
}

impl SourcePattern {
    pub fn new(dir: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            pattern: pattern.into(),
        }
    }

    /// Matches exactly one file name, with no glob or gitignore meaning.
    pub fn exact(dir: impl Into<PathBuf>, name: &str) -> Self {
        Self::new(dir, escape_glob(name))
    }
}

/// Escapes `literal` so that, as part of a pattern, it matches only itself.
///
/// Covers glob metacharacters and gitignore's leading `#` (comment) and
/// `!` (negation), plus whitespace, which gitignore trims at line end.
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if c.is_whitespace() || matches!(c, '\\' | '*' | '?' | '[' | ']' | '{' | '}' | '!' | '#')
        {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// How an archive sweep ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Files were moved into `dir`. `complete` is false if any step failed.
    Archived {
        dir: PathBuf,
        files: usize,
        complete: bool,
    },

    /// No source file matched; the tentative directory was removed.
    NothingToArchive,

    /// The destination could not be prepared, or every move failed.
    Failed,
}

impl SweepOutcome {
    /// True only when every step of the sweep succeeded.
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Archived { complete: true, .. } | Self::NothingToArchive)
    }

    /// Short transient message for the user.
    pub fn status(&self) -> String {
        match self {
            Self::Archived {
                dir,
                complete: true,
                ..
            } => format!("Saved logs to {}", dir.display()),
            Self::Archived {
                dir,
                complete: false,
                ..
            } => format!("Saved some logs to {} (see log for errors)", dir.display()),
            Self::NothingToArchive => "No logs to save".to_string(),
            Self::Failed => "Failed to save logs".to_string(),
        }
    }
}

/// Moves matched session artifacts into per-session archive directories.
///
/// Holds no state between sweeps; the session identifier is supplied by
/// the caller.
#[derive(Debug, Clone)]
pub struct ArchivalManager {
    root: PathBuf,
    sources: Vec<SourcePattern>,
}

impl ArchivalManager {
    pub fn new(root: impl Into<PathBuf>, sources: Vec<SourcePattern>) -> Self {
        Self {
            root: root.into(),
            sources,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Archive directory for a sweep started at `now`.
    pub fn destination(&self, now: &Zoned, session_id: &str) -> PathBuf {
        let stamp = now.strftime("%Y-%m-%d_%H-%M-%S");
        if session_id.is_empty() {
            self.root.join(stamp.to_string())
        } else {
            self.root.join(format!("{stamp}_{session_id}"))
        }
    }

    /// Moves every matching source file into a fresh archive directory.
    pub fn sweep(&self, session_id: &str) -> SweepOutcome {
        self.sweep_into(&self.destination(&Zoned::now(), session_id), session_id)
    }

    /// Creates `dest` and fills it. An existing `dest` is never reused.
    fn sweep_into(&self, dest: &Path, session_id: &str) -> SweepOutcome {
        let created = match dest.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::create_dir(dest));
        if let Err(e) = created {
            error!(path = %dest.display(), error = %e, "failed to create archive directory");
            return SweepOutcome::Failed;
        }
        self.collect_into(dest, session_id)
    }

    /// Moves every matching source file into the existing directory `dest`.
    fn collect_into(&self, dest: &Path, session_id: &str) -> SweepOutcome {
        let mut complete = true;
        for source in &self.sources {
            let files = match matching_files(source) {
                Ok(files) => files,
                Err(e) => {
                    error!(error = %e, "failed to list archive sources");
                    complete = false;
                    continue;
                }
            };
            if files.is_empty() {
                warn!(
                    dir = %source.dir.display(),
                    pattern = %source.pattern,
                    "no files found matching pattern"
                );
                continue;
            }
            for file in files {
                if let Err(e) = move_into(&file, dest) {
                    error!(error = %e, "failed to archive file");
                    complete = false;
                }
            }
        }

        let archived = match count_files(dest) {
            Ok(n) => n,
            Err(e) => {
                error!(error = %e, "failed to inspect archive directory");
                return SweepOutcome::Failed;
            }
        };
        if archived == 0 {
            if let Err(e) = fs::remove_dir(dest) {
                error!(path = %dest.display(), error = %e, "failed to remove empty archive directory");
            }
            return if complete {
                info!("no session files to archive");
                SweepOutcome::NothingToArchive
            } else {
                SweepOutcome::Failed
            };
        }

        if !session_id.is_empty()
            && let Err(e) = write_marker(dest, session_id)
        {
            error!(error = %e, "failed to write session marker");
            complete = false;
        }

        info!(path = %dest.display(), files = archived, complete, "archived session files");
        SweepOutcome::Archived {
            dir: dest.to_path_buf(),
            files: archived,
            complete,
        }
    }
}

/// Regular files directly inside `source.dir` matching its pattern, sorted
/// by name. A missing directory matches nothing.
fn matching_files(source: &SourcePattern) -> Result<Vec<PathBuf>> {
    if !source.dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern_error = |e: ignore::Error| TelemetryError::Pattern {
        pattern: source.pattern.clone(),
        source: e,
    };
    let mut overrides = OverrideBuilder::new(&source.dir);
    overrides.add(&source.pattern).map_err(pattern_error)?;
    let overrides = overrides.build().map_err(pattern_error)?;

    let mut builder = WalkBuilder::new(&source.dir);
    builder
        .standard_filters(false) // Archive hidden and git-ignored files too.
        .max_depth(Some(1))
        .overrides(overrides)
        .sort_by_file_name(Ord::cmp);

    let mut files = Vec::new();
    for entry in builder.build() {
        match entry {
            Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
            Err(e) => warn!(dir = %source.dir.display(), error = %e, "skipping unreadable entry"),
        }
    }
    Ok(files)
}

/// Moves `file` into `dir`, keeping its name. Falls back to copy and
/// remove when the archive lives on another filesystem.
fn move_into(file: &Path, dir: &Path) -> Result<()> {
    let name = file
        .file_name()
        .ok_or_else(|| TelemetryError::io("archive", file, io::ErrorKind::InvalidInput.into()))?;
    let dest = dir.join(name);

    match fs::rename(file, &dest) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(file, &dest).map_err(|e| TelemetryError::io("copy", file, e))?;
            fs::remove_file(file).map_err(|e| TelemetryError::io("remove", file, e))?;
        }
        Err(e) => return Err(TelemetryError::io("move", file, e)),
    }
    debug!(from = %file.display(), to = %dest.display(), "moved file");
    Ok(())
}

fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir).map_err(|e| TelemetryError::io("list", dir, e))? {
        let entry = entry.map_err(|e| TelemetryError::io("list", dir, e))?;
        if entry.file_type().is_ok_and(|ft| ft.is_file()) {
            count += 1;
        }
    }
    Ok(count)
}

fn write_marker(dir: &Path, session_id: &str) -> Result<()> {
    let path = dir.join(format!("{session_id}.txt"));
    fs::write(&path, format!("Experiment ID: {session_id}"))
        .map_err(|e| TelemetryError::io("write", path, e))
}
