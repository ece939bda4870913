//! Tally configuration.
//!
//! Resolved through a chain, first match wins:
//!
//! 1. `--config <path>`: explicit per-invocation file (must exist)
//! 2. `TALLY_CONFIG` env var: process level (must exist)
//! 3. `~/.tally/config.toml`: user default; missing means built-in defaults
//!
//! Every key is optional. Relative paths resolve against the working
//! directory of the host process.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    archive::{SourcePattern, escape_glob},
    identifier,
    model::FeedbackCategory,
};

/// Tally configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Config {
    /// Directory event logs are written to.
    pub log_dir: PathBuf,

    /// File name prefix for event logs: `<prefix>-<timestamp>.log`.
    pub log_prefix: String,

    /// Position CSV, recreated each session.
    pub records_path: PathBuf,

    /// Directory archive sweeps move finished sessions into.
    pub archive_root: PathBuf,

    /// Directory holding `positive.txt` and `negative.txt` message pools.
    pub message_dir: PathBuf,

    /// Length of generated session identifiers.
    pub identifier_length: usize,

    /// How long closing the event log waits for queued lines.
    pub close_timeout_ms: u64,

    pub feedback: FeedbackSettings,
}

/// How transient feedback messages are shown.
///
/// Duration and fade-in are passed through to the overlay renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct FeedbackSettings {
    pub enabled: bool,

    /// Category used when the host does not name one.
    pub category: FeedbackCategory,

    /// Seconds the message stays on screen.
    pub duration: f32,

    /// Seconds spent fading the message in.
    pub fade_in_time: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("tally/logs"),
            log_prefix: "session".to_string(),
            records_path: PathBuf::from("tally/positions.csv"),
            archive_root: PathBuf::from("tally/logs/archived"),
            message_dir: PathBuf::from("tally/messages"),
            identifier_length: identifier::DEFAULT_LENGTH,
            close_timeout_ms: 5_000,
            feedback: FeedbackSettings::default(),
        }
    }
}

impl Default for FeedbackSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            category: FeedbackCategory::Neutral,
            duration: 1.5,
            fade_in_time: 0.5,
        }
    }
}

impl Config {
    /// Load config through the resolution chain.
    pub fn load(explicit: Option<&Path>) -> Result<Self, String> {
        // 1. Explicit --config flag.
        if let Some(path) = explicit {
            return Self::read(path);
        }

        // 2. TALLY_CONFIG environment variable.
        if let Ok(path) = env::var("TALLY_CONFIG")
            && !path.is_empty()
        {
            return Self::read(Path::new(&path));
        }

        // 3. ~/.tally/config.toml, if present.
        let Some(path) = Self::default_path() else {
            return Ok(Self::default());
        };
        match fs::read_to_string(&path) {
            Ok(contents) => Self::parse(&contents, &path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(format!("failed to read {}: {e}", path.display())),
        }
    }

    /// The default config file path: `~/.tally/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".tally").join("config.toml"))
    }

    fn read(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        Self::parse(&contents, path)
    }

    /// Parse and validate config text. `origin` is only used in messages.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, String> {
        let config: Self = toml::from_str(contents)
            .map_err(|e| format!("invalid config at {}: {e}", origin.display()))?;
        config
            .validate()
            .map_err(|e| format!("invalid config at {}: {e}", origin.display()))?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.log_prefix.is_empty() {
            return Err("log-prefix must not be empty".to_string());
        }
        if self.log_prefix.contains(['/', '\\']) {
            return Err(format!(
                "log-prefix '{}' must not contain a path separator",
                self.log_prefix
            ));
        }
        if self.records_path.file_name().is_none() {
            return Err(format!(
                "records-path '{}' must name a file",
                self.records_path.display()
            ));
        }
        if self.identifier_length == 0 {
            return Err("identifier-length must be at least 1".to_string());
        }
        for (key, value) in [
            ("feedback.duration", self.feedback.duration),
            ("feedback.fade-in-time", self.feedback.fade_in_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{key} must be a non-negative number, got {value}"));
            }
        }
        Ok(())
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    /// What an archive sweep collects: this config's event logs and its
    /// records file. Configured names only ever match literally.
    pub fn archive_sources(&self) -> Vec<SourcePattern> {
        let records_dir = match self.records_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let records_name = self
            .records_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        vec![
            SourcePattern::new(
                &self.log_dir,
                format!("{}-*.log", escape_glob(&self.log_prefix)),
            ),
            SourcePattern::exact(records_dir, &records_name),
        ]
    }

    /// Re-roots every relative path under `base`. Used by tests and by
    /// hosts that keep their files outside the working directory.
    pub fn rooted_at(mut self, base: &Path) -> Self {
        for path in [
            &mut self.log_dir,
            &mut self.records_path,
            &mut self.archive_root,
            &mut self.message_dir,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn origin() -> &'static Path {
        Path::new("test.toml")
    }

    #[test]
    fn empty_file_is_all_defaults() {
        let config = Config::parse("", origin()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_file_overrides_only_given_keys() {
        let config = Config::parse(
            r#"
            log-prefix = "celeste"
            identifier-length = 8

            [feedback]
            category = "negative"
            fade-in-time = 0.25
            "#,
            origin(),
        )
        .unwrap();

        assert_eq!(config.log_prefix, "celeste");
        assert_eq!(config.identifier_length, 8);
        assert_eq!(config.log_dir, Config::default().log_dir);
        assert_eq!(config.feedback.category, FeedbackCategory::Negative);
        assert!((config.feedback.fade_in_time - 0.25).abs() < f32::EPSILON);
        assert!((config.feedback.duration - 1.5).abs() < f32::EPSILON);
        assert!(config.feedback.enabled);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = Config::parse("log-directory = \"x\"", origin()).unwrap_err();
        assert!(err.contains("test.toml"), "{err}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "log-prefix = \"\"",
            "log-prefix = \"a/b\"",
            "identifier-length = 0",
            "[feedback]\nduration = -1.0",
        ] {
            assert!(Config::parse(text, origin()).is_err(), "accepted {text:?}");
        }
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.contains("failed to read"), "{err}");
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "close-timeout-ms = 250\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.close_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn archive_sources_cover_logs_and_records() {
        let config = Config::default();
        assert_eq!(
            config.archive_sources(),
            vec![
                SourcePattern::new("tally/logs", "session-*.log"),
                SourcePattern::new("tally", "positions.csv"),
            ]
        );
    }

    #[test]
    fn bare_records_file_is_collected_from_working_directory() {
        let config = Config {
            records_path: PathBuf::from("positions.csv"),
            ..Config::default()
        };
        assert_eq!(
            config.archive_sources()[1],
            SourcePattern::exact(".", "positions.csv")
        );
    }

    #[test]
    fn gitignore_syntax_in_configured_names_is_escaped() {
        let config = Config {
            log_prefix: "#run".to_string(),
            records_path: PathBuf::from("tally/!positions.csv"),
            ..Config::default()
        };
        assert_eq!(
            config.archive_sources(),
            vec![
                SourcePattern::new("tally/logs", "\\#run-*.log"),
                SourcePattern::new("tally", "\\!positions.csv"),
            ]
        );
    }

    #[test]
    fn rooted_at_keeps_absolute_paths() {
        let config = Config {
            message_dir: PathBuf::from("/srv/messages"),
            ..Config::default()
        }
        .rooted_at(Path::new("/data"));

        assert_eq!(config.log_dir, PathBuf::from("/data/tally/logs"));
        assert_eq!(config.message_dir, PathBuf::from("/srv/messages"));
    }
}
