//! The telemetry context: every component, owned in one place, driven by
//! host lifecycle signals.
//!
//! ```text
//! process start ─► sweep leftovers ─► open outputs
//! session end   ─► close outputs ─► sweep ─► new id ─► open outputs
//! process exit  ─► close outputs ─► sweep
//! ```
//!
//! Nothing here fails the host. Errors are logged once, at this boundary,
//! and archive results come back as a [`SweepOutcome`] whose status line is
//! meant for the user.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    archive::{ArchivalManager, SweepOutcome},
    config::{Config, FeedbackSettings},
    error::TelemetryError,
    identifier::IdentifierGenerator,
    model::{FeedbackCategory, PositionSample},
    output::{LogSink, RecordLogger},
    shuffle::ShuffleBagSelector,
};

/// A feedback message ready for the overlay renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct Feedback {
    pub category: FeedbackCategory,
    pub text: String,
    pub duration: Duration,
    pub fade_in: Duration,
}

pub struct Telemetry {
    events: LogSink,
    records: RecordLogger,
    archive: ArchivalManager,
    selector: ShuffleBagSelector,
    identifiers: IdentifierGenerator,
    feedback: FeedbackSettings,
    session_id: String,
}

impl Telemetry {
    /// Builds every component from `config`. No files are touched until
    /// [`on_process_start`](Self::on_process_start).
    pub fn new(config: &Config) -> Self {
        let identifiers = IdentifierGenerator::new(config.identifier_length);
        Self {
            events: LogSink::new(&config.log_dir, &config.log_prefix, config.close_timeout()),
            records: RecordLogger::new(&config.records_path),
            archive: ArchivalManager::new(&config.archive_root, config.archive_sources()),
            selector: ShuffleBagSelector::load(&config.message_dir),
            session_id: identifiers.generate(),
            identifiers,
            feedback: config.feedback.clone(),
        }
    }

    /// Identifier the next archive will be filed under.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn events(&self) -> &LogSink {
        &self.events
    }

    /// Archives whatever a previous run left behind, then opens fresh files.
    pub fn on_process_start(&mut self) -> SweepOutcome {
        let outcome = self.rotate();
        self.open_outputs();
        outcome
    }

    pub fn on_session_start(&self) {
        self.log_event("Session started");
    }

    /// Archives the finished session and starts the next one.
    pub fn on_session_end(&mut self) -> SweepOutcome {
        self.log_event("Session ended");
        let outcome = self.rotate();
        self.open_outputs();
        outcome
    }

    /// Archives the current session. Outputs stay closed afterwards.
    pub fn on_process_exit(&mut self) -> SweepOutcome {
        self.log_event("Process exiting");
        self.rotate()
    }

    /// Appends one line to the event log. Dropped (with a warning) when the
    /// log is closed.
    pub fn log_event(&self, message: &str) {
        self.events.log(message);
    }

    /// Appends one position row.
    pub fn record_sample(&mut self, sample: &PositionSample) {
        match self.records.log_row(sample) {
            Ok(()) => {}
            Err(TelemetryError::NotOpen(what)) => {
                warn!(label = %sample.label, "{what} not open, dropping sample");
            }
            Err(e) => error!(error = %e, "failed to record sample"),
        }
    }

    /// Picks a message to show.
    ///
    /// `category` overrides the configured default. Returns `None` when
    /// feedback is disabled or the category is neutral.
    pub fn feedback(&mut self, category: Option<FeedbackCategory>) -> Option<Feedback> {
        if !self.feedback.enabled {
            return None;
        }
        let category = category.unwrap_or(self.feedback.category);
        let text = self.selector.select(category)?;
        self.log_event(&format!("Showing {category} feedback: {text}"));
        Some(Feedback {
            category,
            text,
            duration: seconds(self.feedback.duration),
            fade_in: seconds(self.feedback.fade_in_time),
        })
    }

    /// Close outputs, sweep, and draw a new identifier if the sweep filed
    /// something under the current one.
    fn rotate(&mut self) -> SweepOutcome {
        self.close_outputs();

        let outcome = self.archive.sweep(&self.session_id);
        info!(session = %self.session_id, "{}", outcome.status());
        if matches!(outcome, SweepOutcome::Archived { .. }) {
            self.session_id = self.identifiers.generate();
        }
        outcome
    }

    fn close_outputs(&mut self) {
        if let Err(e) = self.events.close() {
            error!(error = %e, "failed to close event log");
        }
        if let Err(e) = self.records.close() {
            error!(error = %e, "failed to close records file");
        }
    }

    fn open_outputs(&mut self) {
        if let Err(e) = self.events.open() {
            error!(error = %e, "failed to open event log, events will be dropped");
        }
        if let Err(e) = self.records.open() {
            error!(error = %e, "failed to open records file, samples will be dropped");
        }
    }
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        fs,
        path::{Path, PathBuf},
    };

    use tempfile::TempDir;

    use crate::output::HEADER;

    fn test_telemetry() -> (TempDir, Config, Telemetry) {
        let dir = TempDir::new().unwrap();
        let config = Config::default().rooted_at(dir.path());
        fs::create_dir_all(&config.message_dir).unwrap();
        fs::write(config.message_dir.join("positive.txt"), "yes\nnice\n").unwrap();
        fs::write(config.message_dir.join("negative.txt"), "no\n").unwrap();
        let telemetry = Telemetry::new(&config);
        (dir, config, telemetry)
    }

    fn sample() -> PositionSample {
        PositionSample {
            label: "Summit".into(),
            x: 12.5,
            y: -3.25,
            session_time: 10.0,
            deaths: 2,
        }
    }

    fn archive_dirs(root: &Path) -> Vec<PathBuf> {
        match fs::read_dir(root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[test]
    fn fresh_start_has_nothing_to_archive() {
        let (_dir, config, mut telemetry) = test_telemetry();

        assert_eq!(telemetry.on_process_start(), SweepOutcome::NothingToArchive);
        assert!(telemetry.events().is_open());
        assert!(config.records_path.exists());
        assert!(archive_dirs(&config.archive_root).is_empty());
    }

    #[test]
    fn session_end_archives_and_rotates() {
        let (_dir, config, mut telemetry) = test_telemetry();
        telemetry.on_process_start();
        telemetry.on_session_start();
        telemetry.record_sample(&sample());
        let first_id = telemetry.session_id().to_string();

        let outcome = telemetry.on_session_end();

        let SweepOutcome::Archived { dir, files, complete } = outcome else {
            panic!("expected archived outcome, got {outcome:?}");
        };
        assert!(complete);
        // Event log and records; the marker is written after counting.
        assert_eq!(files, 2);
        assert!(dir.join(format!("{first_id}.txt")).exists());

        let csv = fs::read_to_string(dir.join("positions.csv")).unwrap();
        assert!(csv.starts_with(HEADER));
        assert!(csv.trim_end().ends_with(",Summit,12.500,-3.250,10.000,2"));

        let log = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.extension().is_some_and(|e| e == "log"))
            .unwrap();
        let log = fs::read_to_string(log).unwrap();
        assert!(log.contains("] Session started\n"));
        assert!(log.contains("] Session ended\n"));

        // Next session: new identifier, fresh outputs.
        assert_ne!(telemetry.session_id(), first_id);
        assert!(telemetry.events().is_open());
        assert_eq!(
            fs::read_to_string(&config.records_path).unwrap(),
            format!("{HEADER}\n")
        );
    }

    #[test]
    fn process_exit_leaves_outputs_closed() {
        let (_dir, config, mut telemetry) = test_telemetry();
        telemetry.on_process_start();
        telemetry.record_sample(&sample());

        let outcome = telemetry.on_process_exit();

        assert!(outcome.succeeded());
        assert!(!telemetry.events().is_open());
        assert!(!config.records_path.exists());
        assert_eq!(archive_dirs(&config.archive_root).len(), 1);

        // Late activity is dropped, not fatal.
        telemetry.record_sample(&sample());
        telemetry.log_event("too late");
    }

    #[test]
    fn leftovers_from_previous_run_are_archived_at_start() {
        let (_dir, config, mut telemetry) = test_telemetry();
        fs::create_dir_all(&config.log_dir).unwrap();
        fs::write(
            config.log_dir.join("session-20240101000000.log"),
            "[2024-01-01 00:00:00.000] crashed\n",
        )
        .unwrap();

        let outcome = telemetry.on_process_start();

        assert!(matches!(outcome, SweepOutcome::Archived { files: 1, .. }));
        telemetry.on_process_exit();
    }

    #[test]
    fn unusual_names_never_sweep_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            log_prefix: "#run".to_string(),
            records_path: PathBuf::from("tally/!positions.csv"),
            ..Config::default()
        }
        .rooted_at(dir.path());
        fs::create_dir_all(&config.log_dir).unwrap();
        fs::write(config.log_dir.join("unrelated.txt"), "stay").unwrap();
        fs::write(dir.path().join("tally").join("other.csv"), "stay").unwrap();
        let mut telemetry = Telemetry::new(&config);

        assert_eq!(telemetry.on_process_start(), SweepOutcome::NothingToArchive);
        telemetry.log_event("hello");
        telemetry.record_sample(&sample());

        let outcome = telemetry.on_process_exit();
        let SweepOutcome::Archived { dir: archived, files, .. } = outcome else {
            panic!("expected archived outcome, got {outcome:?}");
        };
        assert_eq!(files, 2);
        assert!(archived.join("!positions.csv").is_file());
        assert!(config.log_dir.join("unrelated.txt").exists());
        assert!(dir.path().join("tally").join("other.csv").exists());
    }

    #[test]
    fn feedback_uses_configured_settings() {
        let (_dir, _config, mut telemetry) = test_telemetry();
        telemetry.on_process_start();

        // Default category is neutral.
        assert_eq!(telemetry.feedback(None), None);

        let shown = telemetry.feedback(Some(FeedbackCategory::Negative)).unwrap();
        assert_eq!(shown.text, "no");
        assert_eq!(shown.duration, Duration::from_millis(1500));
        assert_eq!(shown.fade_in, Duration::from_millis(500));

        let a = telemetry.feedback(Some(FeedbackCategory::Positive)).unwrap();
        let b = telemetry.feedback(Some(FeedbackCategory::Positive)).unwrap();
        assert_ne!(a.text, b.text);
    }

    #[test]
    fn disabled_feedback_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default().rooted_at(dir.path());
        config.feedback.enabled = false;
        let mut telemetry = Telemetry::new(&config);

        assert_eq!(telemetry.feedback(Some(FeedbackCategory::Positive)), None);
    }
}
