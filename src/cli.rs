//! CLI interface for tally.
//!
//! Stands in for the host application: `run` replays a stream of host
//! events through the telemetry context, and the remaining subcommands
//! exercise one component at a time.
//!
//! - `tally run [--events FILE]`: drive a full process lifetime.
//! - `tally sweep`: archive whatever session files are lying around.
//! - `tally id`: draw session identifiers.
//! - `tally message <category>`: draw feedback messages.

mod host;

use std::{
    fs::File,
    io::{self, BufReader},
    path::PathBuf,
};

use clap::{Parser, Subcommand, ValueEnum};

use crate::{
    archive::ArchivalManager, config::Config, identifier::IdentifierGenerator,
    model::FeedbackCategory, shuffle::ShuffleBagSelector, telemetry::Telemetry,
};

/// Session telemetry for a host application.
#[derive(Debug, Parser)]
#[command(name = "tally", version, after_long_help = EVENTS_HELP)]
pub struct Cli {
    /// Config file. Defaults to `$TALLY_CONFIG`, then `~/.tally/config.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

const EVENTS_HELP: &str = r"Host events (one per line, for `tally run`):
  start                                   session started
  sample <label> <x> <y> <time> <deaths>  position sample
  log <text>                              free-form event line
  feedback [neutral|positive|negative]    show a feedback message
  end                                     session ended: archive and rotate
  exit                                    process exiting: archive and stop";

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Drive the telemetry pipeline from a stream of host events.
    ///
    /// Archives leftovers on start, then reads events until `exit` or end
    /// of input. Archive status lines and feedback messages go to stdout.
    Run {
        /// Read events from this file instead of stdin.
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Archive current session files under a fresh identifier.
    ///
    /// Only safe while no host is writing to them.
    Sweep,

    /// Print session identifiers.
    Id {
        /// How many to draw.
        #[arg(long, default_value_t = 1)]
        count: usize,
    },

    /// Print feedback messages drawn from a category's pool.
    Message {
        #[arg(value_enum)]
        category: CategoryArg,

        /// How many to draw. Defaults to one full pass through the pool.
        #[arg(long)]
        count: Option<usize>,
    },
}

/// CLI-facing feedback category, mapped to the domain `FeedbackCategory`.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CategoryArg {
    /// No message.
    Neutral,
    /// Encouraging messages.
    Positive,
    /// Critical messages.
    Negative,
}

impl CategoryArg {
    fn to_domain(self) -> FeedbackCategory {
        match self {
            Self::Neutral => FeedbackCategory::Neutral,
            Self::Positive => FeedbackCategory::Positive,
            Self::Negative => FeedbackCategory::Negative,
        }
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run() -> Result<(), String> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { events } => cmd_run(&config, events),
        Command::Sweep => cmd_sweep(&config),
        Command::Id { count } => cmd_id(&config, count),
        Command::Message { category, count } => cmd_message(&config, category, count),
    }
}

fn cmd_run(config: &Config, events: Option<PathBuf>) -> Result<(), String> {
    let mut telemetry = Telemetry::new(config);
    let mut stdout = io::stdout().lock();

    match events {
        Some(path) => {
            let file = File::open(&path)
                .map_err(|e| format!("failed to open {}: {e}", path.display()))?;
            host::drive(&mut telemetry, BufReader::new(file), &mut stdout)
        }
        None => host::drive(&mut telemetry, io::stdin().lock(), &mut stdout),
    }
}

fn cmd_sweep(config: &Config) -> Result<(), String> {
    let archive = ArchivalManager::new(&config.archive_root, config.archive_sources());
    let session_id = IdentifierGenerator::new(config.identifier_length).generate();

    let outcome = archive.sweep(&session_id);
    println!("{}", outcome.status());

    if outcome.succeeded() {
        Ok(())
    } else {
        Err(format!(
            "sweep into {} did not complete",
            archive.root().display()
        ))
    }
}

fn cmd_id(config: &Config, count: usize) -> Result<(), String> {
    let generator = IdentifierGenerator::new(config.identifier_length);
    for _ in 0..count {
        println!("{}", generator.generate());
    }
    Ok(())
}

fn cmd_message(config: &Config, category: CategoryArg, count: Option<usize>) -> Result<(), String> {
    let category = category.to_domain();
    let mut selector = ShuffleBagSelector::load(&config.message_dir);
    let count = count.unwrap_or_else(|| selector.pool_len(category));
    for _ in 0..count {
        match selector.select(category) {
            Some(message) => println!("{message}"),
            None => break,
        }
    }
    Ok(())
}
