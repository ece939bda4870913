//! Session telemetry for a host application.
//!
//! The host feeds in lifecycle signals, position samples, and feedback
//! triggers; tally keeps an event log and a position CSV per session,
//! archives them into dated per-session directories, and picks feedback
//! messages without back-to-back repeats.
//!
//! [`telemetry::Telemetry`] ties the pieces together. Each piece also
//! stands on its own.

pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod identifier;
pub mod model;
pub mod output;
pub mod shuffle;
pub mod telemetry;
