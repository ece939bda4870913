//! Per-session output files written while the host runs.
//!
//! ```text
//! <log-dir>/<prefix>-<yyyyMMddHHmmss>.log   # event log, background writer
//! <records-path>                            # position CSV, synchronous rows
//! ```
//!
//! Both outputs share one cleanup rule: a file that recorded nothing is
//! deleted when it is closed, so an archive sweep never collects it.

mod event_log;
mod records;

pub use event_log::LogSink;
pub use records::{HEADER, RecordLogger};
