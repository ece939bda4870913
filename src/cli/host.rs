//! Host event stream: the `run` command's input format.
//!
//! One event per line. Blank lines and `#` comments are skipped.
//!
//! ```text
//! start
//! sample Summit 12.5 -3.25 10.0 2
//! feedback negative
//! log player reached checkpoint
//! end
//! exit
//! ```
//!
//! Sample labels are a single token; they cannot contain whitespace.

use std::io::{BufRead, Write};

use tracing::warn;

use crate::{
    model::{FeedbackCategory, PositionSample},
    telemetry::Telemetry,
};

/// One line of the host event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    SessionStart,
    SessionEnd,
    Exit,
    Log(String),
    Sample(PositionSample),
    Feedback(Option<FeedbackCategory>),
}

/// Parses one line. `Ok(None)` for blank lines and comments.
pub fn parse_event(line: &str) -> Result<Option<HostEvent>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(verb, rest)| (verb, rest.trim()));

    let event = match verb {
        "start" => HostEvent::SessionStart,
        "end" => HostEvent::SessionEnd,
        "exit" => HostEvent::Exit,
        "log" => {
            if rest.is_empty() {
                return Err("log needs a message".to_string());
            }
            HostEvent::Log(rest.to_string())
        }
        "sample" => HostEvent::Sample(parse_sample(rest)?),
        "feedback" => {
            if rest.is_empty() {
                HostEvent::Feedback(None)
            } else {
                HostEvent::Feedback(Some(rest.parse()?))
            }
        }
        other => return Err(format!("unknown event '{other}'")),
    };
    Ok(Some(event))
}

fn parse_sample(args: &str) -> Result<PositionSample, String> {
    let fields: Vec<&str> = args.split_whitespace().collect();
    let [label, x, y, time, deaths] = fields.as_slice() else {
        return Err(format!(
            "sample needs <label> <x> <y> <time> <deaths>, got {} field(s)",
            fields.len()
        ));
    };
    Ok(PositionSample {
        label: label.to_string(),
        x: number(x, "x")?,
        y: number(y, "y")?,
        session_time: number(time, "time")?,
        deaths: number(deaths, "deaths")?,
    })
}

fn number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("invalid {name} '{value}'"))
}

/// Feeds host events to `telemetry` until `exit` or end of input.
///
/// Archive status lines and feedback messages go to `out`. Malformed lines
/// are warned about and skipped. End of input without `exit` is treated
/// as an exit.
pub fn drive(
    telemetry: &mut Telemetry,
    input: impl BufRead,
    out: &mut impl Write,
) -> Result<(), String> {
    emit(out, &telemetry.on_process_start().status())?;

    for (index, line) in input.lines().enumerate() {
        let line = line.map_err(|e| format!("failed to read events: {e}"))?;
        let event = match parse_event(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = index + 1, "skipping event: {e}");
                continue;
            }
        };

        match event {
            HostEvent::SessionStart => telemetry.on_session_start(),
            HostEvent::SessionEnd => emit(out, &telemetry.on_session_end().status())?,
            HostEvent::Exit => {
                return emit(out, &telemetry.on_process_exit().status());
            }
            HostEvent::Log(message) => telemetry.log_event(&message),
            HostEvent::Sample(sample) => telemetry.record_sample(&sample),
            HostEvent::Feedback(category) => {
                if let Some(feedback) = telemetry.feedback(category) {
                    emit(out, &feedback.text)?;
                }
            }
        }
    }

    emit(out, &telemetry.on_process_exit().status())
}

fn emit(out: &mut impl Write, text: &str) -> Result<(), String> {
    writeln!(out, "{text}").map_err(|e| format!("failed to write output: {e}"))
}
