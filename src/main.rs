use std::process;

use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    if let Err(e) = tally::cli::run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

/// Diagnostics go to stderr so stdout stays clean for status lines.
/// Verbosity follows `RUST_LOG`, defaulting to `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
