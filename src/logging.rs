// 📝 Logging - tracing subscriber setup for the binaries
//
// Levels:
//   error  fatal load errors
//   warn   per-record anomalies (bad dates, invalid date arithmetic)
//   info   pipeline stage counts
//   debug  join ambiguity, cache hits (may contain names)
//
// RUST_LOG overrides the verbosity flag. Logs go to stderr so exports
// written to stdout stay clean.

use anyhow::{anyhow, Result};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Default level for a `-v` count
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

pub fn init_logging(verbosity: u8) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(level_for(verbosity).into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
