//! Diagnostic logging setup.
//!
//! Diagnostics go through `tracing`. By default only warnings reach stderr so
//! they do not interleave with streamed replies; `RUST_LOG` widens the filter
//! and `--log <path>` redirects everything to a file instead.

use std::error::Error;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Filter from `RUST_LOG`, or [`DEFAULT_LOG_FILTER`] when unset or invalid.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn open_log_file(path: &Path) -> Result<File, Box<dyn Error>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

/// Install the global subscriber. Calling this twice is an error.
pub fn init_tracing(log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_target(true);

    let installed = match log_file {
        Some(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|err| -> Box<dyn Error> { err })
}
