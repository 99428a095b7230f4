//! Process logging
//!
//! Human-readable output goes to stderr and JSON lines go to the process log
//! in the data directory. `RUST_LOG` overrides the default level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive for a verbosity flag
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Install the global subscriber
///
/// The returned guard flushes the file writer on drop and must be held until exit.
pub fn init(log_path: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    let directory = log_path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = log_path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("invalid log path: {:?}", log_path))?;
    std::fs::create_dir_all(directory)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        directory, file_name,
    ));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(fmt::layer().json().with_writer(writer))
        .try_init()?;

    Ok(guard)
}
