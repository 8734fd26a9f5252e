//! Tracing subscriber setup for the binaries.

use conspect_shared::errors::{ConspectError, ConspectResult};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_FILE_NAME: &str = "conspect.log";

/// Install the global subscriber: stderr always, plus `<log_dir>/conspect.log`
/// when a directory is given. `RUST_LOG` overrides the default `info` filter.
///
/// The returned guard flushes the file sink on drop and must be held until
/// exit. Calling this twice is harmless; the second call keeps the first
/// subscriber.
pub fn init_logging(log_dir: Option<&Path>) -> ConspectResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                ConspectError::Config(format!("Failed to create log dir {}: {}", dir.display(), e))
            })?;
            let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(guard)
}
