use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::domain::DomainError;

/// Initialize logging with console output and optional JSON file rotation.
///
/// Returns a guard that must be kept alive for the duration of the
/// application; dropping it flushes any buffered file logs.
pub fn init_logging(
    logs_dir: &Path,
    level: &str,
    file_logging: bool,
) -> Result<Option<WorkerGuard>, DomainError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sayclip={level},warn")));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter);

    if file_logging {
        fs::create_dir_all(logs_dir)?;
        let file_appender = RollingFileAppender::new(Rotation::DAILY, logs_dir, "sayclip.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .json()
            .with_filter(EnvFilter::new(format!("sayclip={level}")));

        // try_init so a second initialization (tests) is a no-op.
        let _ = tracing_subscriber::registry()
            .with(console_layer)
            .with(file_layer)
            .try_init();

        tracing::info!(logs_dir = ?logs_dir, level, "logging initialized with file output");
        Ok(Some(guard))
    } else {
        let _ = tracing_subscriber::registry().with(console_layer).try_init();
        tracing::info!(level, "logging initialized (console only)");
        Ok(None)
    }
}
