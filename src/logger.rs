use crate::{
    config,
    errors::Result,
    fail,
    vars::{SWEEPD_LOG_DIR, log_max_files},
};
use std::path::PathBuf;
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "cleanlog";

pub fn log_dir() -> Result<PathBuf> {
    if SWEEPD_LOG_DIR.is_empty() {
        Ok(config::executable_dir()?.join("logs"))
    } else {
        Ok(PathBuf::from(*SWEEPD_LOG_DIR))
    }
}

/// Logs to stderr and to a daily rotated file. The returned guard flushes the
/// file writer on drop and must be kept alive until exit.
pub fn init() -> Result<WorkerGuard> {
    let dir = log_dir()?;
    std::fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(log_max_files()?.max(1))
        .build(&dir)?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .try_init()
        .map_err(|e| fail!("failed to initialize logger: {e}"))?;

    Ok(guard)
}
