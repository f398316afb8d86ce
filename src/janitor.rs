use std::{fs, io, path::Path, sync::Arc};

use chrono::{DateTime, Local};
use log::{debug, error, info, warn};
use tracing::info_span;

use crate::{
    config::RetentionConfig,
    errors::Result,
    retention::{self, DirectoryEntry},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub success: usize,
    pub failure: usize,
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} deleted, {} failed", self.success, self.failure)
    }
}

pub fn run_cleanup(config: &RetentionConfig) -> CleanupReport {
    run_cleanup_at(config, Local::now())
}

/// Runs one cleanup pass with the retention threshold derived from `now`.
///
/// Per-entry failures are logged and counted; an unreadable directory is logged
/// and skipped. Nothing here aborts the pass.
pub fn run_cleanup_at(config: &RetentionConfig, now: DateTime<Local>) -> CleanupReport {
    run_cleanup_with(config, now, |path| fs::remove_file(path))
}

fn run_cleanup_with<R>(config: &RetentionConfig, now: DateTime<Local>, mut remove: R) -> CleanupReport
where
    R: FnMut(&Path) -> io::Result<()>,
{
    info!("--------------- Cleanup run started ---------------");
    // 阈值在整次清理中保持不变
    let threshold = retention::threshold(now, config.days);
    debug!("Retention threshold: {threshold}");

    let mut report = CleanupReport::default();
    for dir in config.directories.iter() {
        clean_directory(dir, &threshold, &mut remove, &mut report);
    }

    info!("Deleted file(s): {}", report.success);
    info!("Failed deletion(s): {}", report.failure);

    report
}

fn clean_directory<R>(
    dir: &Path,
    threshold: &DateTime<Local>,
    remove: &mut R,
    report: &mut CleanupReport,
) where
    R: FnMut(&Path) -> io::Result<()>,
{
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            // 目录不可读时跳过，其中的文件不计入失败数
            warn!("Failed to read directory {}: {e}", dir.display());
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to read entry in {}: {e}", dir.display());
                report.failure += 1;
                continue;
            }
        };
        let entry = match DirectoryEntry::from_dir_entry(&entry) {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to get file info {}: {e}", entry.path().display());
                report.failure += 1;
                continue;
            }
        };

        if !retention::is_candidate(&entry, threshold) {
            continue;
        }
        match remove(&entry.path) {
            Ok(()) => {
                debug!("Deleted stale file: {}", entry.path.display());
                report.success += 1;
            }
            Err(e) => {
                error!("Failed to delete file {}: {e}", entry.path.display());
                report.failure += 1;
            }
        }
    }
}

/// Runs a pass on the blocking pool; a panic inside it surfaces as
/// [`crate::errors::Error::TokioTaskJoin`] instead of taking the process down.
pub async fn cleanup(config: Arc<RetentionConfig>) -> Result<CleanupReport> {
    let span = info_span!("cleanup", directories = config.directories.len());
    let report = tokio::task::spawn_blocking(move || span.in_scope(|| run_cleanup(&config))).await?;
    if report.failure > 0 {
        warn!("Cleanup finished with failures: {report}");
    } else {
        info!("Cleanup finished: {report}");
    }

    Ok(report)
}
