//! Staleness decisions for directory entries.
//!
//! Only immediate, non-directory children of a configured root are ever
//! candidates: the root itself and its subdirectories are left alone.

use chrono::{DateTime, Days, Local, TimeDelta, TimeZone};
use log::warn;
use std::{fs, io, path::PathBuf, time::SystemTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub modified_at: DateTime<Local>,
}

impl DirectoryEntry {
    /// Reads the entry's type and modification time without following symlinks.
    pub fn from_dir_entry(entry: &fs::DirEntry) -> io::Result<Self> {
        let metadata = entry.metadata()?;

        Ok(DirectoryEntry {
            path: entry.path(),
            is_dir: metadata.is_dir(),
            modified_at: DateTime::from(metadata.modified()?),
        })
    }
}

/// The retention threshold: `days` calendar days before `now`, on the local
/// wall clock.
///
/// A wall-clock time repeated by a DST fold resolves to its earlier instant.
/// One skipped by a DST gap falls back to exactly `days * 24h` before `now`.
pub fn threshold(now: DateTime<Local>, days: u32) -> DateTime<Local> {
    let calendar = now
        .naive_local()
        .checked_sub_days(Days::new(days.into()))
        .and_then(|naive| Local.from_local_datetime(&naive).earliest());
    if let Some(threshold) = calendar {
        return threshold;
    }

    match TimeDelta::try_days(days.into()).and_then(|delta| now.checked_sub_signed(delta)) {
        Some(threshold) => threshold,
        None => {
            // 超出可表示范围，没有文件会被视为过期
            warn!("Retention of {days} day(s) is out of range, falling back to the UNIX epoch");
            DateTime::from(SystemTime::UNIX_EPOCH)
        }
    }
}

pub fn is_stale(entry: &DirectoryEntry, threshold: &DateTime<Local>) -> bool {
    entry.modified_at.timestamp() < threshold.timestamp()
}

pub fn is_candidate(entry: &DirectoryEntry, threshold: &DateTime<Local>) -> bool {
    !entry.is_dir && is_stale(entry, threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn entry(is_dir: bool, modified_at: DateTime<Local>) -> DirectoryEntry {
        DirectoryEntry {
            path: PathBuf::from("entry"),
            is_dir,
            modified_at,
        }
    }

    #[test]
    fn test_threshold() {
        use_central_europe();
        let now = Local.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();

        assert_eq!(
            threshold(now, 3),
            Local.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap()
        );
        assert_eq!(threshold(now, 0), now);
    }

    // 中欧时间：3 月最后一个周日 02:00 跳到 03:00，10 月最后一个周日 03:00 回到 02:00
    const CENTRAL_EUROPE: &str = "CET-1CEST,M3.5.0,M10.5.0/3";

    fn use_central_europe() {
        // 按本地墙上时间比较的测试都先设置同一个时区，并行运行时结果不变
        unsafe { std::env::set_var("TZ", CENTRAL_EUROPE) };
    }

    #[test]
    fn test_threshold_across_dst_gap() {
        use_central_europe();
        // 2024-04-03 02:30 +02:00，三天前的 02:30 不存在
        let now = Utc.with_ymd_and_hms(2024, 4, 3, 0, 30, 0).unwrap().with_timezone(&Local);

        let threshold = threshold(now, 3);

        assert_eq!(threshold, now - TimeDelta::days(3));
        let old = entry(false, now - Duration::days(5));
        assert!(is_stale(&old, &threshold));
        assert!(!is_stale(&entry(false, now - Duration::days(1)), &threshold));
    }

    #[test]
    fn test_threshold_across_dst_fold() {
        use_central_europe();
        // 2024-10-30 02:30 +01:00，三天前的 02:30 出现两次，取较早的 +02:00
        let now = Utc.with_ymd_and_hms(2024, 10, 30, 1, 30, 0).unwrap().with_timezone(&Local);

        let threshold = threshold(now, 3);

        assert_eq!(
            threshold,
            Utc.with_ymd_and_hms(2024, 10, 27, 0, 30, 0).unwrap()
        );
        assert!(is_stale(&entry(false, now - Duration::days(5)), &threshold));
    }

    #[test]
    fn test_is_stale() {
        let now = Local::now();
        let threshold = threshold(now, 3);

        assert!(is_stale(&entry(false, now - Duration::days(5)), &threshold));
        assert!(!is_stale(&entry(false, now - Duration::days(1)), &threshold));
        // 与阈值同一秒不算过期
        assert!(!is_stale(&entry(false, threshold), &threshold));
        // 目录与文件的过期判断一致
        assert!(is_stale(&entry(true, now - Duration::days(5)), &threshold));
    }

    #[test]
    fn test_is_candidate() {
        let now = Local::now();
        let threshold = threshold(now, 3);

        assert!(is_candidate(&entry(false, now - Duration::days(5)), &threshold));
        assert!(!is_candidate(&entry(true, now - Duration::days(5)), &threshold));
        assert!(!is_candidate(&entry(false, now), &threshold));
    }

    #[test]
    fn test_from_dir_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), "a").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let mut entries = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| DirectoryEntry::from_dir_entry(&e.unwrap()).unwrap())
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_dir);
        assert!(entries[1].is_dir);
        assert!(entries[0].modified_at <= Local::now());
    }
}
