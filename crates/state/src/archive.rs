use ab_common::types::RECORD_TIME_FORMAT;
use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Keeps the raw log and report of every measured run, named by test time
#[derive(Debug, Clone)]
pub struct RunArchive {
    root: PathBuf,
}

impl RunArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn log_path(&self, timestamp: &NaiveDateTime) -> PathBuf {
        self.root
            .join("log")
            .join(format!("{} caliper.log", timestamp.format(RECORD_TIME_FORMAT)))
    }

    pub fn report_path(&self, timestamp: &NaiveDateTime) -> PathBuf {
        self.root
            .join("report")
            .join(format!("{} report.html", timestamp.format(RECORD_TIME_FORMAT)))
    }

    /// Copy a run's log and report into the history
    pub async fn store(&self, timestamp: &NaiveDateTime, log: &Path, report: &Path) -> Result<()> {
        for (source, target) in [
            (log, self.log_path(timestamp)),
            (report, self.report_path(timestamp)),
        ] {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(source, &target).await.with_context(|| {
                format!("Failed to archive {} to {}", source.display(), target.display())
            })?;
        }
        info!("Archived run of {} in {}", timestamp, self.root.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_store() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("caliper.log");
        let report = dir.path().join("report.html");
        std::fs::write(&log, "log").unwrap();
        std::fs::write(&report, "<html/>").unwrap();

        let archive = RunArchive::new(dir.path().join("caliper_history"));
        let timestamp = NaiveDate::from_ymd_opt(2020, 6, 5)
            .unwrap()
            .and_hms_opt(10, 23, 45)
            .unwrap();
        archive.store(&timestamp, &log, &report).await.unwrap();

        let archived = dir
            .path()
            .join("caliper_history/log/2020-06-05 10:23:45 caliper.log");
        assert_eq!(std::fs::read_to_string(archived).unwrap(), "log");
        assert!(archive.report_path(&timestamp).exists());
    }

    #[tokio::test]
    async fn test_missing_report() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("caliper.log");
        std::fs::write(&log, "log").unwrap();
        let archive = RunArchive::new(dir.path().join("history"));
        let timestamp = NaiveDate::from_ymd_opt(2021, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(archive
            .store(&timestamp, &log, &dir.path().join("report.html"))
            .await
            .is_err());
    }
}
