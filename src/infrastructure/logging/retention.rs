//! Deletes rolled log files older than the retention period.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

/// Remove `*.log*` files in `log_dir` last modified more than
/// `retention_days` ago. Returns the number of files deleted.
pub async fn cleanup_old_logs(log_dir: impl AsRef<Path>, retention_days: u32) -> Result<usize> {
    let log_dir = log_dir.as_ref();
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - Duration::days(i64::from(retention_days));
    let mut deleted = 0;

    let mut entries = tokio::fs::read_dir(log_dir)
        .await
        .context("failed to read log directory")?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .context("failed to read directory entry")?
    {
        let path = entry.path();
        let is_log = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.contains(".log"));
        if !is_log {
            continue;
        }

        let modified: DateTime<Utc> = match entry.metadata().await.and_then(|m| m.modified()) {
            Ok(modified) => modified.into(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read log file age");
                continue;
            }
        };

        if modified < cutoff {
            tokio::fs::remove_file(&path)
                .await
                .with_context(|| format!("failed to delete {}", path.display()))?;
            deleted += 1;
        }
    }

    if deleted > 0 {
        info!(count = deleted, "cleaned up old log files");
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cleanup_respects_retention_and_extension() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lab-agent.log.2025-01-01"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep").unwrap();

        assert_eq!(cleanup_old_logs(dir.path(), 30).await.unwrap(), 0);

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(cleanup_old_logs(dir.path(), 0).await.unwrap(), 1);
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(dir.path().join("none"), 1).await.unwrap(), 0);
    }
}
