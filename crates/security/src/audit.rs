//! Append-only JSONL audit trail (C11).
//!
//! Writes are best-effort: a failed write is logged and swallowed, never
//! propagated to the caller — an execution must not fail because its audit
//! record couldn't be persisted.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use connectorrt_core::AuditEntry;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// Appends `AuditEntry` records to a JSONL file, serializing concurrent
/// writers through an internal mutex (mirrors how the lineage serializes
/// writes to a single shared `File` handle).
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }

    async fn ensure_open(&self) -> std::io::Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        *guard = Some(file);
        Ok(())
    }

    /// Append one entry. Never returns an error to the caller — failures are
    /// logged at warn level and otherwise ignored.
    pub async fn record(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_record(entry).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "audit write failed, continuing without it"
            );
        }
    }

    async fn try_record(&self, entry: &AuditEntry) -> std::io::Result<()> {
        self.ensure_open().await?;
        let mut line = serde_json::to_string(entry)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push('\n');

        let mut guard = self.file.lock().await;
        if let Some(file) = guard.as_mut() {
            file.write_all(line.as_bytes()).await?;
            file.flush().await?;
        }
        Ok(())
    }

    /// Read the last `limit` entries from disk, oldest first.
    pub async fn read_last(&self, limit: usize) -> std::io::Result<Vec<AuditEntry>> {
        read_last_entries(&self.path, limit).await
    }
}

async fn read_last_entries(path: &Path, limit: usize) -> std::io::Result<Vec<AuditEntry>> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        return Ok(Vec::new());
    }
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(0)).await?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut all = Vec::new();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditEntry>(&line) {
            Ok(entry) => all.push(entry),
            Err(e) => tracing::warn!(error = %e, "skipping malformed audit line"),
        }
    }

    let start = all.len().saturating_sub(limit);
    Ok(all.split_off(start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use connectorrt_core::AuditMeta;
    use tempfile::tempdir;

    fn sample_entry(request_id: &str, success: bool) -> AuditEntry {
        AuditEntry {
            ts: chrono::Utc::now(),
            request_id: request_id.into(),
            connector_id: "slack".into(),
            operation_id: "post_message".into(),
            duration_ms: 120,
            success,
            error: if success { None } else { Some("timeout".into()) },
            meta: AuditMeta::default(),
        }
    }

    #[tokio::test]
    async fn record_creates_directory_and_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("audit.jsonl");
        let log = AuditLog::new(&path);

        log.record(&sample_entry("req-1", true)).await;
        log.record(&sample_entry("req-2", false)).await;

        let entries = log.read_last(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request_id, "req-1");
        assert_eq!(entries[1].request_id, "req-2");
        assert!(!entries[1].success);
    }

    #[tokio::test]
    async fn read_last_respects_limit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let log = AuditLog::new(&path);

        for i in 0..5 {
            log.record(&sample_entry(&format!("req-{i}"), true)).await;
        }

        let entries = log.read_last(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].request_id, "req-3");
        assert_eq!(entries[1].request_id, "req-4");
    }

    #[tokio::test]
    async fn read_last_on_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.jsonl");
        let entries = read_last_entries(&path, 10).await.unwrap();
        assert!(entries.is_empty());
    }
}
