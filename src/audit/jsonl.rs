use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::{AuditEntry, AuditSink};
use crate::error::{AuditError, AuditResult};

/// Append-only JSON Lines audit log on disk.
///
/// Each entry is written as one compact JSON object followed by a newline.
/// The file is never rewritten or truncated.
#[derive(Debug, Clone)]
pub struct JsonlAuditLog {
    path: PathBuf,
}

impl JsonlAuditLog {
    /// Open a log, creating parent directories and an empty file if needed.
    pub async fn open(path: impl Into<PathBuf>) -> AuditResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        info!(path = %path.display(), "Opened audit log");
        Ok(Self { path })
    }

    /// Location of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every entry currently in the log.
    pub async fn read_entries(&self) -> AuditResult<Vec<AuditEntry>> {
        read_entries(&self.path).await
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn append(&self, entry: &AuditEntry) -> AuditResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(entry_id = %entry.entry_id, path = %self.path.display(), "Appended audit entry");
        Ok(())
    }
}

/// Parse a JSON Lines audit log.
///
/// A missing file yields no entries. Blank lines are skipped; any other line
/// that does not parse fails with [`AuditError::Corrupt`] carrying its
/// 1-based line number.
pub(crate) async fn read_entries(path: &Path) -> AuditResult<Vec<AuditEntry>> {
    let raw = match fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Audit log does not exist yet");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            warn!(path = %path.display(), line = index + 1, "Skipping blank audit log line");
            continue;
        }
        let entry = serde_json::from_str(line).map_err(|e| AuditError::Corrupt {
            line: index + 1,
            message: e.to_string(),
        })?;
        entries.push(entry);
    }

    Ok(entries)
}
