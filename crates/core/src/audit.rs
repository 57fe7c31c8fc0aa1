//! Append-only, size-capped audit trail of mutating gateway operations.
//!
//! Entries are kept newest-first. Every append is a read-modify-write of the whole persisted
//! document performed under the log's writer lock: the new entry goes to the head and the list
//! is truncated to the configured capacity, evicting the oldest entries.

use crate::store;
use crate::GatewayResult;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Kinds of audited operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuditAction {
    Upload,
    FolderCreate,
    AreaCreate,
    AreaUpdate,
    AreaDelete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Upload => "upload",
            AuditAction::FolderCreate => "folder-create",
            AuditAction::AreaCreate => "area-create",
            AuditAction::AreaUpdate => "area-update",
            AuditAction::AreaDelete => "area-delete",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single audit record.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AuditLogEntry {
    /// Unix milliseconds, strictly increasing across the log.
    pub id: i64,
    pub area: String,
    pub user: String,
    pub action: String,
    pub detail: String,
    pub time: DateTime<Utc>,
}

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    capacity: usize,
    writer: Mutex<()>,
}

impl AuditLog {
    pub fn new(path: PathBuf, capacity: usize) -> Self {
        Self {
            path,
            capacity: capacity.max(1),
            writer: Mutex::new(()),
        }
    }

    /// Appends an entry at the head of the log and returns it.
    pub async fn record(
        &self,
        area: &str,
        user: &str,
        action: AuditAction,
        detail: &str,
    ) -> GatewayResult<AuditLogEntry> {
        let _guard = self.writer.lock().await;
        let mut entries = self.read_all().await?;

        let time = Utc::now();
        let id = next_id(time, entries.first());
        let entry = AuditLogEntry {
            id,
            area: area.to_owned(),
            user: user.to_owned(),
            action: action.as_str().to_owned(),
            detail: detail.to_owned(),
            time,
        };

        entries.insert(0, entry.clone());
        entries.truncate(self.capacity);
        store::write_list(&self.path, &entries).await?;

        tracing::info!(
            area = %entry.area,
            user = %entry.user,
            action = %entry.action,
            "audit: {}",
            entry.detail
        );
        Ok(entry)
    }

    /// The persisted log, newest first; empty if nothing has been recorded yet.
    pub async fn read_all(&self) -> GatewayResult<Vec<AuditLogEntry>> {
        Ok(store::read_list(&self.path).await?.unwrap_or_default())
    }
}

/// Millisecond timestamp, bumped past the newest entry so ids never repeat or go backwards.
fn next_id(now: DateTime<Utc>, newest: Option<&AuditLogEntry>) -> i64 {
    let millis = now.timestamp_millis();
    match newest {
        Some(prev) if millis <= prev.id => prev.id + 1,
        _ => millis,
    }
}
