use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ItemId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl ItemStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemStatus::Succeeded | ItemStatus::Failed)
    }

    /// Statuses only move forward: Pending -> Running -> Succeeded | Failed.
    pub fn can_advance_to(self, next: ItemStatus) -> bool {
        matches!(
            (self, next),
            (ItemStatus::Pending, ItemStatus::Running)
                | (ItemStatus::Running, ItemStatus::Succeeded)
                | (ItemStatus::Running, ItemStatus::Failed)
        )
    }
}

/// A file submitted for recognition, as shown in the upload list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: ItemId,
    pub path: PathBuf,
    pub display_name: String,
    pub status: ItemStatus,
    pub last_error: Option<String>,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl QueueItem {
    pub fn new(path: PathBuf) -> Self {
        let display_name = display_name(&path);
        Self {
            id: Uuid::now_v7(),
            path,
            display_name,
            status: ItemStatus::Pending,
            last_error: None,
            attempts: 0,
            enqueued_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Final path segment, split on either separator so Windows paths dropped
/// onto a Unix build still get a readable name.
pub fn display_name(path: &Path) -> String {
    let raw = path.to_string_lossy();
    raw.rsplit(['/', '\\'])
        .find(|segment| !segment.is_empty())
        .unwrap_or(&*raw)
        .to_string()
}
