use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use serde::Serialize;

use crate::models::{ItemId, ItemStatus, QueueItem};

/// Counts shown in the upload list header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct QueueProgress {
    pub in_progress: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl QueueProgress {
    pub fn total(&self) -> usize {
        self.in_progress + self.succeeded + self.failed
    }

    /// Fraction of listed items that have reached a terminal status.
    pub fn completed_ratio(&self) -> f64 {
        match self.total() {
            0 => 1.0,
            total => (self.succeeded + self.failed) as f64 / total as f64,
        }
    }
}

/// Live view of submitted items.
///
/// Readers always see whole items: every mutation happens under the write lock.
/// Status changes are made by the queue processor only; the public mutators are
/// the list actions a user can take on finished items.
#[derive(Clone, Default)]
pub struct ItemTracker {
    items: Arc<RwLock<Vec<QueueItem>>>,
}

impl ItemTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.read().clone()
    }

    pub fn get(&self, id: ItemId) -> Option<QueueItem> {
        self.read().iter().find(|item| item.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn progress(&self) -> QueueProgress {
        let mut progress = QueueProgress::default();
        for item in self.read().iter() {
            match item.status {
                ItemStatus::Pending | ItemStatus::Running => progress.in_progress += 1,
                ItemStatus::Succeeded => progress.succeeded += 1,
                ItemStatus::Failed => progress.failed += 1,
            }
        }
        progress
    }

    /// Remove a finished item. Returns false if the item is unknown or still active.
    pub fn remove(&self, id: ItemId) -> bool {
        let mut items = self.write();
        match items.iter().position(|item| item.id == id) {
            Some(index) if items[index].status.is_terminal() => {
                items.remove(index);
                true
            }
            _ => false,
        }
    }

    /// Remove every succeeded or failed item, returning how many went.
    pub fn clear_completed(&self) -> usize {
        let mut items = self.write();
        let before = items.len();
        items.retain(|item| !item.status.is_terminal());
        before - items.len()
    }

    pub(crate) fn insert(&self, new_items: &[QueueItem]) {
        self.write().extend_from_slice(new_items);
    }

    pub(crate) fn mark_running(&self, id: ItemId) -> bool {
        self.advance(id, ItemStatus::Running, |_| {})
    }

    pub(crate) fn record_attempt(&self, id: ItemId, attempts: u32) {
        if let Some(item) = self.write().iter_mut().find(|item| item.id == id) {
            item.attempts = attempts;
        }
    }

    pub(crate) fn mark_succeeded(&self, id: ItemId) -> bool {
        self.advance(id, ItemStatus::Succeeded, |item| {
            item.finished_at = Some(Utc::now());
        })
    }

    pub(crate) fn mark_failed(&self, id: ItemId, error: String) -> bool {
        self.advance(id, ItemStatus::Failed, |item| {
            item.last_error = Some(error);
            item.finished_at = Some(Utc::now());
        })
    }

    fn advance<F>(&self, id: ItemId, next: ItemStatus, update: F) -> bool
    where
        F: FnOnce(&mut QueueItem),
    {
        let mut items = self.write();
        let Some(item) = items.iter_mut().find(|item| item.id == id) else {
            tracing::debug!("Item {id} no longer tracked, skipping {next:?}");
            return false;
        };

        if !item.status.can_advance_to(next) {
            tracing::warn!("Refusing status change {:?} -> {next:?} for item {id}", item.status);
            return false;
        }

        item.status = next;
        update(item);
        true
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<QueueItem>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<QueueItem>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}
