use std::path::{Path, PathBuf};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

pub const CLAIM_WINDOW: Duration = Duration::from_secs(5);

/// Result of claiming a batch of paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub accepted: Vec<PathBuf>,
    pub already_claimed: Vec<PathBuf>,
}

/// Short-lived reservations that keep the same file from being submitted twice
/// in quick succession.
///
/// A claim lapses a fixed window after it was taken, whether or not the item it
/// guards has finished. That keeps a lost item from locking its path forever.
pub struct ClaimSet {
    /// path -> expiry
    entries: DashMap<PathBuf, Instant>,
    window: Duration,
}

impl ClaimSet {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn try_claim<I>(&self, paths: I) -> ClaimOutcome
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.try_claim_at(paths, Instant::now())
    }

    /// Partition `paths` into newly claimed and already claimed. Each path is
    /// claimed under its shard lock, so overlapping batches racing for the same
    /// file see exactly one winner. Lapsed claims are swept first.
    pub fn try_claim_at<I>(&self, paths: I, now: Instant) -> ClaimOutcome
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.cleanup_at(now);
        let mut outcome = ClaimOutcome::default();

        for path in paths {
            if self.claim_one(path.clone(), now) {
                outcome.accepted.push(path);
            } else {
                outcome.already_claimed.push(path);
            }
        }

        outcome
    }

    fn claim_one(&self, path: PathBuf, now: Instant) -> bool {
        let expires_at = now + self.window;
        match self.entries.entry(path) {
            Entry::Occupied(mut entry) => {
                if *entry.get() <= now {
                    entry.insert(expires_at);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(expires_at);
                true
            }
        }
    }

    /// Give up claims on paths that never made it into the queue.
    pub fn release<'a, I>(&self, paths: I)
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        for path in paths {
            self.entries.remove(path);
        }
    }

    pub fn is_claimed(&self, path: &Path) -> bool {
        self.is_claimed_at(path, Instant::now())
    }

    pub fn is_claimed_at(&self, path: &Path, now: Instant) -> bool {
        self.entries
            .get(path)
            .is_some_and(|expires_at| *expires_at > now)
    }

    /// Drop lapsed claims.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    pub fn cleanup_at(&self, now: Instant) {
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClaimSet {
    fn default() -> Self {
        Self::new(CLAIM_WINDOW)
    }
}
