use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::claims::ClaimSet;
use crate::error::AppError;
use crate::models::ItemId;
use crate::notify::Notifier;
use crate::processor::QueueProcessor;
use crate::validate;

pub const DROP_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOrigin {
    DragDrop,
    Dialog,
    Programmatic,
}

/// One delivery from a file source: a drag-and-drop, a dialog pick, or an
/// append from code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropEvent {
    pub origin: DropOrigin,
    pub paths: Vec<PathBuf>,
}

impl DropEvent {
    pub fn new(origin: DropOrigin, paths: Vec<PathBuf>) -> Self {
        Self { origin, paths }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropOutcome {
    pub accepted: Vec<ItemId>,
    pub rejected: usize,
    pub duplicates: usize,
    /// The whole event was discarded as a repeat delivery of the previous drop.
    pub debounced: bool,
}

/// Something that can deliver drop events, such as a window's drag-and-drop hook.
pub trait DropSource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<DropEvent>, AppError>;
}

/// Drop source backed by a plain channel. Can be attached once.
pub struct ChannelDropSource {
    events: Option<mpsc::Receiver<DropEvent>>,
}

impl ChannelDropSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<DropEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { events: Some(rx) })
    }
}

impl DropSource for ChannelDropSource {
    fn subscribe(&mut self) -> Result<mpsc::Receiver<DropEvent>, AppError> {
        self.events
            .take()
            .ok_or_else(|| AppError::EventSource("drop source already attached".to_string()))
    }
}

/// Turns raw drop and pick events into validated, de-duplicated batches for
/// the queue processor.
pub struct DropSourceAdapter {
    processor: QueueProcessor,
    claims: Arc<ClaimSet>,
    notifier: Arc<dyn Notifier>,
    debounce: Duration,
    last_drop: Mutex<Option<Instant>>,
}

impl DropSourceAdapter {
    pub fn new(
        processor: QueueProcessor,
        claims: Arc<ClaimSet>,
        notifier: Arc<dyn Notifier>,
        debounce: Duration,
    ) -> Self {
        Self {
            processor,
            claims,
            notifier,
            debounce,
            last_drop: Mutex::new(None),
        }
    }

    pub fn handle(&self, event: DropEvent) -> Result<DropOutcome, AppError> {
        self.handle_at(event, Instant::now())
    }

    pub fn handle_at(&self, event: DropEvent, now: Instant) -> Result<DropOutcome, AppError> {
        if event.origin == DropOrigin::DragDrop && self.is_repeat_delivery(now) {
            tracing::debug!(
                "Discarding drop of {} path(s) delivered within {:?} of the previous one",
                event.paths.len(),
                self.debounce
            );
            return Ok(DropOutcome {
                debounced: true,
                ..DropOutcome::default()
            });
        }

        let (valid, invalid): (Vec<PathBuf>, Vec<PathBuf>) = event
            .paths
            .into_iter()
            .partition(|path| validate::is_acceptable(path));

        if !invalid.is_empty() {
            tracing::debug!("Rejected unsupported files: {invalid:?}");
            self.notifier.rejected_paths(invalid.len());
        }

        let claimed = self.claims.try_claim_at(valid, now);
        if !claimed.already_claimed.is_empty() {
            tracing::debug!(
                "Ignoring {} path(s) already submitted: {:?}",
                claimed.already_claimed.len(),
                claimed.already_claimed
            );
        }

        let accepted = match self.processor.enqueue(claimed.accepted.iter().cloned()) {
            Ok(accepted) => accepted,
            Err(e) => {
                self.claims.release(&claimed.accepted);
                return Err(e);
            }
        };

        Ok(DropOutcome {
            accepted,
            rejected: invalid.len(),
            duplicates: claimed.already_claimed.len(),
            debounced: false,
        })
    }

    /// Records this delivery and reports whether it landed inside the debounce
    /// window of the previous drag-and-drop.
    fn is_repeat_delivery(&self, now: Instant) -> bool {
        let mut last = self.last_drop.lock().unwrap_or_else(PoisonError::into_inner);
        let repeat = last.is_some_and(|previous| now.saturating_duration_since(previous) < self.debounce);
        *last = Some(now);
        repeat
    }

    /// Forward events from `source` until it closes or shutdown is signaled.
    /// A failure to subscribe only disables this source; direct `handle` calls
    /// keep working.
    pub fn attach<S: DropSource>(
        self: &Arc<Self>,
        source: &mut S,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>, AppError> {
        let mut events = source.subscribe()?;
        let adapter = Arc::clone(self);

        Ok(tokio::spawn(async move {
            tracing::debug!("Drop source attached");

            loop {
                if *shutdown.borrow() {
                    break;
                }

                tokio::select! {
                    event = events.recv() => match event {
                        Some(event) => {
                            if let Err(e) = adapter.handle(event) {
                                tracing::error!("Failed to submit dropped files: {e}");
                            }
                        }
                        None => break,
                    },
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }

            tracing::debug!("Drop source detached");
        }))
    }
}
