use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};

use crate::error::AppError;
use crate::models::{BatchStats, ItemId, QueueItem};
use crate::notify::Notifier;
use crate::recognizer::{Record, RecognizeError, Recognizer};
use crate::retry::RetryPolicy;
use crate::tracker::ItemTracker;

pub const MAX_CONCURRENT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueConfig {
    pub max_concurrent: usize,
    pub retry: RetryPolicy,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: MAX_CONCURRENT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessorStatus {
    pub phase: Phase,
    /// Items enqueued but not yet terminal.
    pub outstanding: usize,
    pub completed_drains: u64,
    pub last_drain: Option<BatchStats>,
}

impl Default for ProcessorStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            outstanding: 0,
            completed_drains: 0,
            last_drain: None,
        }
    }
}

struct Job {
    id: ItemId,
    path: PathBuf,
}

struct Finished {
    id: ItemId,
    attempts: u32,
    result: Result<Record, RecognizeError>,
}

/// Handle to the queue processor. Cheap to clone; every clone feeds the same
/// drain loop.
#[derive(Clone)]
pub struct QueueProcessor {
    batches: mpsc::UnboundedSender<Vec<Job>>,
    tracker: ItemTracker,
    status: Arc<watch::Sender<ProcessorStatus>>,
}

impl QueueProcessor {
    /// Start the drain loop on the current Tokio runtime.
    pub fn spawn(
        config: QueueConfig,
        recognizer: Arc<dyn Recognizer>,
        notifier: Arc<dyn Notifier>,
        tracker: ItemTracker,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let config = QueueConfig {
            max_concurrent: config.max_concurrent.max(1),
            ..config
        };
        let (batches_tx, batches_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(ProcessorStatus::default());
        let status = Arc::new(status_tx);

        let drain = DrainLoop {
            config,
            recognizer,
            notifier,
            tracker: tracker.clone(),
            status: status.clone(),
            pending: VecDeque::new(),
            in_flight: JoinSet::new(),
            stats: BatchStats::default(),
            draining: false,
        };
        let handle = tokio::spawn(drain.run(batches_rx, shutdown));

        let processor = Self {
            batches: batches_tx,
            tracker,
            status,
        };
        (processor, handle)
    }

    /// Create a `Pending` item per path and hand the batch to the drain loop.
    /// Starts a drain cycle when idle, otherwise joins the running one.
    pub fn enqueue<I>(&self, paths: I) -> Result<Vec<ItemId>, AppError>
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let items: Vec<QueueItem> = paths.into_iter().map(QueueItem::new).collect();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        if self.batches.is_closed() {
            return Err(AppError::Shutdown("queue processor is not running".to_string()));
        }

        let ids: Vec<ItemId> = items.iter().map(|item| item.id).collect();
        let jobs: Vec<Job> = items
            .iter()
            .map(|item| Job {
                id: item.id,
                path: item.path.clone(),
            })
            .collect();

        self.tracker.insert(&items);
        self.status.send_modify(|s| s.outstanding += jobs.len());

        tracing::debug!("Enqueued {} item(s)", jobs.len());

        if self.batches.send(jobs).is_err() {
            self.status.send_modify(|s| s.outstanding = s.outstanding.saturating_sub(ids.len()));
            return Err(AppError::Shutdown("queue processor stopped".to_string()));
        }

        Ok(ids)
    }

    pub fn tracker(&self) -> &ItemTracker {
        &self.tracker
    }

    pub fn status(&self) -> ProcessorStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessorStatus> {
        self.status.subscribe()
    }

    /// Wait until every enqueued item is terminal and the drain cycle has
    /// fired its notifications, or until the processor stops.
    pub async fn wait_idle(&self) -> ProcessorStatus {
        let mut rx = self.status.subscribe();
        let result = rx
            .wait_for(|s| {
                s.phase == Phase::Stopped || (s.phase == Phase::Idle && s.outstanding == 0)
            })
            .await
            .map(|s| (*s).clone());
        result.unwrap_or_else(|_| self.status())
    }
}

struct DrainLoop {
    config: QueueConfig,
    recognizer: Arc<dyn Recognizer>,
    notifier: Arc<dyn Notifier>,
    tracker: ItemTracker,
    status: Arc<watch::Sender<ProcessorStatus>>,
    pending: VecDeque<Job>,
    in_flight: JoinSet<Finished>,
    stats: BatchStats,
    draining: bool,
}

impl DrainLoop {
    async fn run(
        mut self,
        mut batches: mpsc::UnboundedReceiver<Vec<Job>>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::debug!("Queue processor started");
        let mut intake_open = true;

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.dispatch();

            if self.draining && self.pending.is_empty() && self.in_flight.is_empty() {
                self.finish_drain();
            }

            if !intake_open && !self.draining {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                batch = batches.recv(), if intake_open => match batch {
                    Some(jobs) => self.accept(jobs),
                    None => intake_open = false,
                },
                Some(joined) = self.in_flight.join_next() => self.complete(joined),
            }
        }

        let abandoned = self.pending.len() + self.in_flight.len();
        if abandoned > 0 {
            tracing::warn!("Queue processor stopping with {abandoned} unfinished item(s)");
        }
        self.in_flight.shutdown().await;
        self.status.send_modify(|s| s.phase = Phase::Stopped);

        tracing::debug!("Queue processor stopped");
    }

    fn accept(&mut self, jobs: Vec<Job>) {
        if !self.draining {
            self.draining = true;
            self.stats = BatchStats::default();
            self.status.send_modify(|s| s.phase = Phase::Draining);
            tracing::info!("Drain started with {} item(s)", jobs.len());
        }
        self.pending.extend(jobs);
    }

    /// Fill free slots. A slot stays taken while its item waits out a retry delay.
    fn dispatch(&mut self) {
        while self.in_flight.len() < self.config.max_concurrent {
            let Some(job) = self.pending.pop_front() else {
                break;
            };

            self.tracker.mark_running(job.id);
            self.in_flight.spawn(attempt(
                job,
                self.recognizer.clone(),
                self.tracker.clone(),
                self.config.retry,
            ));
        }
    }

    fn complete(&mut self, joined: Result<Finished, JoinError>) {
        let finished = match joined {
            Ok(finished) => finished,
            Err(e) => {
                tracing::error!("Recognition task ended abnormally: {e}");
                self.status
                    .send_modify(|s| s.outstanding = s.outstanding.saturating_sub(1));
                return;
            }
        };

        match finished.result {
            Ok(record) => {
                tracing::info!(
                    "Recognized {} ({}, attempts={})",
                    record.path.display(),
                    record.file_type.as_str(),
                    finished.attempts
                );
                self.tracker.mark_succeeded(finished.id);
                self.stats.record(true);
            }
            Err(e) => {
                tracing::warn!(
                    "Recognition of item {} failed after {} attempt(s): {e}",
                    finished.id,
                    finished.attempts
                );
                self.tracker.mark_failed(finished.id, e.message);
                self.stats.record(false);
            }
        }

        self.status
            .send_modify(|s| s.outstanding = s.outstanding.saturating_sub(1));
    }

    fn finish_drain(&mut self) {
        let stats = std::mem::take(&mut self.stats);
        self.draining = false;

        tracing::info!(
            "Drain finished: {} succeeded, {} failed",
            stats.succeeded,
            stats.failed
        );

        if !stats.is_empty() {
            self.notifier.refresh_after_batch();
            self.notifier.batch_summary(stats);
        }

        self.status.send_modify(|s| {
            s.phase = Phase::Idle;
            s.completed_drains += 1;
            s.last_drain = Some(stats);
        });
    }
}

/// Run one item to a result. Attempts are strictly sequential; the retry
/// delay is an async sleep so other slots keep moving.
async fn attempt(
    job: Job,
    recognizer: Arc<dyn Recognizer>,
    tracker: ItemTracker,
    retry: RetryPolicy,
) -> Finished {
    let mut attempts = 0;

    loop {
        attempts += 1;
        tracker.record_attempt(job.id, attempts);

        let result = AssertUnwindSafe(recognizer.recognize(&job.path))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(RecognizeError::from("recognizer panicked")));

        match result {
            Err(e) if retry.should_retry(attempts, &e.message) => {
                tracing::debug!(
                    "Transient failure for {} (attempt {attempts}), retrying in {:?}: {e}",
                    job.path.display(),
                    retry.delay
                );
                tokio::time::sleep(retry.delay).await;
            }
            result => {
                return Finished {
                    id: job.id,
                    attempts,
                    result,
                };
            }
        }
    }
}
