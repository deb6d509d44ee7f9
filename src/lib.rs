pub mod claims;
pub mod config;
pub mod drop_source;
pub mod error;
pub mod models;
pub mod notify;
pub mod processor;
pub mod recognizer;
pub mod retry;
pub mod tracker;
pub mod validate;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::claims::ClaimSet;
use crate::config::Config;
use crate::drop_source::DropSourceAdapter;
use crate::notify::Notifier;
use crate::processor::QueueProcessor;
use crate::recognizer::Recognizer;
use crate::tracker::ItemTracker;

/// Everything one application session needs to accept files.
pub struct Intake {
    pub processor: QueueProcessor,
    pub adapter: Arc<DropSourceAdapter>,
    pub claims: Arc<ClaimSet>,
    pub worker: JoinHandle<()>,
}

impl Intake {
    pub fn tracker(&self) -> &ItemTracker {
        self.processor.tracker()
    }
}

/// Wire the processor, claim set and drop adapter together. Must be called
/// inside a Tokio runtime. The drain loop stops once `shutdown` turns true or
/// its sender is dropped.
pub fn build_intake(
    config: &Config,
    recognizer: Arc<dyn Recognizer>,
    notifier: Arc<dyn Notifier>,
    shutdown: watch::Receiver<bool>,
) -> Intake {
    let (processor, worker) = QueueProcessor::spawn(
        config.queue,
        recognizer,
        notifier.clone(),
        ItemTracker::new(),
        shutdown,
    );

    let claims = Arc::new(ClaimSet::new(config.claim_window));
    let adapter = Arc::new(DropSourceAdapter::new(
        processor.clone(),
        claims.clone(),
        notifier,
        config.drop_debounce,
    ));

    tracing::info!(
        "Intake ready (max_concurrent={}, max_retries={}, retry_delay={:?})",
        config.queue.max_concurrent,
        config.queue.retry.max_retries,
        config.queue.retry.delay
    );

    Intake {
        processor,
        adapter,
        claims,
        worker,
    }
}
