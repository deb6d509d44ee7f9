use crate::models::BatchStats;

/// Aggregate toast shown once a drain cycle settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMessage {
    AllSucceeded(usize),
    Mixed { succeeded: usize, failed: usize },
    AllFailed(usize),
}

impl SummaryMessage {
    /// None when nothing finished, so no toast is shown.
    pub fn from_stats(stats: BatchStats) -> Option<Self> {
        match (stats.succeeded, stats.failed) {
            (0, 0) => None,
            (succeeded, 0) => Some(SummaryMessage::AllSucceeded(succeeded)),
            (0, failed) => Some(SummaryMessage::AllFailed(failed)),
            (succeeded, failed) => Some(SummaryMessage::Mixed { succeeded, failed }),
        }
    }
}

impl std::fmt::Display for SummaryMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SummaryMessage::AllSucceeded(n) => write!(f, "Recognized {n} invoice(s)"),
            SummaryMessage::Mixed { succeeded, failed } => {
                write!(f, "Recognition finished: {succeeded} succeeded, {failed} failed")
            }
            SummaryMessage::AllFailed(n) => write!(f, "Recognition failed for {n} invoice(s)"),
        }
    }
}

/// Sinks for the few notifications the intake core produces.
pub trait Notifier: Send + Sync {
    /// A drain cycle finished with at least one item; persisted state changed.
    fn refresh_after_batch(&self);

    /// Final counts of a drain cycle. Never called with both counts zero.
    fn batch_summary(&self, stats: BatchStats);

    /// Some paths of a drop were skipped for having an unsupported extension.
    fn rejected_paths(&self, count: usize);
}

/// Writes notifications to the log. Used by the binary, which has no toast UI.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn refresh_after_batch(&self) {
        tracing::debug!("Batch settled, refreshing results");
    }

    fn batch_summary(&self, stats: BatchStats) {
        match SummaryMessage::from_stats(stats) {
            Some(message @ SummaryMessage::AllSucceeded(_)) => tracing::info!("{message}"),
            Some(message) => tracing::warn!("{message}"),
            None => {}
        }
    }

    fn rejected_paths(&self, count: usize) {
        tracing::warn!("{count} file(s) skipped: only JPG, PNG, BMP or PDF files are supported");
    }
}
