pub mod batch;
pub mod queue_item;

pub use batch::BatchStats;
pub use queue_item::{ItemId, ItemStatus, QueueItem};
