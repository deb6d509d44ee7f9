use serde::{Deserialize, Serialize};

/// Terminal outcomes accumulated over one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchStats {
    pub fn record(&mut self, succeeded: bool) {
        if succeeded {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}
