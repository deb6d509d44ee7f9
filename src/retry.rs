use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

static TRANSIENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)rate[ _-]?limit|too many requests|network|time[d ]?\s?out|connection (?:reset|refused)|econnreset|econnrefused|dns|name resolution|enotfound",
    )
    .unwrap()
});

/// Heuristic: does this recognition failure look like it might clear up on its own?
pub fn is_retryable(message: &str) -> bool {
    TRANSIENT_RE.is_match(message)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            delay: RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// `attempts` counts every call made so far, including the first one.
    pub fn should_retry(&self, attempts: u32, message: &str) -> bool {
        attempts <= self.max_retries && is_retryable(message)
    }
}
