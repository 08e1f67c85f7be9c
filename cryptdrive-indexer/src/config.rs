//! Indexer configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one share indexing session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Nodes requested per snapshot page.
    pub page_size: usize,

    /// Minimum number of decrypted items accumulated before the pipeline
    /// yields a batch (the final batch may be smaller).
    pub batch_threshold: usize,

    /// Maximum number of decrypt operations in flight at once.
    pub decrypt_concurrency: usize,

    /// Poll interval for fetching new change events (seconds).
    pub poll_interval_secs: u64,

    /// Consecutive cursor failures tolerated before a full reset.
    pub cursor_retry_limit: u32,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            page_size: 500,
            batch_threshold: 50,
            decrypt_concurrency: default_decrypt_concurrency(),
            poll_interval_secs: 30,
            cursor_retry_limit: 3,
        }
    }
}

/// Decrypt concurrency derived from hardware parallelism, clamped so a burst
/// of cheap decrypts cannot saturate the scheduler.
pub fn default_decrypt_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
        .clamp(1, 8)
}
