//! Buffer and interpretation options
//!
//! Options are plain structs with defaults. A buffer's options can be
//! replaced at any time with [`Buffer::set_options`](crate::Buffer::set_options).

use crate::constants::history;
use std::time::Duration;

/// Per-buffer options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferOptions {
    /// Maximum number of undo records; the oldest are evicted first
    pub history_limit: usize,
    /// Merge consecutive typed insertions into one undo step
    pub coalesce_insertions: bool,
    /// Maximum delay between two insertions that may be merged
    pub coalesce_window: Duration,
    /// Maximum inserted size of a merged undo step
    pub coalesce_max_bytes: usize,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self {
            history_limit: history::DEFAULT_LIMIT,
            coalesce_insertions: true,
            coalesce_window: Duration::from_millis(history::DEFAULT_COALESCE_WINDOW_MS),
            coalesce_max_bytes: history::DEFAULT_COALESCE_MAX_BYTES,
        }
    }
}

/// Per-interpretation options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretationOptions {
    /// Re-decode the whole document after every update and panic on mismatch
    pub verify_integrity: bool,
}

impl Default for InterpretationOptions {
    fn default() -> Self {
        Self {
            verify_integrity: cfg!(debug_assertions),
        }
    }
}
