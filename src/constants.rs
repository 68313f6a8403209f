//! Global constants for the rift buffer core

pub mod errors {
    // Error Codes
    pub const OUT_OF_RANGE: &str = "OUT_OF_RANGE";
    pub const OVERLAPPING_EDITS: &str = "OVERLAPPING_EDITS";
    pub const TRANSACTION_IN_PROGRESS: &str = "TRANSACTION_IN_PROGRESS";
    pub const STALE_HISTORY: &str = "STALE_HISTORY";
}

pub mod history {
    /// Maximum number of undo records kept per buffer
    pub const DEFAULT_LIMIT: usize = 1000;

    /// Consecutive insertions closer together than this are merged into one undo step
    pub const DEFAULT_COALESCE_WINDOW_MS: u64 = 750;

    /// Upper bound on the inserted size of a coalesced undo step
    pub const DEFAULT_COALESCE_MAX_BYTES: usize = 256;
}

pub mod text {
    /// Codepoint substituted for undecodable input
    pub const REPLACEMENT_CHAR: char = '\u{FFFD}';
}
