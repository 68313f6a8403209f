//! Undo/Redo history
//!
//! This module keeps two stacks of [`EditRecord`]s per buffer:
//! - Every completed transaction is one undo entry
//! - A new edit discards the redo stack (branches are not kept)
//! - Consecutive typed insertions may be coalesced into a single entry
//! - The oldest entries are evicted once the configured limit is reached
//!
//! The stacks only store records. Applying them (inverting for undo,
//! verifying the bytes about to be removed) is done by the transaction layer.

use crate::edit::{EditKind, EditRecord};
use crate::settings::BufferOptions;
use std::collections::VecDeque;

/// What [`UndoHistory::record`] did with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Pushed as a new undo entry
    Pushed,
    /// Merged into the previous undo entry
    Coalesced,
    /// Pushed, and this many of the oldest entries were dropped
    Evicted(usize),
}

/// Undo and redo stacks of one buffer
#[derive(Debug, Clone, Default)]
pub struct UndoHistory {
    undo: VecDeque<EditRecord>,
    redo: Vec<EditRecord>,
    total_memory: usize,
}

impl UndoHistory {
    /// Create an empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed edit, clearing the redo stack
    pub fn record(&mut self, record: EditRecord, options: &BufferOptions) -> RecordOutcome {
        self.clear_redo();

        if options.coalesce_insertions {
            if let Some(previous) = self.undo.back_mut() {
                if can_coalesce(previous, &record, options) {
                    let added = record.modifications[0].inserted.len();
                    previous.modifications[0]
                        .inserted
                        .extend_from_slice(&record.modifications[0].inserted);
                    previous.timestamp = record.timestamp;
                    self.total_memory += added;
                    return RecordOutcome::Coalesced;
                }
            }
        }

        self.total_memory += record.estimated_size();
        self.undo.push_back(record);

        match self.enforce_limit(options.history_limit) {
            0 => RecordOutcome::Pushed,
            n => RecordOutcome::Evicted(n),
        }
    }

    /// Take the most recent undo entry
    pub fn pop_undo(&mut self) -> Option<EditRecord> {
        let record = self.undo.pop_back()?;
        self.total_memory = self.total_memory.saturating_sub(record.estimated_size());
        Some(record)
    }

    /// Put an entry back on the undo stack without touching redo
    pub fn push_undo(&mut self, record: EditRecord) {
        self.total_memory += record.estimated_size();
        self.undo.push_back(record);
    }

    /// Take the most recently undone entry
    pub fn pop_redo(&mut self) -> Option<EditRecord> {
        let record = self.redo.pop()?;
        self.total_memory = self.total_memory.saturating_sub(record.estimated_size());
        Some(record)
    }

    /// Remember an undone entry for redo
    pub fn push_redo(&mut self, record: EditRecord) {
        self.total_memory += record.estimated_size();
        self.redo.push(record);
    }

    /// Drop the oldest entries until at most `limit` remain
    pub fn enforce_limit(&mut self, limit: usize) -> usize {
        let mut evicted = 0;
        while self.undo.len() > limit {
            if let Some(old) = self.undo.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(old.estimated_size());
                evicted += 1;
            }
        }
        evicted
    }

    /// Check if we can undo
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Check if we can redo
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo.len()
    }

    /// The entry the next undo would revert
    pub fn peek_undo(&self) -> Option<&EditRecord> {
        self.undo.back()
    }

    /// The entry the next redo would re-apply
    pub fn peek_redo(&self) -> Option<&EditRecord> {
        self.redo.last()
    }

    /// Descriptions of the undo entries, most recent first
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.undo.iter().rev().map(EditRecord::description).collect()
    }

    /// Get current memory usage
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    /// Clear all history
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.total_memory = 0;
    }

    fn clear_redo(&mut self) {
        for record in self.redo.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(record.estimated_size());
        }
    }
}

/// Whether `next` continues the typing run recorded in `previous`
fn can_coalesce(previous: &EditRecord, next: &EditRecord, options: &BufferOptions) -> bool {
    let ([prev], [cur]) = (previous.modifications.as_slice(), next.modifications.as_slice()) else {
        return false;
    };

    previous.kind == EditKind::Normal
        && next.kind == EditKind::Normal
        && !next.source.is_none()
        && previous.source == next.source
        && prev.is_insertion()
        && cur.is_insertion()
        && prev.offset + prev.inserted.len() == cur.offset
        && prev.inserted.len() + cur.inserted.len() <= options.coalesce_max_bytes
        && !cur.inserted.contains(&b'\n')
        && next
            .timestamp
            .checked_duration_since(previous.timestamp)
            .is_some_and(|gap| gap <= options.coalesce_window)
}
