//! Edit records and modification transactions
//!
//! A [`Transaction`] batches byte-range replacements against a buffer. When it
//! ends, the operations are normalized into an [`EditRecord`]: a list of
//! [`Modification`]s in pre-edit coordinates, strictly increasing and
//! separated by at least one untouched byte. Records own copies of both the
//! removed and the inserted bytes, so they stay valid forever and can be
//! inverted for undo.

pub mod transaction;

pub use transaction::Transaction;

use crate::error::{BufferError, Result};
use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Identifies the consumer (editor element, command, ...) that caused an edit
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Edits with no particular origin
    pub const NONE: SourceId = SourceId(0);

    /// Allocate a process-wide unique source id
    #[must_use]
    pub fn unique() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SourceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_none(&self) -> bool {
        *self == Self::NONE
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Why an edit happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditKind {
    /// A regular edit requested by a consumer
    Normal,
    /// Replay of an inverted record from the undo stack
    Undo,
    /// Replay of a record from the redo stack
    Redo,
}

/// One replacement of a byte range, in pre-edit coordinates
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Modification {
    /// Start of the replaced range
    pub offset: usize,
    /// Bytes that were in `[offset, offset + removed.len())` before the edit
    pub removed: Vec<u8>,
    /// Bytes that replace them
    pub inserted: Vec<u8>,
}

impl Modification {
    /// Replaced range in pre-edit coordinates
    pub fn removed_range(&self) -> Range<usize> {
        self.offset..self.offset + self.removed.len()
    }

    /// End of the replaced range in pre-edit coordinates
    pub fn end(&self) -> usize {
        self.offset + self.removed.len()
    }

    /// Net change in buffer length
    pub fn delta(&self) -> isize {
        self.inserted.len() as isize - self.removed.len() as isize
    }

    pub fn is_insertion(&self) -> bool {
        self.removed.is_empty() && !self.inserted.is_empty()
    }

    pub fn is_deletion(&self) -> bool {
        self.inserted.is_empty() && !self.removed.is_empty()
    }

    /// Get minimal size (for memory estimation)
    pub fn estimated_size(&self) -> usize {
        self.removed.len() + self.inserted.len() + 32
    }
}

/// The normalized, invertible description of one completed transaction
#[derive(Clone, Debug)]
pub struct EditRecord {
    /// Strictly increasing, non-overlapping, non-touching modifications
    pub modifications: Vec<Modification>,
    /// Who requested the edit
    pub source: SourceId,
    pub kind: EditKind,
    /// When the edit was applied
    pub timestamp: Instant,
}

impl PartialEq for EditRecord {
    fn eq(&self, other: &Self) -> bool {
        self.modifications == other.modifications
            && self.source == other.source
            && self.kind == other.kind
    }
}

impl EditRecord {
    pub fn new(modifications: Vec<Modification>, source: SourceId, kind: EditKind) -> Self {
        Self {
            modifications,
            source,
            kind,
            timestamp: Instant::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }

    /// Net change in buffer length
    pub fn delta(&self) -> isize {
        self.modifications.iter().map(Modification::delta).sum()
    }

    /// The record that undoes this one, expressed in post-edit coordinates
    ///
    /// Each modification swaps its removed and inserted bytes and moves to
    /// where its replacement landed once every earlier modification was
    /// applied.
    #[must_use]
    pub fn inverse(&self) -> EditRecord {
        let mut shift: isize = 0;
        let modifications = self
            .modifications
            .iter()
            .map(|m| {
                let offset = (m.offset as isize + shift) as usize;
                shift += m.delta();
                Modification {
                    offset,
                    removed: m.inserted.clone(),
                    inserted: m.removed.clone(),
                }
            })
            .collect();

        EditRecord {
            modifications,
            source: self.source,
            kind: self.kind,
            timestamp: self.timestamp,
        }
    }

    /// Apply the record to a plain byte vector holding the pre-edit content
    pub fn apply_to(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let mut shift: isize = 0;
        for m in &self.modifications {
            let start = (m.offset as isize + shift) as usize;
            let end = start + m.removed.len();
            if end > bytes.len() {
                return Err(BufferError::out_of_range(start, m.removed.len(), bytes.len()));
            }
            bytes.splice(start..end, m.inserted.iter().copied());
            shift += m.delta();
        }
        Ok(())
    }

    /// Estimated memory size
    pub fn estimated_size(&self) -> usize {
        self.modifications
            .iter()
            .map(Modification::estimated_size)
            .sum::<usize>()
            + 32
    }

    /// Describe the edit for UI (e.g., "Delete 42 bytes")
    #[must_use]
    pub fn description(&self) -> String {
        match self.modifications.as_slice() {
            [] => "No change".to_string(),
            [m] if m.is_insertion() => {
                if m.inserted.len() <= 20 {
                    let s = String::from_utf8_lossy(&m.inserted).replace('\n', "\\n");
                    format!("Insert '{}'", s)
                } else {
                    format!("Insert {} bytes", m.inserted.len())
                }
            }
            [m] if m.is_deletion() => {
                if m.removed.len() <= 20 {
                    let s = String::from_utf8_lossy(&m.removed).replace('\n', "\\n");
                    format!("Delete '{}'", s)
                } else {
                    format!("Delete {} bytes", m.removed.len())
                }
            }
            [m] => format!(
                "Replace {} bytes with {} bytes",
                m.removed.len(),
                m.inserted.len()
            ),
            many => format!("Change {} ranges", many.len()),
        }
    }
}

/// An operation queued on a transaction, not yet validated
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct PendingOp {
    pub offset: usize,
    pub remove_len: usize,
    pub insert: Vec<u8>,
}

impl PendingOp {
    fn end(&self) -> usize {
        self.offset + self.remove_len
    }
}

/// Validate and normalize queued operations against a buffer of length `len`.
///
/// Operations are sorted by `(offset, end)`; the sort is stable, so pure
/// insertions at the same offset keep their queue order. Operations whose
/// ranges overlap are rejected. Touching operations are merged, and no-ops
/// are dropped, so the result is strictly increasing with gaps.
pub(crate) fn normalize(mut ops: Vec<PendingOp>, len: usize) -> Result<Vec<PendingOp>> {
    for op in &ops {
        match op.offset.checked_add(op.remove_len) {
            Some(end) if end <= len => {}
            _ => return Err(BufferError::out_of_range(op.offset, op.remove_len, len)),
        }
    }

    ops.sort_by_key(|op| (op.offset, op.end()));

    for pair in ops.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if b.offset < a.end() {
            return Err(BufferError::OverlappingEdits {
                first: a.offset..a.end(),
                second: b.offset..b.end(),
            });
        }
    }

    let mut normalized: Vec<PendingOp> = Vec::with_capacity(ops.len());
    for op in ops {
        if op.remove_len == 0 && op.insert.is_empty() {
            continue;
        }
        match normalized.last_mut() {
            Some(last) if last.end() == op.offset => {
                last.remove_len += op.remove_len;
                last.insert.extend_from_slice(&op.insert);
            }
            _ => normalized.push(op),
        }
    }
    Ok(normalized)
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
