//! Scoped modification transactions

use super::{normalize, EditKind, EditRecord, Modification, PendingOp, SourceId};
use crate::buffer::piece;
use crate::buffer::{Buffer, BufferSnapshot, EditEvent, WriterState};
use crate::error::{BufferError, Result};
use crate::history::{RecordOutcome, UndoHistory};
use std::sync::{Arc, MutexGuard};

/// An open, all-or-nothing batch of modifications on one buffer.
///
/// The transaction holds the buffer's writer lock from [`Buffer::begin`] until
/// it is ended or dropped. Offsets passed to [`modify`](Self::modify) are
/// always in the coordinates of the content the transaction started from,
/// regardless of what else is queued. Dropping a transaction without ending
/// it discards the queued operations.
pub struct Transaction<'a> {
    buffer: &'a Buffer,
    writer: MutexGuard<'a, WriterState>,
    pending: Vec<PendingOp>,
    source: SourceId,
    kind: EditKind,
}

impl<'a> Transaction<'a> {
    pub(crate) fn new(
        buffer: &'a Buffer,
        writer: MutexGuard<'a, WriterState>,
        source: SourceId,
        kind: EditKind,
    ) -> Self {
        Self {
            buffer,
            writer,
            pending: Vec::new(),
            source,
            kind,
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Number of queued operations
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Queue the replacement of `[offset, offset + remove_len)` with `insert`
    pub fn modify(&mut self, offset: usize, remove_len: usize, insert: impl AsRef<[u8]>) -> &mut Self {
        self.pending.push(PendingOp {
            offset,
            remove_len,
            insert: insert.as_ref().to_vec(),
        });
        self
    }

    pub fn insert(&mut self, offset: usize, bytes: impl AsRef<[u8]>) -> &mut Self {
        self.modify(offset, 0, bytes)
    }

    pub fn delete(&mut self, offset: usize, len: usize) -> &mut Self {
        self.modify(offset, len, b"")
    }

    /// Apply the queued operations and record the edit for undo
    pub fn end(mut self) -> Result<EditRecord> {
        let record = self.commit(None)?;
        if record.is_empty() {
            return Ok(record);
        }

        let WriterState { history, options } = &mut *self.writer;
        let outcome = history.record(record.clone(), options);
        let undo_len = history.undo_len();
        self.buffer.logger().scope(|| match outcome {
            RecordOutcome::Pushed => {}
            RecordOutcome::Coalesced => {
                tracing::trace!(undo_len, "coalesced insertion into previous undo entry")
            }
            RecordOutcome::Evicted(evicted) => {
                tracing::debug!(evicted, undo_len, "history limit reached, dropped oldest entries")
            }
        });
        Ok(record)
    }

    /// Apply the queued operations without recording them for undo
    pub fn end_custom(mut self) -> Result<EditRecord> {
        self.commit(None)
    }

    pub(crate) fn history_mut(&mut self) -> &mut UndoHistory {
        &mut self.writer.history
    }

    /// Undo the most recent history entry inside this transaction
    pub(crate) fn replay_undo(mut self) -> Result<Option<EditRecord>> {
        let Some(original) = self.writer.history.pop_undo() else {
            return Ok(None);
        };

        let inverse = original.inverse();
        match self.replay(&inverse) {
            Ok(applied) => {
                self.buffer.logger().scope(|| {
                    tracing::debug!(description = %original.description(), "undo");
                });
                self.writer.history.push_redo(original);
                Ok(Some(applied))
            }
            Err(err) => {
                self.writer.history.push_undo(original);
                Err(err)
            }
        }
    }

    /// Redo the most recently undone entry inside this transaction
    pub(crate) fn replay_redo(mut self) -> Result<Option<EditRecord>> {
        let Some(original) = self.writer.history.pop_redo() else {
            return Ok(None);
        };

        match self.replay(&original) {
            Ok(applied) => {
                self.buffer.logger().scope(|| {
                    tracing::debug!(description = %original.description(), "redo");
                });
                self.writer.history.push_undo(original);
                Ok(Some(applied))
            }
            Err(err) => {
                self.writer.history.push_redo(original);
                Err(err)
            }
        }
    }

    /// Apply `record` to the current content, which must match what it removes
    fn replay(&mut self, record: &EditRecord) -> Result<EditRecord> {
        for m in &record.modifications {
            self.modify(m.offset, m.removed.len(), &m.inserted);
        }
        self.commit(Some(&record.modifications))
            .map_err(|err| match err {
                BufferError::OutOfRange { offset, .. } => BufferError::StaleHistory { offset },
                other => other,
            })
    }

    /// Validate, apply and publish the queued operations.
    ///
    /// With `expected`, the bytes about to be removed must equal the
    /// `removed` payloads of those modifications.
    fn commit(&mut self, expected: Option<&[Modification]>) -> Result<EditRecord> {
        let pending = std::mem::take(&mut self.pending);
        let queued = pending.len();
        let before = self.buffer.snapshot();

        let ops = normalize(pending, before.len()).inspect_err(|err| {
            self.buffer.logger().scope(|| {
                tracing::warn!(code = err.code(), queued, "transaction rejected: {}", err);
            });
        })?;

        let mut modifications = Vec::with_capacity(ops.len());
        for op in ops {
            let removed = before.bytes_range(op.offset..op.offset + op.remove_len)?;
            modifications.push(Modification {
                offset: op.offset,
                removed,
                inserted: op.insert,
            });
        }

        if let Some(expected) = expected {
            check_expected(&modifications, expected)?;
        }

        let record = EditRecord::new(modifications, self.source, self.kind);
        if record.is_empty() {
            return Ok(record);
        }

        let after = Arc::new(apply(&before, &record));
        self.buffer.publish(&EditEvent {
            record: &record,
            before: &before,
            after: &after,
        });

        self.buffer.logger().scope(|| {
            tracing::debug!(
                source = self.source.raw(),
                kind = ?self.kind,
                ops = record.modifications.len(),
                delta = record.delta(),
                revision = after.revision(),
                "transaction committed"
            );
        });
        Ok(record)
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            let discarded = self.pending.len();
            self.buffer.logger().scope(|| {
                tracing::debug!(discarded, "transaction dropped without end()");
            });
        }
    }
}

/// Build the post-edit snapshot; offsets shift by the delta of earlier ops
fn apply(before: &BufferSnapshot, record: &EditRecord) -> BufferSnapshot {
    let mut pieces = before.pieces().clone();
    let mut shift: isize = 0;
    for m in &record.modifications {
        let at = (m.offset as isize + shift) as usize;
        pieces = piece::replace(pieces, at, m.removed.len(), &m.inserted);
        shift += m.delta();
    }
    BufferSnapshot::new(pieces, before.revision() + 1)
}

fn check_expected(actual: &[Modification], expected: &[Modification]) -> Result<()> {
    for (i, want) in expected.iter().enumerate() {
        match actual.get(i) {
            Some(got) if got.offset == want.offset && got.removed == want.removed => {}
            _ => return Err(BufferError::StaleHistory { offset: want.offset }),
        }
    }
    if actual.len() != expected.len() {
        let offset = actual.get(expected.len()).map_or(0, |m| m.offset);
        return Err(BufferError::StaleHistory { offset });
    }
    Ok(())
}
