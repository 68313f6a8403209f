//! Interpretations: decoded views of a buffer
//!
//! An [`Interpretation`] pairs a [`Buffer`] with an [`Encoding`] and keeps a
//! [`LineIndex`] of the decoded text up to date. It subscribes to the
//! buffer's edit notifications and patches the index after every completed
//! transaction, on the thread that ended it.
//!
//! Readers work on an [`InterpretationSnapshot`]: a buffer snapshot together
//! with the line index that describes exactly that snapshot. Several
//! interpretations (e.g. different encodings) may coexist on one buffer.

pub mod converter;
pub mod cursor;
pub mod encoding;
pub mod line_index;

pub use converter::CharacterPositionConverter;
pub use cursor::CharCursor;
pub use encoding::{Decoded, Encoding, Latin1, Utf16Be, Utf16Le, Utf8};
pub use line_index::{LineIndex, LineSegment, LineStart, UpdateStats};

use crate::buffer::{Buffer, BufferSnapshot, EditEvent, EditListener, Subscription};
use crate::edit::SourceId;
use crate::error::{BufferError, Result};
use crate::logging::Logger;
use crate::settings::InterpretationOptions;
use std::sync::{Arc, PoisonError, RwLock, Weak};

// =============================================================================
// Snapshot
// =============================================================================

/// A buffer snapshot and the line index describing it
pub struct InterpretationSnapshot {
    buffer: Arc<BufferSnapshot>,
    lines: LineIndex,
    encoding: Arc<dyn Encoding>,
}

impl InterpretationSnapshot {
    fn build(buffer: Arc<BufferSnapshot>, encoding: Arc<dyn Encoding>) -> Self {
        let lines = LineIndex::build(&buffer, &encoding);
        Self {
            buffer,
            lines,
            encoding,
        }
    }

    pub fn buffer(&self) -> &Arc<BufferSnapshot> {
        &self.buffer
    }

    pub fn lines(&self) -> &LineIndex {
        &self.lines
    }

    pub fn encoding(&self) -> &Arc<dyn Encoding> {
        &self.encoding
    }

    pub fn revision(&self) -> u64 {
        self.buffer.revision()
    }

    /// Decoded length in characters
    pub fn char_len(&self) -> usize {
        self.lines.total_chars()
    }

    /// Decode cursor positioned at `char_offset`
    pub fn character_at(&self, char_offset: usize) -> Result<CharCursor> {
        let start = self
            .lines
            .line_for_char(char_offset)
            .ok_or_else(|| BufferError::out_of_range(char_offset, 0, self.char_len()))?;
        let mut cursor = self.cursor_at_line(&start);
        cursor.skip_chars(char_offset - start.char_offset);
        Ok(cursor)
    }

    /// Text of `line` without its terminator
    pub fn line_text(&self, line: usize) -> Option<String> {
        let start = self.lines.line_start(line)?;
        Some(
            self.cursor_at_line(&start)
                .take(start.segment.chars)
                .collect(),
        )
    }

    /// Decoded text of the whole snapshot
    pub fn text(&self) -> String {
        CharCursor::new(self.buffer.cursor_from(0), Arc::clone(&self.encoding), 0).collect()
    }

    pub fn converter(self: &Arc<Self>) -> CharacterPositionConverter {
        CharacterPositionConverter::new(Arc::clone(self))
    }

    /// Whether the line index matches a full decode of the snapshot
    pub fn check_integrity(&self) -> bool {
        LineIndex::build(&self.buffer, &self.encoding) == self.lines
    }

    pub(crate) fn cursor_at_line(&self, start: &LineStart) -> CharCursor {
        CharCursor::new(
            self.buffer.cursor_from(start.byte_offset),
            Arc::clone(&self.encoding),
            start.char_offset,
        )
    }
}

impl std::fmt::Debug for InterpretationSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpretationSnapshot")
            .field("encoding", &self.encoding.name())
            .field("revision", &self.buffer.revision())
            .field("lines", &self.lines.line_count())
            .field("chars", &self.lines.total_chars())
            .finish()
    }
}

// =============================================================================
// Interpretation
// =============================================================================

struct Shared {
    view: RwLock<Arc<InterpretationSnapshot>>,
    encoding: Arc<dyn Encoding>,
    options: InterpretationOptions,
    logger: Logger,
}

impl Shared {
    fn current(&self) -> Arc<InterpretationSnapshot> {
        Arc::clone(&self.view.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn apply(&self, event: &EditEvent<'_>) {
        let mut view = self.view.write().unwrap_or_else(PoisonError::into_inner);

        let next = if view.revision() == event.before.revision() {
            let (lines, stats) = view.lines.update(event.after, event.record, &self.encoding);
            self.logger.scope(|| {
                tracing::trace!(
                    encoding = self.encoding.name(),
                    revision = event.after.revision(),
                    removed_lines = stats.removed_lines,
                    decoded_lines = stats.decoded_lines,
                    decoded_bytes = stats.decoded_bytes,
                    "line index updated"
                );
            });
            InterpretationSnapshot {
                buffer: Arc::clone(event.after),
                lines,
                encoding: Arc::clone(&self.encoding),
            }
        } else {
            self.logger.scope(|| {
                tracing::warn!(
                    have = view.revision(),
                    before = event.before.revision(),
                    "line index out of step with buffer, rebuilding"
                );
            });
            InterpretationSnapshot::build(Arc::clone(event.after), Arc::clone(&self.encoding))
        };

        if self.options.verify_integrity && !next.check_integrity() {
            self.logger.scope(|| {
                tracing::error!(
                    encoding = self.encoding.name(),
                    revision = next.revision(),
                    "line index diverged from a full decode"
                );
            });
            panic!(
                "line index diverged from a full decode at revision {} ({})",
                next.revision(),
                self.encoding.name()
            );
        }

        *view = Arc::new(next);
    }
}

struct IndexUpdater {
    shared: Weak<Shared>,
}

impl EditListener for IndexUpdater {
    fn end_edit(&self, event: &EditEvent<'_>) {
        if let Some(shared) = self.shared.upgrade() {
            shared.apply(event);
        }
    }
}

/// A decoded view of a buffer under one encoding
pub struct Interpretation {
    buffer: Buffer,
    shared: Arc<Shared>,
    _subscription: Subscription,
}

impl Interpretation {
    /// Decode `buffer` with `encoding` and follow its edits
    pub fn open(buffer: &Buffer, encoding: impl Encoding + 'static) -> Self {
        Self::open_with(buffer, Arc::new(encoding), InterpretationOptions::default())
    }

    /// Decode `buffer` and follow its edits.
    ///
    /// Waits for any open transaction on the buffer, so the initial decode
    /// and the subscription see the same content.
    pub fn open_with(
        buffer: &Buffer,
        encoding: Arc<dyn Encoding>,
        options: InterpretationOptions,
    ) -> Self {
        let writer = buffer.begin(SourceId::NONE);

        let view = InterpretationSnapshot::build(buffer.snapshot(), Arc::clone(&encoding));
        let logger = buffer.logger().clone();
        logger.scope(|| {
            tracing::debug!(
                encoding = encoding.name(),
                lines = view.lines.line_count(),
                bytes = view.buffer.len(),
                "interpretation opened"
            );
        });

        let shared = Arc::new(Shared {
            view: RwLock::new(Arc::new(view)),
            encoding,
            options,
            logger,
        });
        let subscription = buffer.subscribe(IndexUpdater {
            shared: Arc::downgrade(&shared),
        });
        drop(writer);

        Self {
            buffer: buffer.clone(),
            shared,
            _subscription: subscription,
        }
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn encoding(&self) -> &Arc<dyn Encoding> {
        &self.shared.encoding
    }

    /// Current buffer snapshot and its line index
    pub fn snapshot(&self) -> Arc<InterpretationSnapshot> {
        self.shared.current()
    }

    /// Current line index
    pub fn line_index(&self) -> LineIndex {
        self.snapshot().lines.clone()
    }

    /// Same as [`line_index`](Self::line_index)
    pub fn get_linebreaks(&self) -> LineIndex {
        self.line_index()
    }

    /// Decode cursor at `char_offset` in the current content
    pub fn character_at(&self, char_offset: usize) -> Result<CharCursor> {
        self.snapshot().character_at(char_offset)
    }

    /// Offset converter over the current content
    pub fn converter(&self) -> CharacterPositionConverter {
        self.snapshot().converter()
    }

    /// Fully decode the current content and compare with the line index
    pub fn check_integrity(&self) -> bool {
        self.snapshot().check_integrity()
    }
}

impl std::fmt::Debug for Interpretation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpretation")
            .field("view", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
