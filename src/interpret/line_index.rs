//! Line-break index
//!
//! The decoded text is split into lines, one [`LineSegment`] per line, kept
//! in a [`SumTree`] that sums lines, characters and bytes. Every line but the
//! last ends with a terminator (CR, LF or CRLF, each one line break); the
//! last line has none and may be empty. Prefix sums over the segments give
//! O(log n) conversions between line numbers, character offsets and byte
//! offsets.
//!
//! After an edit the index is patched, not rebuilt: only the lines around
//! each changed byte range are decoded again.

use super::cursor::CharCursor;
use super::encoding::{Encoding, MAX_SEQUENCE_LEN};
use crate::buffer::BufferSnapshot;
use crate::edit::EditRecord;
use crate::tree::{Item, SumTree, Summary};
use std::sync::Arc;

/// One decoded line
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineSegment {
    /// Characters before the terminator
    pub chars: usize,
    /// Characters in the terminator: 0 (last line), 1 (CR or LF) or 2 (CRLF)
    pub terminator: u8,
    /// Encoded length of the whole line, terminator included
    pub bytes: usize,
}

impl LineSegment {
    /// Characters including the terminator
    pub fn total_chars(&self) -> usize {
        self.chars + self.terminator as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineSummary {
    pub lines: usize,
    pub chars: usize,
    pub bytes: usize,
}

impl Summary for LineSummary {
    fn combine(&self, other: &Self) -> Self {
        Self {
            lines: self.lines + other.lines,
            chars: self.chars + other.chars,
            bytes: self.bytes + other.bytes,
        }
    }
}

impl Item for LineSegment {
    type Summary = LineSummary;

    fn summary(&self) -> LineSummary {
        LineSummary {
            lines: 1,
            chars: self.total_chars(),
            bytes: self.bytes,
        }
    }
}

/// Where a line starts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineStart {
    pub line: usize,
    pub char_offset: usize,
    pub byte_offset: usize,
    pub segment: LineSegment,
}

/// How much work an incremental update did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Lines removed from the index
    pub removed_lines: usize,
    /// Lines decoded again
    pub decoded_lines: usize,
    /// Bytes decoded again
    pub decoded_bytes: usize,
}

/// Line-break index of one decoded snapshot
#[derive(Clone)]
pub struct LineIndex {
    tree: SumTree<LineSegment>,
}

impl LineIndex {
    /// Decode the whole snapshot
    pub fn build(snapshot: &BufferSnapshot, encoding: &Arc<dyn Encoding>) -> Self {
        let mut chars = CharCursor::new(snapshot.cursor_from(0), Arc::clone(encoding), 0);
        let mut segments = Vec::new();
        loop {
            let segment = decode_line(&mut chars);
            segments.push(segment);
            if segment.terminator == 0 {
                break;
            }
        }
        Self {
            tree: SumTree::from_items(segments),
        }
    }

    /// Number of lines; at least 1
    pub fn line_count(&self) -> usize {
        self.tree.len()
    }

    /// Decoded length in characters
    pub fn total_chars(&self) -> usize {
        self.tree.summary().chars
    }

    /// Encoded length in bytes
    pub fn total_bytes(&self) -> usize {
        self.tree.summary().bytes
    }

    pub fn segment(&self, line: usize) -> Option<LineSegment> {
        self.tree.get(line).copied()
    }

    pub fn segments(&self) -> impl Iterator<Item = &LineSegment> + '_ {
        self.tree.iter()
    }

    /// Where `line` starts
    pub fn line_start(&self, line: usize) -> Option<LineStart> {
        let segment = self.segment(line)?;
        let before = self.tree.prefix(line);
        Some(LineStart {
            line,
            char_offset: before.chars,
            byte_offset: before.bytes,
            segment,
        })
    }

    pub fn line_to_char_offset(&self, line: usize) -> Option<usize> {
        self.line_start(line).map(|start| start.char_offset)
    }

    pub fn line_to_byte_offset(&self, line: usize) -> Option<usize> {
        self.line_start(line).map(|start| start.byte_offset)
    }

    /// Line holding the character at `char_offset`.
    ///
    /// The offset just past the last character belongs to the last line.
    pub fn char_offset_to_line(&self, char_offset: usize) -> Option<usize> {
        self.locate(char_offset, self.total_chars(), |s| s.chars)
            .map(|start| start.line)
    }

    /// Line holding the byte at `byte_offset`
    pub fn byte_offset_to_line(&self, byte_offset: usize) -> Option<usize> {
        self.locate(byte_offset, self.total_bytes(), |s| s.bytes)
            .map(|start| start.line)
    }

    pub(crate) fn line_for_char(&self, char_offset: usize) -> Option<LineStart> {
        self.locate(char_offset, self.total_chars(), |s| s.chars)
    }

    pub(crate) fn line_for_byte(&self, byte_offset: usize) -> Option<LineStart> {
        self.locate(byte_offset, self.total_bytes(), |s| s.bytes)
    }

    fn locate(
        &self,
        offset: usize,
        total: usize,
        dim: impl Fn(&LineSummary) -> usize,
    ) -> Option<LineStart> {
        if offset > total {
            return None;
        }
        let (line, before) = self.tree.seek(offset, dim);
        if line < self.tree.len() {
            let segment = self.segment(line)?;
            return Some(LineStart {
                line,
                char_offset: before.chars,
                byte_offset: before.bytes,
                segment,
            });
        }
        // At the very end: the last line, which has no terminator
        self.line_start(self.tree.len().checked_sub(1)?)
    }

    /// Patch the index of the content `record` was applied to so that it
    /// describes `after`.
    ///
    /// Modifications are handled in order. For each one, decoding restarts
    /// at the line holding the byte [`MAX_SEQUENCE_LEN`] bytes before the
    /// change. Decoding a character reads at most that many bytes, so every
    /// line ending earlier was decided without looking at changed bytes,
    /// including a CR that now pairs with an LF completed inside a code
    /// unit. From there it continues line by line through the new content, pulling
    /// in any later modification it runs into. It stops at the first line
    /// boundary past the changed bytes that is also a line boundary of the
    /// old content, shifted by the accumulated length change; from there on
    /// both decodes see the same bytes from the same boundary and must agree.
    pub fn update(
        &self,
        after: &BufferSnapshot,
        record: &EditRecord,
        encoding: &Arc<dyn Encoding>,
    ) -> (LineIndex, UpdateStats) {
        let changes = changed_spans(record);
        let new_len = after.len();
        let mut tree = self.tree.clone();
        let mut stats = UpdateStats::default();

        let mut i = 0;
        while i < changes.len() {
            let start = changes[i].start;
            let (first, before) = match start {
                0 => (0, LineSummary::default()),
                _ => tree.seek(start.saturating_sub(MAX_SEQUENCE_LEN), |s| s.bytes),
            };

            let mut chars = CharCursor::new(
                after.cursor_from(before.bytes),
                Arc::clone(encoding),
                before.chars,
            );
            let mut segments = Vec::new();
            let mut last = i;
            let mut delta = changes[i].delta;

            let keep_from = loop {
                let segment = decode_line(&mut chars);
                segments.push(segment);
                if segment.terminator == 0 {
                    last = changes.len() - 1;
                    break None;
                }

                let boundary = chars.byte_offset();
                while last + 1 < changes.len() && changes[last + 1].start <= boundary {
                    last += 1;
                    delta += changes[last].delta;
                }
                if boundary < changes[last].end || boundary == new_len {
                    continue;
                }

                let old_boundary = (boundary as isize - delta) as usize;
                let (line, prefix) = tree.seek(old_boundary, |s| s.bytes);
                if prefix.bytes == old_boundary && line < tree.len() {
                    break Some(line);
                }
            };

            let end = keep_from.unwrap_or(tree.len());
            stats.removed_lines += end - first;
            stats.decoded_lines += segments.len();
            stats.decoded_bytes += chars.byte_offset() - before.bytes;
            tree.splice(first..end, segments);
            i = last + 1;
        }

        (Self { tree }, stats)
    }
}

impl PartialEq for LineIndex {
    fn eq(&self, other: &Self) -> bool {
        self.tree.summary() == other.tree.summary() && self.segments().eq(other.segments())
    }
}

impl Eq for LineIndex {}

impl std::fmt::Debug for LineIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.segments()).finish()
    }
}

/// A modification in post-edit coordinates
#[derive(Clone, Copy, Debug)]
struct ChangedSpan {
    start: usize,
    end: usize,
    delta: isize,
}

fn changed_spans(record: &EditRecord) -> Vec<ChangedSpan> {
    let mut shift: isize = 0;
    record
        .modifications
        .iter()
        .map(|m| {
            let start = (m.offset as isize + shift) as usize;
            shift += m.delta();
            ChangedSpan {
                start,
                end: start + m.inserted.len(),
                delta: m.delta(),
            }
        })
        .collect()
}

/// Decode one line starting at the cursor
fn decode_line(chars: &mut CharCursor) -> LineSegment {
    let start = chars.byte_offset();
    let mut count = 0;
    let terminator = loop {
        match chars.next() {
            None => break 0,
            Some('\n') => break 1,
            Some('\r') => {
                if chars.peek() == Some('\n') {
                    chars.next();
                    break 2;
                }
                break 1;
            }
            Some(_) => count += 1,
        }
    };
    LineSegment {
        chars: count,
        terminator,
        bytes: chars.byte_offset() - start,
    }
}
