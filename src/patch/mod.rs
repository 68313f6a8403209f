//! Position patching
//!
//! Carets, selection ends and other byte positions held outside the buffer
//! must follow edits. A [`PositionPatcher`] maps pre-edit offsets of one
//! [`EditRecord`] to post-edit offsets. Callers usually patch every position
//! of a document in ascending order, so the patcher keeps a forward scan
//! position and answers ascending queries in O(1) amortized.

use crate::edit::EditRecord;

/// Which side of an edit a position sticks to when the edit lands on it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Affinity {
    /// Stay before the new content
    #[default]
    Start,
    /// Move after the new content
    End,
}

#[derive(Clone, Copy, Debug)]
struct Span {
    start: usize,
    end: usize,
    inserted: usize,
}

impl Span {
    fn delta(&self) -> isize {
        self.inserted as isize - (self.end - self.start) as isize
    }

    /// Whether a position at `pos` lies entirely after this span
    fn is_before(&self, pos: usize) -> bool {
        self.end < pos || (self.end == pos && self.start < self.end)
    }
}

/// Maps positions across one edit
#[derive(Clone, Debug)]
pub struct PositionPatcher {
    spans: Vec<Span>,
    next: usize,
    shift: isize,
    last_query: usize,
}

impl PositionPatcher {
    pub fn new(record: &EditRecord) -> Self {
        Self {
            spans: record
                .modifications
                .iter()
                .map(|m| Span {
                    start: m.offset,
                    end: m.end(),
                    inserted: m.inserted.len(),
                })
                .collect(),
            next: 0,
            shift: 0,
            last_query: 0,
        }
    }

    /// Map the pre-edit position `pos` into the post-edit content.
    ///
    /// Positions inside a removed range snap to the start or the end of the
    /// content that replaced it, depending on `affinity`. A position exactly
    /// at a pure insertion stays before it with [`Affinity::Start`] and moves
    /// after it with [`Affinity::End`]. A position exactly at the end of a
    /// removed range is past the edit.
    pub fn patch(&mut self, pos: usize, affinity: Affinity) -> usize {
        if pos < self.last_query {
            self.reset();
        }
        self.last_query = pos;

        while let Some(span) = self.spans.get(self.next) {
            if !span.is_before(pos) {
                break;
            }
            self.shift += span.delta();
            self.next += 1;
        }

        match self.spans.get(self.next) {
            Some(span) if pos >= span.start => {
                let new_start = shifted(span.start, self.shift);
                match affinity {
                    Affinity::Start => new_start,
                    Affinity::End => new_start + span.inserted,
                }
            }
            _ => shifted(pos, self.shift),
        }
    }

    /// Patch a range; the start keeps `Start` affinity, the end `End`
    pub fn patch_range(&mut self, range: std::ops::Range<usize>) -> std::ops::Range<usize> {
        let start = self.patch(range.start, Affinity::Start);
        let end = self.patch(range.end, Affinity::End);
        start..end.max(start)
    }

    /// Forget the scan position
    pub fn reset(&mut self) {
        self.next = 0;
        self.shift = 0;
        self.last_query = 0;
    }
}

fn shifted(pos: usize, shift: isize) -> usize {
    (pos as isize + shift) as usize
}
