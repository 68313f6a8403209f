//! Character/byte offset conversion

use super::cursor::CharCursor;
use super::InterpretationSnapshot;
use std::sync::Arc;

/// Converts between character and byte offsets of one interpretation snapshot.
///
/// Each conversion finds the line in O(log n) and decodes inside it. The
/// converter remembers where the previous query ended, so ascending queries
/// that stay on the same line continue decoding from there instead of from
/// the line start.
pub struct CharacterPositionConverter {
    view: Arc<InterpretationSnapshot>,
    cache: Option<Cached>,
}

struct Cached {
    cursor: CharCursor,
    line_end_char: usize,
}

impl CharacterPositionConverter {
    pub fn new(view: Arc<InterpretationSnapshot>) -> Self {
        Self { view, cache: None }
    }

    pub fn snapshot(&self) -> &Arc<InterpretationSnapshot> {
        &self.view
    }

    /// Byte offset of the character at `char_offset`.
    ///
    /// Returns `None` past the end of the text; the offset just past the last
    /// character maps to the document length.
    pub fn char_to_byte(&mut self, char_offset: usize) -> Option<usize> {
        let reusable = self.cache.as_ref().is_some_and(|cached| {
            cached.cursor.char_offset() <= char_offset && char_offset < cached.line_end_char
        });

        if !reusable {
            let start = self.view.lines().line_for_char(char_offset)?;
            self.cache = Some(Cached {
                cursor: self.view.cursor_at_line(&start),
                line_end_char: start.char_offset + start.segment.total_chars(),
            });
        }

        let cached = self.cache.as_mut()?;
        let gap = char_offset - cached.cursor.char_offset();
        cached.cursor.skip_chars(gap);
        Some(cached.cursor.byte_offset())
    }

    /// Character offset of the character holding the byte at `byte_offset`.
    ///
    /// An offset inside a multi-byte character maps to that character.
    pub fn byte_to_char(&mut self, byte_offset: usize) -> Option<usize> {
        let start = self.view.lines().line_for_byte(byte_offset)?;
        let mut cursor = self.view.cursor_at_line(&start);
        while let Some(decoded) = cursor.peek_decoded() {
            if cursor.byte_offset() + decoded.len > byte_offset {
                break;
            }
            cursor.next_decoded();
        }
        Some(cursor.char_offset())
    }
}
