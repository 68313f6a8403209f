//! Character decode cursor

use super::encoding::{Decoded, Encoding, MAX_SEQUENCE_LEN};
use crate::buffer::ByteCursor;
use std::sync::Arc;

/// Forward cursor decoding characters from a buffer snapshot.
///
/// Like [`ByteCursor`], it owns what it reads, so it stays valid (and keeps
/// showing the same content) however long it lives.
pub struct CharCursor {
    bytes: ByteCursor,
    encoding: Arc<dyn Encoding>,
    window: [u8; MAX_SEQUENCE_LEN],
    filled: usize,
    byte_offset: usize,
    char_offset: usize,
    had_replacement: bool,
}

impl CharCursor {
    /// `bytes` must sit on a character boundary whose character offset is
    /// `char_offset`
    pub(crate) fn new(bytes: ByteCursor, encoding: Arc<dyn Encoding>, char_offset: usize) -> Self {
        let byte_offset = bytes.offset();
        Self {
            bytes,
            encoding,
            window: [0; MAX_SEQUENCE_LEN],
            filled: 0,
            byte_offset,
            char_offset,
            had_replacement: false,
        }
    }

    /// Byte offset of the next character
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Character offset of the next character
    pub fn char_offset(&self) -> usize {
        self.char_offset
    }

    /// Whether any character decoded so far replaced malformed input
    pub fn had_replacement(&self) -> bool {
        self.had_replacement
    }

    fn fill(&mut self) {
        while self.filled < MAX_SEQUENCE_LEN {
            match self.bytes.next() {
                Some(byte) => {
                    self.window[self.filled] = byte;
                    self.filled += 1;
                }
                None => break,
            }
        }
    }

    /// Decode the next character without consuming it
    pub fn peek_decoded(&mut self) -> Option<Decoded> {
        self.fill();
        if self.filled == 0 {
            return None;
        }
        Some(self.encoding.decode(&self.window[..self.filled]))
    }

    pub fn peek(&mut self) -> Option<char> {
        self.peek_decoded().map(|d| d.ch)
    }

    /// Decode and consume the next character
    pub fn next_decoded(&mut self) -> Option<Decoded> {
        let decoded = self.peek_decoded()?;
        let len = decoded.len.min(self.filled);
        self.window.copy_within(len..self.filled, 0);
        self.filled -= len;
        self.byte_offset += len;
        self.char_offset += 1;
        self.had_replacement |= decoded.replaced;
        Some(decoded)
    }

    /// Skip `n` characters; returns how many were actually skipped
    pub fn skip_chars(&mut self, n: usize) -> usize {
        let mut skipped = 0;
        while skipped < n && self.next_decoded().is_some() {
            skipped += 1;
        }
        skipped
    }
}

impl Iterator for CharCursor {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        self.next_decoded().map(|d| d.ch)
    }
}

impl std::fmt::Debug for CharCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CharCursor")
            .field("encoding", &self.encoding.name())
            .field("byte_offset", &self.byte_offset)
            .field("char_offset", &self.char_offset)
            .finish()
    }
}
