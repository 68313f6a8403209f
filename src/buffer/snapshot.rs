//! Immutable buffer snapshots and byte cursors

use super::piece::{self, Piece, PieceTree};
use crate::error::{BufferError, Result};
use crate::tree;
use std::ops::Range;

/// The content of a buffer at one revision.
///
/// Snapshots are immutable. Holding one (or a cursor created from one) keeps
/// the pieces it references alive, so a reader never observes a later edit.
#[derive(Clone, Default)]
pub struct BufferSnapshot {
    pieces: PieceTree,
    revision: u64,
}

impl BufferSnapshot {
    pub(crate) fn new(pieces: PieceTree, revision: u64) -> Self {
        Self { pieces, revision }
    }

    pub(crate) fn pieces(&self) -> &PieceTree {
        &self.pieces
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.pieces.summary().bytes
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of completed transactions that produced this snapshot
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of pieces in the table
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        let (index, inner) = piece::locate(&self.pieces, offset);
        self.pieces.get(index).map(|p| p.bytes()[inner])
    }

    /// Forward cursor starting at `offset` (which may equal `len()`)
    pub fn cursor(&self, offset: usize) -> Result<ByteCursor> {
        if offset > self.len() {
            return Err(BufferError::out_of_range(offset, 0, self.len()));
        }
        Ok(self.cursor_from(offset))
    }

    /// Cursor at `offset`; past the end it yields nothing
    pub(crate) fn cursor_from(&self, offset: usize) -> ByteCursor {
        ByteCursor::new(&self.pieces, offset)
    }

    /// Borrowed byte slices covering `range`, in order
    pub fn chunks_in_range(&self, range: Range<usize>) -> Result<Chunks<'_>> {
        self.check_range(&range)?;
        let (index, inner) = piece::locate(&self.pieces, range.start);
        Ok(Chunks {
            pieces: self.pieces.iter_from(index),
            skip: inner,
            remaining: range.len(),
        })
    }

    /// Copy of the bytes in `range`
    pub fn bytes_range(&self, range: Range<usize>) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(range.len());
        for chunk in self.chunks_in_range(range)? {
            out.extend_from_slice(chunk);
        }
        Ok(out)
    }

    /// Copy of the whole document
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for piece in self.pieces.iter() {
            out.extend_from_slice(piece.bytes());
        }
        out
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len() {
            return Err(BufferError::OutOfRange {
                offset: range.start,
                end: range.end,
                len: self.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BufferSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferSnapshot")
            .field("revision", &self.revision)
            .field("len", &self.len())
            .field("pieces", &self.pieces.len())
            .finish()
    }
}

/// Borrowed iterator over the byte slices of a range
pub struct Chunks<'a> {
    pieces: tree::Iter<'a, Piece>,
    skip: usize,
    remaining: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<&'a [u8]> {
        if self.remaining == 0 {
            return None;
        }
        let piece = self.pieces.next()?;
        let bytes = &piece.bytes()[self.skip..];
        self.skip = 0;
        let take = bytes.len().min(self.remaining);
        self.remaining -= take;
        Some(&bytes[..take])
    }
}

/// Owning forward cursor over the bytes of a snapshot.
///
/// The cursor keeps the pieces it still has to visit alive on its own, so it
/// may outlive the snapshot it was created from and be moved to another
/// thread.
pub struct ByteCursor {
    pieces: tree::Cursor<Piece>,
    current: Option<Piece>,
    index: usize,
    offset: usize,
}

impl ByteCursor {
    fn new(tree: &PieceTree, offset: usize) -> Self {
        let (piece_index, inner) = piece::locate(tree, offset);
        let mut pieces = tree.cursor(piece_index);
        let current = pieces.next();
        Self {
            pieces,
            current,
            index: inner,
            offset,
        }
    }

    /// Absolute offset of the next byte
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Next byte without advancing
    pub fn peek(&mut self) -> Option<u8> {
        loop {
            let piece = self.current.as_ref()?;
            if self.index < piece.len() {
                return Some(piece.bytes()[self.index]);
            }
            self.current = self.pieces.next();
            self.index = 0;
        }
    }
}

impl Iterator for ByteCursor {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.index += 1;
        self.offset += 1;
        Some(byte)
    }
}
