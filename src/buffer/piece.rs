//! Piece table storage
//!
//! The document is a sequence of pieces, each a window into an immutable,
//! reference-counted chunk of bytes. Pieces live in a [`SumTree`] that keeps
//! subtree byte totals, so locating an offset and replacing a range are
//! O(log n). Chunks are never mutated; small pieces next to an edit are
//! copied into a fresh chunk instead, which keeps typing from fragmenting the
//! table into one piece per keystroke.

use crate::tree::{Item, SumTree, Summary};
use std::sync::Arc;

/// Pieces at most this long are merged with an adjacent insertion
const MERGE_LIMIT: usize = 256;

/// Insertions longer than this are stored as several chunks
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone)]
pub struct Piece {
    chunk: Arc<[u8]>,
    start: usize,
    len: usize,
}

impl Piece {
    pub(crate) fn new(bytes: &[u8]) -> Self {
        Self {
            chunk: Arc::from(bytes),
            start: 0,
            len: bytes.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn bytes(&self) -> &[u8] {
        &self.chunk[self.start..self.start + self.len]
    }

    /// Split into `[0, at)` and `[at, len)`; both halves share the chunk
    fn split(&self, at: usize) -> (Piece, Piece) {
        debug_assert!(at > 0 && at < self.len);
        (
            Piece {
                chunk: Arc::clone(&self.chunk),
                start: self.start,
                len: at,
            },
            Piece {
                chunk: Arc::clone(&self.chunk),
                start: self.start + at,
                len: self.len - at,
            },
        )
    }
}

impl std::fmt::Debug for Piece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Piece")
            .field("start", &self.start)
            .field("len", &self.len)
            .field("text", &String::from_utf8_lossy(self.bytes()))
            .finish()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PieceSummary {
    pub bytes: usize,
}

impl Summary for PieceSummary {
    fn combine(&self, other: &Self) -> Self {
        Self {
            bytes: self.bytes + other.bytes,
        }
    }
}

impl Item for Piece {
    type Summary = PieceSummary;

    fn summary(&self) -> PieceSummary {
        PieceSummary { bytes: self.len }
    }
}

pub(crate) type PieceTree = SumTree<Piece>;

/// Build a tree holding `bytes`, split into chunks of at most `chunk_size`
pub(crate) fn from_bytes(bytes: &[u8], chunk_size: usize) -> PieceTree {
    let pieces = bytes.chunks(chunk_size.max(1)).map(Piece::new).collect();
    SumTree::from_items(pieces)
}

/// Find the piece containing `offset`: its index and the offset inside it.
///
/// Offsets at the very end of the document map to `(len, 0)`.
pub(crate) fn locate(tree: &PieceTree, offset: usize) -> (usize, usize) {
    let (index, before) = tree.seek(offset, |s| s.bytes);
    (index, offset - before.bytes)
}

/// Split the tree so that the left half holds exactly `offset` bytes
fn split_bytes(tree: PieceTree, offset: usize) -> (PieceTree, PieceTree) {
    let (index, inner) = locate(&tree, offset);
    if inner == 0 {
        return tree.split_at(index);
    }

    let piece = match tree.get(index) {
        Some(piece) => piece.clone(),
        None => return tree.split_at(index),
    };
    let (head, tail) = piece.split(inner);
    let (mut left, rest) = tree.split_at(index);
    let (_, mut right) = rest.split_at(1);
    left.push_back(head);
    right.insert(0, tail);
    (left, right)
}

fn pop_back(tree: PieceTree) -> (PieceTree, Option<Piece>) {
    match tree.len() {
        0 => (tree, None),
        n => {
            let last = tree.get(n - 1).cloned();
            (tree.split_at(n - 1).0, last)
        }
    }
}

fn pop_front(tree: PieceTree) -> (Option<Piece>, PieceTree) {
    let first = tree.get(0).cloned();
    match first {
        Some(_) => (first, tree.split_at(1).1),
        None => (None, tree),
    }
}

/// Replace `[offset, offset + remove_len)` with `insert`.
///
/// The caller guarantees the range lies inside the document. Returns a new
/// tree; nodes off the edited path are shared with `tree`.
pub(crate) fn replace(tree: PieceTree, offset: usize, remove_len: usize, insert: &[u8]) -> PieceTree {
    let (left, rest) = split_bytes(tree, offset);
    let (_, right) = split_bytes(rest, remove_len);

    if insert.is_empty() {
        return SumTree::concat(left, right);
    }
    if insert.len() > CHUNK_SIZE {
        return SumTree::concat(SumTree::concat(left, from_bytes(insert, CHUNK_SIZE)), right);
    }

    let mut middle: Vec<u8> = Vec::with_capacity(insert.len());

    let (left, prev) = pop_back(left);
    let left = match prev {
        Some(prev) if prev.len + insert.len() <= MERGE_LIMIT => {
            middle.extend_from_slice(prev.bytes());
            left
        }
        Some(prev) => {
            let mut left = left;
            left.push_back(prev);
            left
        }
        None => left,
    };
    middle.extend_from_slice(insert);

    let (next, right) = pop_front(right);
    let right = match next {
        Some(next) if middle.len() + next.len <= MERGE_LIMIT => {
            middle.extend_from_slice(next.bytes());
            right
        }
        Some(next) => {
            let mut right = right;
            right.insert(0, next);
            right
        }
        None => right,
    };

    SumTree::join(left, Piece::new(&middle), right)
}
