//! Tests for edit records and normalization

use super::*;
use pretty_assertions::assert_eq;

fn op(offset: usize, remove_len: usize, insert: &str) -> PendingOp {
    PendingOp {
        offset,
        remove_len,
        insert: insert.as_bytes().to_vec(),
    }
}

fn modification(offset: usize, removed: &str, inserted: &str) -> Modification {
    Modification {
        offset,
        removed: removed.as_bytes().to_vec(),
        inserted: inserted.as_bytes().to_vec(),
    }
}

// =============================================================================
// SourceId
// =============================================================================

#[test]
fn test_source_ids_are_unique() {
    let a = SourceId::unique();
    let b = SourceId::unique();
    assert_ne!(a, b);
    assert!(!a.is_none());
    assert!(SourceId::NONE.is_none());
    assert_eq!(SourceId::default(), SourceId::NONE);
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_normalize_sorts_by_offset() {
    let ops = normalize(vec![op(8, 1, "z"), op(0, 1, "a"), op(4, 0, "m")], 10).unwrap();
    assert_eq!(ops, vec![op(0, 1, "a"), op(4, 0, "m"), op(8, 1, "z")]);
}

#[test]
fn test_normalize_rejects_out_of_range() {
    let err = normalize(vec![op(3, 5, "")], 6).unwrap_err();
    assert_eq!(
        err,
        BufferError::OutOfRange {
            offset: 3,
            end: 8,
            len: 6
        }
    );

    let err = normalize(vec![op(7, 0, "x")], 6).unwrap_err();
    assert_eq!(err.code(), crate::constants::errors::OUT_OF_RANGE);
}

#[test]
fn test_normalize_rejects_overflowing_range() {
    let err = normalize(vec![op(usize::MAX, 2, "")], 6).unwrap_err();
    assert!(matches!(err, BufferError::OutOfRange { .. }));
}

#[test]
fn test_normalize_rejects_overlap() {
    let err = normalize(vec![op(2, 3, "x"), op(4, 2, "y")], 10).unwrap_err();
    assert_eq!(
        err,
        BufferError::OverlappingEdits {
            first: 2..5,
            second: 4..6
        }
    );
}

#[test]
fn test_normalize_rejects_insert_inside_removal() {
    let err = normalize(vec![op(2, 3, ""), op(3, 0, "x")], 10).unwrap_err();
    assert!(matches!(err, BufferError::OverlappingEdits { .. }));
}

#[test]
fn test_normalize_merges_touching_ranges() {
    let ops = normalize(vec![op(3, 2, "b"), op(0, 3, "a")], 10).unwrap();
    assert_eq!(ops, vec![op(0, 5, "ab")]);
}

#[test]
fn test_normalize_insert_before_removal_at_same_offset() {
    // The insertion sorts first, then merges with the removal it touches
    let ops = normalize(vec![op(2, 2, "R"), op(2, 0, "I")], 10).unwrap();
    assert_eq!(ops, vec![op(2, 2, "IR")]);
}

#[test]
fn test_normalize_keeps_queue_order_of_insertions() {
    let ops = normalize(vec![op(1, 0, "x"), op(1, 0, "y")], 3).unwrap();
    assert_eq!(ops, vec![op(1, 0, "xy")]);
}

#[test]
fn test_normalize_drops_noops() {
    let ops = normalize(vec![op(1, 0, ""), op(3, 1, "")], 5).unwrap();
    assert_eq!(ops, vec![op(3, 1, "")]);
    assert!(normalize(vec![op(0, 0, "")], 0).unwrap().is_empty());
}

// =============================================================================
// EditRecord
// =============================================================================

#[test]
fn test_inverse_recomputes_offsets() {
    // "abcdef" -> "aXYcdZ": [1,2) -> "XY", [4,6) -> "Z"
    let record = EditRecord::new(
        vec![modification(1, "b", "XY"), modification(4, "ef", "Z")],
        SourceId::NONE,
        EditKind::Normal,
    );
    let inverse = record.inverse();
    assert_eq!(
        inverse.modifications,
        vec![modification(1, "XY", "b"), modification(5, "Z", "ef")]
    );

    let mut bytes = b"abcdef".to_vec();
    record.apply_to(&mut bytes).unwrap();
    assert_eq!(bytes, b"aXYcdZ");
    inverse.apply_to(&mut bytes).unwrap();
    assert_eq!(bytes, b"abcdef");
}

#[test]
fn test_inverse_of_inverse() {
    let record = EditRecord::new(
        vec![modification(0, "", "hello "), modification(3, "xyz", "")],
        SourceId::unique(),
        EditKind::Normal,
    );
    assert_eq!(record.inverse().inverse(), record);
}

#[test]
fn test_apply_to_rejects_short_input() {
    let record = EditRecord::new(
        vec![modification(2, "abc", "")],
        SourceId::NONE,
        EditKind::Normal,
    );
    let mut bytes = b"ab".to_vec();
    assert!(record.apply_to(&mut bytes).is_err());
}

#[test]
fn test_delta() {
    let record = EditRecord::new(
        vec![modification(0, "ab", "abcd"), modification(5, "xyz", "")],
        SourceId::NONE,
        EditKind::Normal,
    );
    assert_eq!(record.delta(), -1);
}

#[test]
fn test_description() {
    let insert = EditRecord::new(
        vec![modification(0, "", "hi\n")],
        SourceId::NONE,
        EditKind::Normal,
    );
    assert_eq!(insert.description(), "Insert 'hi\\n'");

    let delete = EditRecord::new(
        vec![modification(0, &"x".repeat(42), "")],
        SourceId::NONE,
        EditKind::Normal,
    );
    assert_eq!(delete.description(), "Delete 42 bytes");

    let many = EditRecord::new(
        vec![modification(0, "a", "b"), modification(4, "c", "d")],
        SourceId::NONE,
        EditKind::Normal,
    );
    assert_eq!(many.description(), "Change 2 ranges");
}
