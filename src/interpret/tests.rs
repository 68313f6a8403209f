//! Tests for encodings, line index and interpretations

use super::*;
use crate::edit::EditRecord;
use crate::settings::BufferOptions;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn checked() -> InterpretationOptions {
    InterpretationOptions {
        verify_integrity: true,
    }
}

fn unchecked() -> InterpretationOptions {
    InterpretationOptions {
        verify_integrity: false,
    }
}

fn open(bytes: &[u8], encoding: impl Encoding + 'static) -> (Buffer, Interpretation) {
    let buffer = Buffer::from_bytes(bytes);
    let interp = Interpretation::open_with(&buffer, Arc::new(encoding), checked());
    (buffer, interp)
}

fn edit(buffer: &Buffer, ops: &[(usize, usize, &[u8])]) -> EditRecord {
    let mut tx = buffer.begin(SourceId::NONE);
    for (offset, remove, insert) in ops {
        tx.modify(*offset, *remove, insert);
    }
    tx.end().unwrap()
}

fn segments(index: &LineIndex) -> Vec<(usize, u8, usize)> {
    index
        .segments()
        .map(|s| (s.chars, s.terminator, s.bytes))
        .collect()
}

// =============================================================================
// Encoding Tests
// =============================================================================

#[test]
fn test_utf8_decode() {
    assert_eq!(Utf8.decode(b"a"), Decoded { ch: 'a', len: 1, replaced: false });
    assert_eq!(Utf8.decode("é!".as_bytes()).len, 2);
    assert_eq!(Utf8.decode("€".as_bytes()).ch, '€');
    assert_eq!(Utf8.decode("😀".as_bytes()).len, 4);
}

#[test]
fn test_utf8_invalid_input() {
    // Stray continuation byte
    let d = Utf8.decode(&[0x82, b'a']);
    assert!(d.replaced);
    assert_eq!(d.len, 1);
    // Truncated sequence at the end of input
    assert_eq!(Utf8.decode(&[0xE2, 0x82]).len, 1);
    // Overlong and surrogate encodings
    assert!(Utf8.decode(&[0xC0, 0x80]).replaced);
    assert!(Utf8.decode(&[0xED, 0xA0, 0x80]).replaced);
    assert!(Utf8.decode(&[0xFF]).replaced);
}

#[test]
fn test_utf16_decode() {
    let le = Utf16Le.encode_str("a😀");
    assert_eq!(le, vec![0x61, 0x00, 0x3D, 0xD8, 0x00, 0xDE]);
    assert_eq!(Utf16Le.decode(&le[..2]).ch, 'a');
    assert_eq!(Utf16Le.decode(&le[2..]), Decoded { ch: '😀', len: 4, replaced: false });

    let be = Utf16Be.encode_str("\r");
    assert_eq!(be, vec![0x00, 0x0D]);
    assert_eq!(Utf16Be.decode(&be).ch, '\r');
}

#[test]
fn test_utf16_invalid_input() {
    // Odd trailing byte
    assert_eq!(Utf16Le.decode(&[0x61]).len, 1);
    // Lone low surrogate
    assert!(Utf16Le.decode(&[0x00, 0xDC]).replaced);
    // High surrogate not followed by a low one
    let d = Utf16Le.decode(&[0x3D, 0xD8, 0x61, 0x00]);
    assert!(d.replaced);
    assert_eq!(d.len, 2);
}

#[test]
fn test_latin1() {
    assert_eq!(Latin1.decode(&[0xE9]).ch, 'é');
    assert_eq!(Latin1.encode_str("é"), vec![0xE9]);
    assert_eq!(Latin1.encode_str("€"), b"?");
}

#[test]
fn test_encoding_by_name() {
    assert_eq!(encoding::by_name("UTF-8").unwrap().name(), "utf-8");
    assert_eq!(encoding::by_name("utf16le").unwrap().name(), "utf-16le");
    assert!(encoding::by_name("ebcdic").is_none());
}

// =============================================================================
// Line Index Tests
// =============================================================================

#[test]
fn test_build_line_index() {
    let (_buffer, interp) = open(b"ab\r\ncd\ne", Utf8);
    let lines = interp.line_index();
    assert_eq!(segments(&lines), vec![(2, 2, 4), (2, 1, 3), (1, 0, 1)]);
    assert_eq!(lines.line_count(), 3);
    assert_eq!(lines.total_chars(), 8);
    assert_eq!(lines.line_to_char_offset(1), Some(4));
    assert_eq!(lines.line_to_char_offset(2), Some(7));
    assert_eq!(lines.line_to_char_offset(3), None);
    assert_eq!(lines.line_to_byte_offset(2), Some(7));
    assert_eq!(lines.char_offset_to_line(3), Some(0));
    assert_eq!(lines.char_offset_to_line(4), Some(1));
    assert_eq!(lines.char_offset_to_line(8), Some(2));
    assert_eq!(lines.char_offset_to_line(9), None);
    assert_eq!(lines.byte_offset_to_line(6), Some(1));
}

#[test]
fn test_empty_document_has_one_line() {
    let (_buffer, interp) = open(b"", Utf8);
    let lines = interp.get_linebreaks();
    assert_eq!(segments(&lines), vec![(0, 0, 0)]);
    assert_eq!(lines.char_offset_to_line(0), Some(0));
}

#[test]
fn test_trailing_newline_ends_with_empty_line() {
    let (_buffer, interp) = open(b"a\n", Utf8);
    assert_eq!(segments(&interp.line_index()), vec![(1, 1, 2), (0, 0, 0)]);
    assert_eq!(interp.line_index().char_offset_to_line(2), Some(1));
}

#[test]
fn test_lone_cr_and_lf_count_once_each() {
    let (_buffer, interp) = open(b"a\rb\nc\r\n\n\r", Utf8);
    assert_eq!(
        segments(&interp.line_index()),
        vec![(1, 1, 2), (1, 1, 2), (1, 2, 3), (0, 1, 1), (0, 1, 1), (0, 0, 0)]
    );
}

#[test]
fn test_update_decodes_only_the_touched_lines() {
    let text: String = (0..1000).map(|i| format!("line {}\n", i)).collect();
    let buffer = Buffer::from_bytes(text.as_bytes());
    let encoding: Arc<dyn Encoding> = Arc::new(Utf8);
    let before = LineIndex::build(&buffer.snapshot(), &encoding);
    let line = before.line_to_byte_offset(500).unwrap();

    // Far enough into the line that the previous line cannot be affected
    let record = edit(&buffer, &[(line + 5, 0, b"x")]);
    let (after, stats) = before.update(&buffer.snapshot(), &record, &encoding);
    assert_eq!(stats.decoded_lines, 1);
    assert_eq!(stats.removed_lines, 1);
    assert_eq!(after, LineIndex::build(&buffer.snapshot(), &encoding));

    let record = edit(&buffer, &[(line, 0, b"y")]);
    let (again, stats) = after.update(&buffer.snapshot(), &record, &encoding);
    assert_eq!(stats.decoded_lines, 2);
    assert_eq!(again, LineIndex::build(&buffer.snapshot(), &encoding));
}

// =============================================================================
// Interpretation Tests
// =============================================================================

#[test]
fn test_basic_insert() {
    let buffer = Buffer::new();
    let interp = Interpretation::open_with(&buffer, Arc::new(Utf8), checked());
    edit(&buffer, &[(0, 0, b"hello")]);

    assert_eq!(buffer.length(), 5);
    let text: String = interp.character_at(0).unwrap().collect();
    assert_eq!(text, "hello");
    assert!(interp.check_integrity());
}

#[test]
fn test_crlf_split() {
    let (buffer, interp) = open(b"a\r\nb", Utf8);
    assert_eq!(interp.line_index().line_count(), 2);

    edit(&buffer, &[(2, 0, b"X")]);
    let lines = interp.line_index();
    let fresh = LineIndex::build(&buffer.snapshot(), interp.encoding());
    assert_eq!(lines, fresh);
    assert_eq!(segments(&lines), vec![(1, 1, 2), (1, 1, 2), (1, 0, 1)]);
    assert_eq!(interp.snapshot().text(), "a\rX\nb");
}

#[test]
fn test_crlf_merge() {
    let (buffer, interp) = open(b"a\rX\nb", Utf8);
    assert_eq!(interp.line_index().line_count(), 3);

    edit(&buffer, &[(2, 1, b"")]);
    assert_eq!(segments(&interp.line_index()), vec![(1, 2, 3), (1, 0, 1)]);

    // Completing a CR at the very end
    edit(&buffer, &[(0, 4, b"z\r")]);
    assert_eq!(segments(&interp.line_index()), vec![(1, 1, 2), (0, 0, 0)]);
    edit(&buffer, &[(2, 0, b"\n")]);
    assert_eq!(segments(&interp.line_index()), vec![(1, 2, 3), (0, 0, 0)]);
    assert!(interp.check_integrity());
}

#[test]
fn test_multi_range_transaction() {
    let (buffer, interp) = open(b"one\ntwo\r\nthree\rfour", Utf8);
    edit(
        &buffer,
        &[(18, 0, b"\n"), (0, 2, b""), (7, 1, b"\r\n"), (14, 1, b"")],
    );
    assert!(interp.check_integrity());
    assert_eq!(
        interp.line_index(),
        LineIndex::build(&buffer.snapshot(), interp.encoding())
    );
}

#[test]
fn test_multibyte_edits() {
    let (buffer, interp) = open("héllo\nwörld".as_bytes(), Utf8);
    // Split the 'é' in half, then put it back
    edit(&buffer, &[(2, 1, b"")]);
    assert!(interp.snapshot().text().contains('\u{FFFD}'));
    edit(&buffer, &[(2, 0, &[0xA9])]);
    assert_eq!(interp.snapshot().text(), "héllo\nwörld");
    assert!(interp.check_integrity());
}

#[test]
fn test_replacement_flag() {
    let (_buffer, interp) = open(b"a\xffb", Utf8);
    let mut cursor = interp.character_at(0).unwrap();
    assert_eq!(cursor.next(), Some('a'));
    assert!(!cursor.had_replacement());
    assert_eq!(cursor.next(), Some('\u{FFFD}'));
    assert!(cursor.had_replacement());
    assert_eq!(cursor.next(), Some('b'));
    assert_eq!(cursor.next(), None);
    assert_eq!(interp.snapshot().char_len(), 3);
}

#[test]
fn test_character_at() {
    let (_buffer, interp) = open("ab\ncdé\nf".as_bytes(), Utf8);
    let mut cursor = interp.character_at(5).unwrap();
    assert_eq!(cursor.char_offset(), 5);
    assert_eq!(cursor.byte_offset(), 5);
    assert_eq!(cursor.next(), Some('é'));
    assert_eq!(cursor.byte_offset(), 7);
    assert_eq!(cursor.collect::<String>(), "\nf");

    assert_eq!(interp.character_at(8).unwrap().next(), None);
    assert!(interp.character_at(9).is_err());
}

#[test]
fn test_line_text() {
    let (_buffer, interp) = open(b"first\r\nsecond\nthird", Utf8);
    let view = interp.snapshot();
    assert_eq!(view.line_text(0).as_deref(), Some("first"));
    assert_eq!(view.line_text(1).as_deref(), Some("second"));
    assert_eq!(view.line_text(2).as_deref(), Some("third"));
    assert_eq!(view.line_text(3), None);
}

#[test]
fn test_converter() {
    let (_buffer, interp) = open("héllo\nwörld".as_bytes(), Utf8);
    let mut conv = interp.converter();
    assert_eq!(conv.char_to_byte(0), Some(0));
    assert_eq!(conv.char_to_byte(1), Some(1));
    assert_eq!(conv.char_to_byte(2), Some(3));
    assert_eq!(conv.char_to_byte(6), Some(7));
    assert_eq!(conv.char_to_byte(8), Some(10));
    assert_eq!(conv.char_to_byte(11), Some(13));
    assert_eq!(conv.char_to_byte(12), None);
    // Descending queries
    assert_eq!(conv.char_to_byte(2), Some(3));

    assert_eq!(conv.byte_to_char(2), Some(1));
    assert_eq!(conv.byte_to_char(3), Some(2));
    assert_eq!(conv.byte_to_char(9), Some(7));
    assert_eq!(conv.byte_to_char(13), Some(11));
    assert_eq!(conv.byte_to_char(14), None);
}

#[test]
fn test_utf16_edit_inside_code_unit_completes_crlf() {
    // "\r" followed by U+010A; zeroing the high byte turns U+010A into "\n"
    let (buffer, interp) = open(&[0x0D, 0x00, 0x0A, 0x01], Utf16Le);
    assert_eq!(segments(&interp.line_index()), vec![(0, 1, 2), (1, 0, 2)]);

    edit(&buffer, &[(3, 1, &[0x00])]);
    assert_eq!(segments(&interp.line_index()), vec![(0, 2, 4), (0, 0, 0)]);
    assert_eq!(
        interp.line_index(),
        LineIndex::build(&buffer.snapshot(), interp.encoding())
    );

    // And back: splitting the pair again
    edit(&buffer, &[(3, 1, &[0x01])]);
    assert_eq!(segments(&interp.line_index()), vec![(0, 1, 2), (1, 0, 2)]);
}

#[test]
fn test_utf16_low_byte_edit_after_surrogate() {
    // "a" + "😀" + "\r" then "b"; rewrite single bytes inside each unit
    let text = Utf16Le.encode_str("a😀\rb");
    let (buffer, interp) = open(&text, Utf16Le);
    for offset in 1..text.len() {
        let original = buffer.snapshot().byte_at(offset).unwrap();
        edit(&buffer, &[(offset, 1, &[0x0A])]);
        edit(&buffer, &[(offset, 1, &[0x00])]);
        edit(&buffer, &[(offset, 1, &[original])]);
    }
    assert_eq!(interp.snapshot().text(), "a😀\rb");
    assert!(interp.check_integrity());
}

#[test]
fn test_utf16_interpretation() {
    let text = Utf16Le.encode_str("a\r\nb😀\nc");
    let (buffer, interp) = open(&text, Utf16Le);
    assert_eq!(segments(&interp.line_index()), vec![(1, 2, 6), (2, 1, 8), (1, 0, 2)]);

    let mut conv = interp.converter();
    assert_eq!(conv.char_to_byte(4), Some(8));
    assert_eq!(conv.char_to_byte(5), Some(12));

    // An odd-sized insertion shifts every later code unit
    edit(&buffer, &[(1, 0, b"\x00")]);
    assert!(interp.check_integrity());
    edit(&buffer, &[(1, 1, b"")]);
    assert_eq!(interp.snapshot().text(), "a\r\nb😀\nc");
}

#[test]
fn test_two_interpretations_on_one_buffer() {
    let buffer = Buffer::from_bytes("é\n".as_bytes());
    let utf8 = Interpretation::open_with(&buffer, Arc::new(Utf8), checked());
    let latin1 = Interpretation::open_with(&buffer, Arc::new(Latin1), checked());
    edit(&buffer, &[(0, 0, b"x")]);

    assert_eq!(utf8.snapshot().char_len(), 3);
    assert_eq!(latin1.snapshot().char_len(), 4);
    assert_eq!(buffer.listener_count(), 2);
    drop(latin1);
    assert_eq!(buffer.listener_count(), 1);
}

#[test]
fn test_snapshot_is_consistent_across_edits() {
    let (buffer, interp) = open(b"one\ntwo", Utf8);
    let old = interp.snapshot();
    edit(&buffer, &[(3, 0, b"\nmore")]);

    assert_eq!(old.lines().line_count(), 2);
    assert_eq!(old.text(), "one\ntwo");
    assert!(old.check_integrity());
    let new = interp.snapshot();
    assert_eq!(new.lines().line_count(), 3);
    assert_eq!(new.revision(), old.revision() + 1);
}

#[test]
fn test_undo_keeps_index_in_step() {
    let (buffer, interp) = open(b"x\r\ny", Utf8);
    edit(&buffer, &[(1, 1, b""), (3, 0, b"\r")]);
    assert!(buffer.try_undo());
    assert_eq!(interp.snapshot().text(), "x\r\ny");
    assert!(buffer.try_redo());
    assert!(interp.check_integrity());
}

#[test]
fn test_open_catches_up_after_missed_edits() {
    let buffer = Buffer::from_bytes(b"abc");
    let interp = Interpretation::open_with(&buffer, Arc::new(Utf8), checked());
    edit(&buffer, &[(3, 0, b"\ndef")]);
    assert_eq!(interp.line_index().line_count(), 2);
}

#[test]
fn test_random_edits_keep_index_consistent() {
    use rand::{Rng, SeedableRng};
    let fragments: [&[u8]; 9] = [
        b"a", b"bc", b"\r", b"\n", b"\r\n", "é".as_bytes(), "😀".as_bytes(), b"\xff", b"\xe2\x82",
    ];
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let (buffer, interp) = open(b"", Utf8);

    for _ in 0..2000 {
        let len = buffer.length();
        let offset = rng.gen_range(0..=len);
        let remove = rng.gen_range(0..=(len - offset).min(6));
        let insert = fragments[rng.gen_range(0..fragments.len())];
        edit(&buffer, &[(offset, remove, insert)]);
    }
    assert!(interp.check_integrity());
}

/// Random batched edits on a document spanning several storage chunks,
/// checked against a plain byte vector and a full decode
fn check_large_document(encoding: Arc<dyn Encoding>, seed: u64) {
    use rand::{Rng, SeedableRng};
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut fragments: Vec<Vec<u8>> = ["word ", "\r", "\n", "\r\n", "é", "😀"]
        .iter()
        .map(|text| encoding.encode_str(text))
        .collect();
    fragments.push(vec![0xFF]);

    let mut model = Vec::new();
    while model.len() < 300 * 1024 {
        model.extend_from_slice(&fragments[rng.gen_range(0..fragments.len())]);
    }
    let buffer = Buffer::with_options(BufferOptions::default(), Logger::silent());
    buffer.load(&model).unwrap();
    assert!(buffer.snapshot().piece_count() >= 4);
    let interp = Interpretation::open_with(&buffer, Arc::clone(&encoding), unchecked());

    for round in 0..400 {
        let len = buffer.length();
        let mut tx = buffer.begin(SourceId::NONE);
        for _ in 0..rng.gen_range(1..=8) {
            let offset = rng.gen_range(0..=len);
            let remove = rng.gen_range(0..=(len - offset).min(24));
            let mut insert = Vec::new();
            for _ in 0..rng.gen_range(0..=5) {
                insert.extend_from_slice(&fragments[rng.gen_range(0..fragments.len())]);
            }
            tx.modify(offset, remove, &insert);
        }
        // Overlapping batches are rejected as a whole
        if let Ok(record) = tx.end() {
            record.apply_to(&mut model).unwrap();
        }

        if round % 50 == 49 {
            assert!(buffer.snapshot().to_bytes() == model, "content diverged at round {}", round);
            assert!(interp.check_integrity(), "line index diverged at round {}", round);
        }
    }

    assert!(buffer.snapshot().piece_count() > 100);
    assert!(interp.check_integrity());
}

#[test]
fn test_large_utf8_document_random_batches() {
    check_large_document(Arc::new(Utf8), 7);
}

#[test]
fn test_large_utf16_document_random_batches() {
    check_large_document(Arc::new(Utf16Le), 11);
}

// =============================================================================
// Properties
// =============================================================================

fn fragment() -> impl Strategy<Value = Vec<u8>> {
    prop::sample::select(vec![
        b"a".to_vec(),
        b"xyz".to_vec(),
        b"\r".to_vec(),
        b"\n".to_vec(),
        b"\r\n".to_vec(),
        "é".as_bytes().to_vec(),
        "€".as_bytes().to_vec(),
        "😀".as_bytes().to_vec(),
        vec![0xFF],
        vec![0xE2],
        vec![0x00],
    ])
}

/// Bytes that form or break CR, LF and surrogates in UTF-16
fn raw_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop::sample::select(vec![0x00u8, 0x0A, 0x0D, 0x3D, 0x61, 0xD8, 0xDC]),
        0..4,
    )
}

fn document() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(fragment(), 0..20).prop_map(|parts| parts.concat())
}

/// (offset fraction, remove length, inserted bytes)
fn edits() -> impl Strategy<Value = Vec<(u16, usize, Vec<u8>)>> {
    prop::collection::vec((0u16..=1000, 0usize..4, document()), 1..12)
}

fn check_edits(encoding: Arc<dyn Encoding>, initial: Vec<u8>, steps: Vec<(u16, usize, Vec<u8>)>) -> std::result::Result<(), TestCaseError> {
    let buffer = Buffer::from_bytes(&initial);
    let interp = Interpretation::open_with(&buffer, encoding, unchecked());
    for (fraction, remove, insert) in steps {
        let len = buffer.length();
        let offset = len * fraction as usize / 1000;
        let remove = remove.min(len - offset);
        edit(&buffer, &[(offset, remove, &insert)]);
        prop_assert!(interp.check_integrity());
    }
    Ok(())
}

proptest! {
    #[test]
    fn prop_utf8_index_matches_full_decode(initial in document(), steps in edits()) {
        check_edits(Arc::new(Utf8), initial, steps)?;
    }

    #[test]
    fn prop_utf16_index_matches_full_decode(initial in document(), steps in edits()) {
        check_edits(Arc::new(Utf16Le), initial, steps)?;
    }

    #[test]
    fn prop_utf16_byte_edits_match_full_decode(
        initial in document(),
        steps in prop::collection::vec((0u16..=1000, 0usize..3, raw_bytes()), 1..16),
    ) {
        let initial = Utf16Le.encode_str(&String::from_utf8_lossy(&initial));
        check_edits(Arc::new(Utf16Le), initial, steps)?;
    }

    #[test]
    fn prop_utf16be_byte_edits_match_full_decode(
        initial in document(),
        steps in prop::collection::vec((0u16..=1000, 0usize..3, raw_bytes()), 1..16),
    ) {
        let initial = Utf16Be.encode_str(&String::from_utf8_lossy(&initial));
        check_edits(Arc::new(Utf16Be), initial, steps)?;
    }

    #[test]
    fn prop_batched_edits_match_full_decode(
        initial in document(),
        inserts in prop::collection::vec((0u16..=1000, document()), 1..6),
    ) {
        let buffer = Buffer::from_bytes(&initial);
        let interp = Interpretation::open_with(&buffer, Arc::new(Utf8), unchecked());
        let len = buffer.length();
        let mut tx = buffer.begin(SourceId::NONE);
        for (fraction, bytes) in &inserts {
            tx.insert(len * *fraction as usize / 1000, bytes);
        }
        tx.end().unwrap();
        prop_assert!(interp.check_integrity());
    }
}
