//! Text encodings
//!
//! An [`Encoding`] turns the first bytes of its input into one character.
//! Decoding never fails: malformed input yields U+FFFD and reports that a
//! replacement happened, and decoding resumes right after the bytes that
//! were consumed.

use crate::constants::text::REPLACEMENT_CHAR;
use std::fmt;

/// Longest byte sequence any provided encoding needs to decode one character
pub const MAX_SEQUENCE_LEN: usize = 4;

/// One decoded character
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Decoded {
    pub ch: char,
    /// Bytes consumed; always at least 1
    pub len: usize,
    /// The input was malformed and `ch` is the replacement character
    pub replaced: bool,
}

impl Decoded {
    fn ok(ch: char, len: usize) -> Self {
        Self {
            ch,
            len,
            replaced: false,
        }
    }

    fn replacement(len: usize) -> Self {
        Self {
            ch: REPLACEMENT_CHAR,
            len,
            replaced: true,
        }
    }
}

pub trait Encoding: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    /// Decode the character at the start of `bytes`.
    ///
    /// `bytes` is never empty and holds up to [`MAX_SEQUENCE_LEN`] bytes;
    /// it is shorter only at the end of the document.
    fn decode(&self, bytes: &[u8]) -> Decoded;

    /// Append the encoded form of `ch` to `out`
    fn encode(&self, ch: char, out: &mut Vec<u8>);

    fn encode_str(&self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len());
        for ch in text.chars() {
            self.encode(ch, &mut out);
        }
        out
    }
}

// =============================================================================
// UTF-8
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct Utf8;

impl Encoding for Utf8 {
    fn name(&self) -> &'static str {
        "utf-8"
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        let lead = bytes[0];
        if lead < 0x80 {
            return Decoded::ok(char::from(lead), 1);
        }

        let len = match lead {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return Decoded::replacement(1),
        };

        match bytes.get(..len).map(std::str::from_utf8) {
            Some(Ok(s)) => match s.chars().next() {
                Some(ch) => Decoded::ok(ch, len),
                None => Decoded::replacement(1),
            },
            _ => Decoded::replacement(1),
        }
    }

    fn encode(&self, ch: char, out: &mut Vec<u8>) {
        let mut buf = [0u8; 4];
        out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }
}

// =============================================================================
// UTF-16
// =============================================================================

#[derive(Clone, Copy, Debug, Default)]
pub struct Utf16Le;

#[derive(Clone, Copy, Debug, Default)]
pub struct Utf16Be;

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Decoded {
    let first = match bytes {
        [a, b, ..] => unit([*a, *b]),
        // A trailing odd byte
        _ => return Decoded::replacement(1),
    };

    match first {
        0xD800..=0xDBFF => {
            let second = match bytes {
                [_, _, c, d, ..] => unit([*c, *d]),
                _ => return Decoded::replacement(2),
            };
            if !(0xDC00..=0xDFFF).contains(&second) {
                return Decoded::replacement(2);
            }
            let code = 0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00);
            match char::from_u32(code) {
                Some(ch) => Decoded::ok(ch, 4),
                None => Decoded::replacement(2),
            }
        }
        0xDC00..=0xDFFF => Decoded::replacement(2),
        _ => match char::from_u32(u32::from(first)) {
            Some(ch) => Decoded::ok(ch, 2),
            None => Decoded::replacement(2),
        },
    }
}

impl Encoding for Utf16Le {
    fn name(&self) -> &'static str {
        "utf-16le"
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        decode_utf16(bytes, u16::from_le_bytes)
    }

    fn encode(&self, ch: char, out: &mut Vec<u8>) {
        let mut buf = [0u16; 2];
        for unit in ch.encode_utf16(&mut buf) {
            out.extend_from_slice(&unit.to_le_bytes());
        }
    }
}

impl Encoding for Utf16Be {
    fn name(&self) -> &'static str {
        "utf-16be"
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        decode_utf16(bytes, u16::from_be_bytes)
    }

    fn encode(&self, ch: char, out: &mut Vec<u8>) {
        let mut buf = [0u16; 2];
        for unit in ch.encode_utf16(&mut buf) {
            out.extend_from_slice(&unit.to_be_bytes());
        }
    }
}

// =============================================================================
// Latin-1
// =============================================================================

/// ISO-8859-1: every byte is the codepoint of the same value
#[derive(Clone, Copy, Debug, Default)]
pub struct Latin1;

impl Encoding for Latin1 {
    fn name(&self) -> &'static str {
        "latin-1"
    }

    fn decode(&self, bytes: &[u8]) -> Decoded {
        Decoded::ok(char::from(bytes[0]), 1)
    }

    fn encode(&self, ch: char, out: &mut Vec<u8>) {
        out.push(u8::try_from(u32::from(ch)).unwrap_or(b'?'));
    }
}

/// Look up a provided encoding by name
pub fn by_name(name: &str) -> Option<std::sync::Arc<dyn Encoding>> {
    match name.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(std::sync::Arc::new(Utf8)),
        "utf-16le" | "utf16le" => Some(std::sync::Arc::new(Utf16Le)),
        "utf-16be" | "utf16be" => Some(std::sync::Arc::new(Utf16Be)),
        "latin-1" | "latin1" | "iso-8859-1" => Some(std::sync::Arc::new(Latin1)),
        _ => None,
    }
}
