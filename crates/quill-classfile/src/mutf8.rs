//! The modified UTF-8 encoding used by `CONSTANT_Utf8` entries.
//!
//! Relative to standard UTF-8: NUL is encoded as the two-byte sequence
//! `0xC0 0x80`, and supplementary characters are encoded as CESU-8-style
//! surrogate pairs; four-byte sequences never appear.

use crate::error::{Error, Result};

pub fn encode_modified_utf8(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let cp = ch as u32;
        match cp {
            0 => out.extend_from_slice(&[0xC0, 0x80]),
            0x01..=0x7F => out.push(cp as u8),
            0x80..=0x7FF => {
                out.push(0xC0 | (cp >> 6) as u8);
                out.push(0x80 | (cp & 0x3F) as u8);
            }
            0x800..=0xFFFF => {
                out.push(0xE0 | (cp >> 12) as u8);
                out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
                out.push(0x80 | (cp & 0x3F) as u8);
            }
            _ => {
                // Encode each UTF-16 surrogate half as a three-byte unit.
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    let u = *unit as u32;
                    out.push(0xE0 | (u >> 12) as u8);
                    out.push(0x80 | ((u >> 6) & 0x3F) as u8);
                    out.push(0x80 | (u & 0x3F) as u8);
                }
            }
        }
    }
    out
}

pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String> {
    let mut units: Vec<u16> = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    while let Some((&b, tail)) = rest.split_first() {
        match b {
            0x00..=0x7F => {
                units.push(b as u16);
                rest = tail;
            }
            b if b & 0xE0 == 0xC0 => {
                let (&b2, tail2) = tail.split_first().ok_or(Error::BadModifiedUtf8)?;
                if b2 & 0xC0 != 0x80 {
                    return Err(Error::BadModifiedUtf8);
                }
                units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
                rest = tail2;
            }
            b if b & 0xF0 == 0xE0 => {
                if tail.len() < 2 {
                    return Err(Error::BadModifiedUtf8);
                }
                let (b2, b3) = (tail[0], tail[1]);
                if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                    return Err(Error::BadModifiedUtf8);
                }
                units.push(
                    (((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16,
                );
                rest = &tail[2..];
            }
            _ => return Err(Error::BadModifiedUtf8),
        }
    }
    // Identifiers may legally contain unpaired surrogates; decode lossily
    // rather than rejecting the whole constant.
    Ok(String::from_utf16_lossy(&units))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ascii_round_trips_unchanged() {
        let s = "java/lang/Object";
        assert_eq!(encode_modified_utf8(s), s.as_bytes());
        assert_eq!(decode_modified_utf8(s.as_bytes()).unwrap(), s);
    }

    #[test]
    fn nul_uses_two_bytes() {
        assert_eq!(encode_modified_utf8("\0"), vec![0xC0, 0x80]);
        assert_eq!(decode_modified_utf8(&[0xC0, 0x80]).unwrap(), "\0");
    }

    #[test]
    fn supplementary_characters_round_trip_as_surrogate_pairs() {
        let s = "a\u{1F600}b";
        let encoded = encode_modified_utf8(s);
        assert_eq!(encoded.len(), 8);
        assert_eq!(decode_modified_utf8(&encoded).unwrap(), s);
    }

    #[test]
    fn bmp_characters_round_trip() {
        let s = "étendre\u{4E2D}";
        assert_eq!(decode_modified_utf8(&encode_modified_utf8(s)).unwrap(), s);
    }
}
