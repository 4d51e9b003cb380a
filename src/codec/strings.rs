//! String payload encoding
//!
//! String attributes declare their encoding (UTF-16 in the database's byte
//! order, or UTF-8), but real files sometimes carry a byte-order mark that
//! contradicts the declaration. A recognised BOM always wins over the
//! declared encoding.

use binrw::Endian;

const BOM_UTF8: &[u8] = &[0xef, 0xbb, 0xbf];
const BOM_UTF16_BE: &[u8] = &[0xfe, 0xff];
const BOM_UTF16_LE: &[u8] = &[0xff, 0xfe];

/// Encoding declared by a string attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// UTF-16 in the database's byte order
    #[default]
    Utf16,
    Utf8,
}

/// Decode a string payload, letting a byte-order mark override `declared`
pub fn decode_string(bytes: &[u8], declared: StringEncoding, endian: Endian) -> String {
    if let Some(rest) = bytes.strip_prefix(BOM_UTF8) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(BOM_UTF16_BE) {
        return decode_utf16(rest, Endian::Big);
    }
    if let Some(rest) = bytes.strip_prefix(BOM_UTF16_LE) {
        return decode_utf16(rest, Endian::Little);
    }

    match declared {
        StringEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        StringEncoding::Utf16 => decode_utf16(bytes, endian),
    }
}

/// Encode a string without a byte-order mark
pub fn encode_string(s: &str, encoding: StringEncoding, endian: Endian) -> Vec<u8> {
    match encoding {
        StringEncoding::Utf8 => s.as_bytes().to_vec(),
        StringEncoding::Utf16 => encode_utf16(s, endian),
    }
}

pub fn encode_utf16(s: &str, endian: Endian) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len() * 2);
    for unit in s.encode_utf16() {
        match endian {
            Endian::Little => out.extend_from_slice(&unit.to_le_bytes()),
            Endian::Big => out.extend_from_slice(&unit.to_be_bytes()),
        }
    }
    out
}

fn decode_utf16(bytes: &[u8], endian: Endian) -> String {
    // A dangling odd byte cannot form a code unit and is dropped
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| match endian {
            Endian::Little => u16::from_le_bytes([pair[0], pair[1]]),
            Endian::Big => u16::from_be_bytes([pair[0], pair[1]]),
        })
        .collect();
    String::from_utf16_lossy(&units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_utf16_little_endian() {
        let bytes = encode_utf16("Déjà Vu", Endian::Little);
        // 'D' = 0x0044, 'é' = 0x00E9
        assert_eq!(&bytes[..4], &[0x44, 0x00, 0xe9, 0x00]);
        assert_eq!(
            decode_string(&bytes, StringEncoding::Utf16, Endian::Little),
            "Déjà Vu"
        );
    }

    #[test]
    fn test_declared_utf8() {
        assert_eq!(
            decode_string("Motörhead".as_bytes(), StringEncoding::Utf8, Endian::Little),
            "Motörhead"
        );
    }

    #[test]
    fn test_utf8_bom_overrides_utf16_declaration() {
        let mut bytes = BOM_UTF8.to_vec();
        bytes.extend_from_slice(b"Title");
        assert_eq!(
            decode_string(&bytes, StringEncoding::Utf16, Endian::Little),
            "Title"
        );
    }

    #[test]
    fn test_utf16_be_bom_overrides_little_endian_database() {
        let mut bytes = BOM_UTF16_BE.to_vec();
        bytes.extend(encode_utf16("Album", Endian::Big));
        assert_eq!(
            decode_string(&bytes, StringEncoding::Utf16, Endian::Little),
            "Album"
        );
    }

    #[test]
    fn test_utf16_le_bom_overrides_utf8_declaration() {
        let mut bytes = BOM_UTF16_LE.to_vec();
        bytes.extend(encode_utf16("Artist", Endian::Little));
        assert_eq!(
            decode_string(&bytes, StringEncoding::Utf8, Endian::Big),
            "Artist"
        );
    }

    #[test]
    fn test_odd_trailing_byte_is_dropped() {
        let mut bytes = encode_utf16("ab", Endian::Little);
        bytes.push(0x41);
        assert_eq!(
            decode_string(&bytes, StringEncoding::Utf16, Endian::Little),
            "ab"
        );
    }
}
