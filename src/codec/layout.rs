//! Version-gated header field layout
//!
//! Record headers are fixed-size blocks whose field set grows with the format
//! version. A header is kept as raw bytes so fields this crate does not know
//! about survive a read-modify-write cycle. Known fields are declared once in
//! a table (offset, width, first version carrying the field) and that same
//! table drives both decoding and encoding.

use super::bytes::{ByteReader, ByteWriter};
use super::tag::Tag;
use crate::error::FormatError;
use binrw::Endian;

/// Header length of list records (`mhlt`, `mhlp`, `mhla`, `mhli`, `mhlf`)
pub const LIST_HEADER_LEN: u32 = 0x5c;

/// Bytes taken by the tag and the two length fields
const PREFIX_LEN: usize = 12;

/// One entry of a header layout table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    /// Offset from the start of the record
    pub offset: usize,
    pub width: usize,
    /// First format version that carries the field
    pub since: u32,
}

impl Field {
    /// Whether the field can be read from / written to a header of
    /// `header_len` bytes in a database of `version`
    pub fn is_present(&self, version: u32, header_len: usize) -> bool {
        version >= self.since && self.offset + self.width <= header_len
    }
}

/// Fixed-width scalar stored in a record header
pub trait HeaderValue: Copy + Default {
    const WIDTH: usize;

    fn decode(bytes: &[u8], endian: Endian) -> Self;

    fn encode(self, out: &mut [u8], endian: Endian);
}

macro_rules! header_value {
    ($ty:ty) => {
        impl HeaderValue for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();

            fn decode(bytes: &[u8], endian: Endian) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$ty>()];
                raw.copy_from_slice(&bytes[..Self::WIDTH]);
                match endian {
                    Endian::Little => <$ty>::from_le_bytes(raw),
                    Endian::Big => <$ty>::from_be_bytes(raw),
                }
            }

            fn encode(self, out: &mut [u8], endian: Endian) {
                let raw = match endian {
                    Endian::Little => self.to_le_bytes(),
                    Endian::Big => self.to_be_bytes(),
                };
                out[..Self::WIDTH].copy_from_slice(&raw);
            }
        }
    };
}

header_value!(u8);
header_value!(u16);
header_value!(u32);
header_value!(u64);
header_value!(i16);
header_value!(i32);

impl HeaderValue for bool {
    const WIDTH: usize = 1;

    fn decode(bytes: &[u8], _endian: Endian) -> Self {
        bytes[0] != 0
    }

    fn encode(self, out: &mut [u8], _endian: Endian) {
        out[0] = self as u8;
    }
}

/// The raw header block of a record, including the 12-byte prefix slot.
///
/// The prefix (tag and the two length fields) is regenerated on write; the
/// remaining bytes are kept verbatim apart from the fields a layout table
/// overlays on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    bytes: Vec<u8>,
    endian: Endian,
}

impl RawHeader {
    /// A blank header of `len` bytes for a freshly created record
    pub fn zeroed(len: u32, endian: Endian) -> Self {
        Self {
            bytes: vec![0; (len as usize).max(PREFIX_LEN)],
            endian,
        }
    }

    /// Read a record header, checking its tag.
    ///
    /// Returns the header and the record's second length field, which is the
    /// total record length for most records and the child count for lists.
    pub fn read(r: &mut ByteReader<'_>, expected: Tag) -> Result<(Self, u32), FormatError> {
        let offset = r.offset();
        r.expect_tag(expected)?;
        let header_len = r.read_u32()?;
        let second = r.read_u32()?;

        if (header_len as usize) < PREFIX_LEN {
            return Err(FormatError::InvalidLength {
                tag: expected,
                offset,
                length: header_len,
            });
        }

        let body = r.read_bytes(header_len as usize - PREFIX_LEN)?;
        let mut bytes = Vec::with_capacity(header_len as usize);
        bytes.resize(PREFIX_LEN, 0);
        bytes.extend_from_slice(body);

        Ok((
            Self {
                bytes,
                endian: r.endian(),
            },
            second,
        ))
    }

    /// Read a record whose second length field is its total length and split
    /// off the bytes that follow the header as a bounded body reader
    pub fn read_with_body<'a>(
        r: &mut ByteReader<'a>,
        expected: Tag,
    ) -> Result<(Self, ByteReader<'a>), FormatError> {
        let offset = r.offset();
        let (header, total_len) = Self::read(r, expected)?;
        let body_len = (total_len as usize)
            .checked_sub(header.len())
            .ok_or(FormatError::InvalidLength {
                tag: expected,
                offset,
                length: total_len,
            })?;
        let body = r.sub_reader(body_len)?;
        Ok((header, body))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.len() <= PREFIX_LEN
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Grow the header with zero bytes up to `len`; never shrinks
    pub fn ensure_len(&mut self, len: u32) {
        if self.bytes.len() < len as usize {
            self.bytes.resize(len as usize, 0);
        }
    }

    /// Read a field, or its default when the version or header length does
    /// not carry it
    pub fn get<T: HeaderValue>(&self, offset: usize, since: u32, version: u32) -> T {
        if version < since || offset + T::WIDTH > self.bytes.len() {
            return T::default();
        }
        T::decode(&self.bytes[offset..], self.endian)
    }

    /// Write a field; silently skipped when the layout has no room for it
    pub fn set<T: HeaderValue>(&mut self, offset: usize, since: u32, version: u32, value: T) {
        if version < since || offset + T::WIDTH > self.bytes.len() {
            return;
        }
        value.encode(&mut self.bytes[offset..], self.endian);
    }

    /// Read an ungated field such as a child count
    pub fn value<T: HeaderValue>(&self, offset: usize) -> T {
        self.get(offset, 0, 0)
    }

    pub fn set_value<T: HeaderValue>(&mut self, offset: usize, value: T) {
        self.set(offset, 0, 0, value)
    }

    pub fn bytes_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset + len)
    }

    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) {
        if let Some(slot) = self.bytes.get_mut(offset..offset + data.len()) {
            slot.copy_from_slice(data);
        }
    }

    /// Emit the header: tag, header length, `second`, then the body bytes
    pub fn write(&self, w: &mut ByteWriter, tag: Tag, second: u32) {
        w.write_tag(tag);
        w.write_u32(self.bytes.len() as u32);
        w.write_u32(second);
        w.write_bytes(&self.bytes[PREFIX_LEN..]);
    }
}

/// Declare a header struct whose fields live at fixed, version-gated offsets.
///
/// Generates the struct, its `LAYOUT` table and `decode`/`encode` methods that
/// consult that table against a [`RawHeader`].
macro_rules! header_fields {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident: $ty:ty = $offset:literal since $since:expr,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq)]
        $vis struct $name {
            $( $(#[$fmeta])* pub $field: $ty, )*
        }

        impl $name {
            #[allow(dead_code)]
            pub const LAYOUT: &'static [$crate::codec::Field] = &[
                $( $crate::codec::Field {
                    name: stringify!($field),
                    offset: $offset,
                    width: <$ty as $crate::codec::HeaderValue>::WIDTH,
                    since: $since,
                }, )*
            ];

            pub fn decode(header: &$crate::codec::RawHeader, version: u32) -> Self {
                Self { $( $field: header.get($offset, $since, version), )* }
            }

            pub fn encode(&self, header: &mut $crate::codec::RawHeader, version: u32) {
                $( header.set($offset, $since, version, self.$field); )*
            }
        }
    };
}

pub(crate) use header_fields;

#[cfg(test)]
mod tests {
    use super::*;

    header_fields! {
        struct Sample {
            count: u32 = 0x0c since 1,
            flag: bool = 0x10 since 1,
            late: u16 = 0x12 since 13,
            far: u64 = 0x20 since 1,
        }
    }

    #[test]
    fn test_fields_gated_by_version() {
        let mut header = RawHeader::zeroed(0x28, Endian::Little);
        let sample = Sample {
            count: 7,
            flag: true,
            late: 0x1234,
            far: 99,
        };

        sample.encode(&mut header, 12);
        let decoded = Sample::decode(&header, 12);
        assert_eq!(decoded.count, 7);
        assert!(decoded.flag);
        assert_eq!(decoded.late, 0, "field introduced in v13 is absent at v12");
        assert_eq!(decoded.far, 99);

        sample.encode(&mut header, 13);
        assert_eq!(Sample::decode(&header, 13).late, 0x1234);
    }

    #[test]
    fn test_fields_gated_by_header_length() {
        let mut header = RawHeader::zeroed(0x20, Endian::Big);
        let sample = Sample {
            far: 5,
            ..Default::default()
        };
        sample.encode(&mut header, 25);
        assert_eq!(header.len(), 0x20);
        assert_eq!(Sample::decode(&header, 25).far, 0);

        let far = Sample::LAYOUT.iter().find(|f| f.name == "far").unwrap();
        assert!(!far.is_present(25, 0x20));
        assert!(far.is_present(25, 0x28));
    }

    #[test]
    fn test_read_preserves_unknown_bytes() {
        let mut w = ByteWriter::new(Endian::Little);
        w.write_tag(Tag::new(b"mhzz"));
        w.write_u32(0x18);
        w.write_u32(0x18);
        w.write_bytes(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes, Endian::Little);
        let (header, second) = RawHeader::read(&mut r, Tag::new(b"mhzz")).unwrap();
        assert_eq!(second, 0x18);
        assert!(r.is_empty());

        let mut out = ByteWriter::new(Endian::Little);
        header.write(&mut out, Tag::new(b"mhzz"), 0x18);
        assert_eq!(out.into_bytes(), bytes);
    }

    #[test]
    fn test_header_shorter_than_prefix_is_rejected() {
        let mut w = ByteWriter::new(Endian::Little);
        w.write_tag(Tag::new(b"mhzz"));
        w.write_u32(4);
        w.write_u32(4);
        let bytes = w.into_bytes();
        let mut r = ByteReader::new(&bytes, Endian::Little);
        let err = RawHeader::read(&mut r, Tag::new(b"mhzz")).unwrap_err();
        assert!(matches!(err, FormatError::InvalidLength { length: 4, .. }));
    }
}
