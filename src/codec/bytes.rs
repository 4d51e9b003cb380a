//! Endian-aware byte buffer reader and writer

use super::tag::Tag;
use crate::error::FormatError;
use binrw::Endian;

macro_rules! read_int {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self) -> Result<$ty, FormatError> {
            let raw = self.read_array::<{ std::mem::size_of::<$ty>() }>()?;
            Ok(match self.endian {
                Endian::Little => <$ty>::from_le_bytes(raw),
                Endian::Big => <$ty>::from_be_bytes(raw),
            })
        }
    };
}

macro_rules! write_int {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) {
            match self.endian {
                Endian::Little => self.buf.extend_from_slice(&value.to_le_bytes()),
                Endian::Big => self.buf.extend_from_slice(&value.to_be_bytes()),
            }
        }
    };
}

/// Forward-only reader over a byte slice.
///
/// Every read is bounds-checked; running past the end yields
/// [`FormatError::Truncated`] instead of panicking.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
    /// Absolute file offset of `buf[0]`, used in error messages
    base: usize,
    endian: Endian,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8], endian: Endian) -> Self {
        Self {
            buf,
            pos: 0,
            base: 0,
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// Position relative to the start of this reader
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Absolute offset within the file
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], FormatError> {
        let bytes = self.peek_bytes(len)?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn peek_bytes(&self, len: usize) -> Result<&'a [u8], FormatError> {
        if len > self.remaining() {
            return Err(FormatError::Truncated {
                offset: self.offset(),
                wanted: len,
                available: self.remaining(),
            });
        }
        Ok(&self.buf[self.pos..self.pos + len])
    }

    pub fn skip(&mut self, len: usize) -> Result<(), FormatError> {
        self.read_bytes(len).map(|_| ())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> Result<u8, FormatError> {
        Ok(self.read_bytes(1)?[0])
    }

    read_int!(read_u16, u16);
    read_int!(read_u32, u32);
    read_int!(read_u64, u64);
    read_int!(read_i16, i16);
    read_int!(read_i32, i32);

    /// Read a tag, undoing the byte reversal of big-endian files
    pub fn read_tag(&mut self) -> Result<Tag, FormatError> {
        let raw = Tag(self.read_array::<4>()?);
        Ok(match self.endian {
            Endian::Little => raw,
            Endian::Big => raw.reversed(),
        })
    }

    pub fn peek_tag(&self) -> Result<Tag, FormatError> {
        self.clone().read_tag()
    }

    /// Read a tag and fail unless it matches `expected`
    pub fn expect_tag(&mut self, expected: Tag) -> Result<(), FormatError> {
        let offset = self.offset();
        let found = self.read_tag()?;
        if found != expected {
            return Err(FormatError::TagMismatch {
                expected,
                found,
                offset,
            });
        }
        Ok(())
    }

    /// Split off the next `len` bytes as a bounded reader and advance past them
    pub fn sub_reader(&mut self, len: usize) -> Result<ByteReader<'a>, FormatError> {
        let base = self.offset();
        let buf = self.read_bytes(len)?;
        Ok(ByteReader {
            buf,
            pos: 0,
            base,
            endian: self.endian,
        })
    }
}

/// Growable output buffer with a fixed endianness
#[derive(Debug, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
    endian: Endian,
}

impl ByteWriter {
    pub fn new(endian: Endian) -> Self {
        Self {
            buf: Vec::new(),
            endian,
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_zeros(&mut self, len: usize) {
        self.buf.resize(self.buf.len() + len, 0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    write_int!(write_u16, u16);
    write_int!(write_u32, u32);
    write_int!(write_u64, u64);
    write_int!(write_i16, i16);
    write_int!(write_i32, i32);

    pub fn write_tag(&mut self, tag: Tag) {
        let tag = match self.endian {
            Endian::Little => tag,
            Endian::Big => tag.reversed(),
        };
        self.buf.extend_from_slice(tag.as_bytes());
    }

    /// Overwrite a previously written u32, used to fill in lengths once the
    /// children of a record have been written
    pub fn patch_u32(&mut self, at: usize, value: u32) {
        let bytes = match self.endian {
            Endian::Little => value.to_le_bytes(),
            Endian::Big => value.to_be_bytes(),
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }
}
