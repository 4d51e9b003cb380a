//! Artwork detail records (`mhod`): names and image containers

use super::image::ImageNameRecord;
use super::{header_len, ArtworkRecordKind};
use crate::codec::{
    decode_string, encode_string, ByteReader, ByteWriter, Endian, RawHeader, StringEncoding, Tag,
};
use crate::error::FormatError;

pub const ARTWORK_DETAIL_TAG: Tag = Tag::new(b"mhod");

/// Detail type codes, stored as a u16 at 0x0c
pub mod detail_type {
    pub const ALBUM_NAME: u16 = 1;
    pub const THUMBNAIL: u16 = 2;
    pub const FILE_NAME: u16 = 3;
    pub const FULL_RESOLUTION: u16 = 5;
}

/// String encodings as stored in the string sub-header
const ENCODING_UTF8: u8 = 1;
const ENCODING_UTF16: u8 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ArtworkDetailBody {
    AlbumName(String),
    FileName(String),
    Thumbnail(ImageNameRecord),
    FullResolution(ImageNameRecord),
    Unrecognized { type_code: u16, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkDetail {
    header: RawHeader,
    pub body: ArtworkDetailBody,
    trailing: Vec<u8>,
}

impl ArtworkDetail {
    pub fn new(endian: Endian, body: ArtworkDetailBody) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::Detail), endian),
            body,
            trailing: Vec::new(),
        }
    }

    pub fn type_code(&self) -> u16 {
        match &self.body {
            ArtworkDetailBody::AlbumName(_) => detail_type::ALBUM_NAME,
            ArtworkDetailBody::FileName(_) => detail_type::FILE_NAME,
            ArtworkDetailBody::Thumbnail(_) => detail_type::THUMBNAIL,
            ArtworkDetailBody::FullResolution(_) => detail_type::FULL_RESOLUTION,
            ArtworkDetailBody::Unrecognized { type_code, .. } => *type_code,
        }
    }

    pub fn image_name(&self) -> Option<&ImageNameRecord> {
        match &self.body {
            ArtworkDetailBody::Thumbnail(name) | ArtworkDetailBody::FullResolution(name) => {
                Some(name)
            }
            _ => None,
        }
    }

    pub fn image_name_mut(&mut self) -> Option<&mut ImageNameRecord> {
        match &mut self.body {
            ArtworkDetailBody::Thumbnail(name) | ArtworkDetailBody::FullResolution(name) => {
                Some(name)
            }
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.body {
            ArtworkDetailBody::AlbumName(s) | ArtworkDetailBody::FileName(s) => Some(s),
            _ => None,
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, ARTWORK_DETAIL_TAG)?;
        let type_code: u16 = header.value(0x0c);
        let endian = r.endian();

        let parsed = match type_code {
            detail_type::ALBUM_NAME => ArtworkDetailBody::AlbumName(read_string(&mut body, endian)?),
            detail_type::FILE_NAME => ArtworkDetailBody::FileName(read_string(&mut body, endian)?),
            detail_type::THUMBNAIL => ArtworkDetailBody::Thumbnail(ImageNameRecord::read(&mut body)?),
            detail_type::FULL_RESOLUTION => {
                ArtworkDetailBody::FullResolution(ImageNameRecord::read(&mut body)?)
            }
            _ => ArtworkDetailBody::Unrecognized {
                type_code,
                data: body.read_bytes(body.remaining())?.to_vec(),
            },
        };
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            body: parsed,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let endian = w.endian();
        let mut body = ByteWriter::new(endian);
        let mut padding = 0u8;
        match &self.body {
            ArtworkDetailBody::AlbumName(s) => {
                padding = write_string(&mut body, s, StringEncoding::Utf8, endian);
            }
            ArtworkDetailBody::FileName(s) => {
                padding = write_string(&mut body, s, StringEncoding::Utf16, endian);
            }
            ArtworkDetailBody::Thumbnail(name) | ArtworkDetailBody::FullResolution(name) => {
                name.write(&mut body)
            }
            ArtworkDetailBody::Unrecognized { data, .. } => body.write_bytes(data),
        }
        body.write_bytes(&self.trailing);

        let mut header = self.header.clone();
        header.set_value(0x0c, self.type_code());
        header.set_value(0x0f, padding);
        header.write(w, ARTWORK_DETAIL_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

fn read_string(body: &mut ByteReader<'_>, endian: Endian) -> Result<String, FormatError> {
    let len = body.read_u32()? as usize;
    let encoding = match body.read_u8()? {
        ENCODING_UTF16 => StringEncoding::Utf16,
        _ => StringEncoding::Utf8,
    };
    body.skip(3)?;
    body.skip(4)?;
    let value = decode_string(body.read_bytes(len)?, encoding, endian);
    // Alignment padding is regenerated on write
    body.skip(body.remaining())?;
    Ok(value)
}

/// Write a string sub-header and payload padded to four bytes; returns the
/// padding length
fn write_string(body: &mut ByteWriter, value: &str, encoding: StringEncoding, endian: Endian) -> u8 {
    let bytes = encode_string(value, encoding, endian);
    body.write_u32(bytes.len() as u32);
    body.write_u8(match encoding {
        StringEncoding::Utf8 => ENCODING_UTF8,
        StringEncoding::Utf16 => ENCODING_UTF16,
    });
    body.write_zeros(3);
    body.write_u32(0);
    body.write_bytes(&bytes);
    let padding = (4 - bytes.len() % 4) % 4;
    body.write_zeros(padding);
    padding as u8
}
