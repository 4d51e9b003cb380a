//! File list (`mhlf`) and file info (`mhif`): one entry per thumbnail format

use super::{header_len, ArtworkRecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const FILE_LIST_TAG: Tag = Tag::new(b"mhlf");
pub const FILE_INFO_TAG: Tag = Tag::new(b"mhif");

header_fields! {
    pub struct FileInfoFields {
        format_id: u32 = 0x10 since 0,
        /// Bytes per thumbnail of this format
        image_size: u32 = 0x14 since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfoRecord {
    header: RawHeader,
    pub fields: FileInfoFields,
    trailing: Vec<u8>,
}

impl FileInfoRecord {
    pub fn new(endian: Endian, format_id: u32, image_size: u32) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::FileInfo), endian),
            fields: FileInfoFields {
                format_id,
                image_size,
            },
            trailing: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, FILE_INFO_TAG)?;
        let fields = FileInfoFields::decode(&header, 0);
        let trailing = body.read_bytes(body.remaining())?.to_vec();
        Ok(Self {
            header,
            fields,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut header = self.header.clone();
        self.fields.encode(&mut header, 0);
        header.write(w, FILE_INFO_TAG, (header.len() + self.trailing.len()) as u32);
        w.write_bytes(&self.trailing);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileListRecord {
    header: RawHeader,
    pub files: Vec<FileInfoRecord>,
}

impl FileListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::List), endian),
            files: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, FILE_LIST_TAG)?;
        let mut files = Vec::new();
        for _ in 0..count {
            files.push(FileInfoRecord::read(r)?);
        }
        Ok(Self { header, files })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        self.header.write(w, FILE_LIST_TAG, self.files.len() as u32);
        for file in &self.files {
            file.write(w);
        }
    }
}
