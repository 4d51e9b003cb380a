//! Image list (`mhli`), image item (`mhii`) and image name (`mhni`) records

use super::detail::{ArtworkDetail, ArtworkDetailBody};
use super::{header_len, ArtworkRecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const IMAGE_LIST_TAG: Tag = Tag::new(b"mhli");
pub const IMAGE_ITEM_TAG: Tag = Tag::new(b"mhii");
pub const IMAGE_NAME_TAG: Tag = Tag::new(b"mhni");

header_fields! {
    /// Where one rendition of an image lives in its thumbnail file
    pub struct ImageNameFields {
        format_id: u32 = 0x10 since 0,
        offset: u32 = 0x14 since 0,
        size: u32 = 0x18 since 0,
        vertical_padding: i16 = 0x1c since 0,
        horizontal_padding: i16 = 0x1e since 0,
        height: u16 = 0x20 since 0,
        width: u16 = 0x22 since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageNameRecord {
    header: RawHeader,
    pub fields: ImageNameFields,
    pub details: Vec<ArtworkDetail>,
    trailing: Vec<u8>,
}

impl ImageNameRecord {
    pub fn new(endian: Endian, fields: ImageNameFields, file_name: &str) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::ImageName), endian),
            fields,
            details: vec![ArtworkDetail::new(
                endian,
                ArtworkDetailBody::FileName(file_name.to_string()),
            )],
            trailing: Vec::new(),
        }
    }

    pub fn format_id(&self) -> u32 {
        self.fields.format_id
    }

    pub fn offset(&self) -> u32 {
        self.fields.offset
    }

    pub fn size(&self) -> u32 {
        self.fields.size
    }

    /// Colon-separated name of the file holding the pixels
    pub fn file_name(&self) -> Option<&str> {
        self.details.iter().find_map(|d| match &d.body {
            ArtworkDetailBody::FileName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, IMAGE_NAME_TAG)?;
        let fields = ImageNameFields::decode(&header, 0);
        let child_count: u32 = header.value(0x0c);

        let mut details = Vec::new();
        for _ in 0..child_count {
            details.push(ArtworkDetail::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut header = self.header.clone();
        self.fields.encode(&mut header, 0);
        header.set_value(0x0c, self.details.len() as u32);

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        header.write(w, IMAGE_NAME_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

header_fields! {
    pub struct ImageItemFields {
        image_id: u32 = 0x10 since 0,
        /// `DatabaseId` of the track this cover belongs to; zero for photos
        song_dbid: u64 = 0x14 since 0,
        rating: u32 = 0x20 since 0,
        original_date: u32 = 0x28 since 0,
        digitized_date: u32 = 0x2c since 0,
        source_size: u32 = 0x30 since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageItemRecord {
    header: RawHeader,
    pub fields: ImageItemFields,
    pub details: Vec<ArtworkDetail>,
    trailing: Vec<u8>,
}

impl ImageItemRecord {
    pub fn new(endian: Endian, image_id: u32, song_dbid: u64) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::ImageItem), endian),
            fields: ImageItemFields {
                image_id,
                song_dbid,
                ..Default::default()
            },
            details: Vec::new(),
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn image_id(&self) -> u32 {
        self.fields.image_id
    }

    /// Every rendition, thumbnails and full resolution alike
    pub fn names(&self) -> impl Iterator<Item = &ImageNameRecord> {
        self.details.iter().filter_map(|d| d.image_name())
    }

    pub fn names_mut(&mut self) -> impl Iterator<Item = &mut ImageNameRecord> {
        self.details.iter_mut().filter_map(|d| d.image_name_mut())
    }

    pub fn thumbnail(&self, format_id: u32) -> Option<&ImageNameRecord> {
        self.details.iter().find_map(|d| match &d.body {
            ArtworkDetailBody::Thumbnail(name) if name.format_id() == format_id => Some(name),
            _ => None,
        })
    }

    pub fn full_resolution(&self) -> Option<&ImageNameRecord> {
        self.details.iter().find_map(|d| match &d.body {
            ArtworkDetailBody::FullResolution(name) => Some(name),
            _ => None,
        })
    }

    pub fn push_thumbnail(&mut self, name: ImageNameRecord) {
        let endian = self.endian();
        self.details
            .push(ArtworkDetail::new(endian, ArtworkDetailBody::Thumbnail(name)));
    }

    pub fn set_full_resolution(&mut self, name: ImageNameRecord) {
        self.details
            .retain(|d| !matches!(d.body, ArtworkDetailBody::FullResolution(_)));
        let endian = self.endian();
        self.details
            .push(ArtworkDetail::new(endian, ArtworkDetailBody::FullResolution(name)));
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, IMAGE_ITEM_TAG)?;
        let fields = ImageItemFields::decode(&header, 0);
        let child_count: u32 = header.value(0x0c);

        let mut details = Vec::new();
        for _ in 0..child_count {
            details.push(ArtworkDetail::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut header = self.header.clone();
        self.fields.encode(&mut header, 0);
        header.set_value(0x0c, self.details.len() as u32);

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        header.write(w, IMAGE_ITEM_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageListRecord {
    header: RawHeader,
    pub images: Vec<ImageItemRecord>,
}

impl ImageListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::List), endian),
            images: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, IMAGE_LIST_TAG)?;
        let mut images = Vec::new();
        for _ in 0..count {
            images.push(ImageItemRecord::read(r)?);
        }
        Ok(Self { header, images })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        self.header.write(w, IMAGE_LIST_TAG, self.images.len() as u32);
        for image in &self.images {
            image.write(w);
        }
    }
}
