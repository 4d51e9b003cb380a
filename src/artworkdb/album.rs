//! Photo album list (`mhla`), album (`mhba`) and album item (`mhia`) records

use super::detail::{ArtworkDetail, ArtworkDetailBody};
use super::{header_len, ArtworkRecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const PHOTO_ALBUM_LIST_TAG: Tag = Tag::new(b"mhla");
pub const PHOTO_ALBUM_TAG: Tag = Tag::new(b"mhba");
pub const PHOTO_ALBUM_ITEM_TAG: Tag = Tag::new(b"mhia");

/// `album_type` of the photo library album holding every photo
pub const ALBUM_TYPE_MASTER: u8 = 1;
pub const ALBUM_TYPE_NORMAL: u8 = 2;

header_fields! {
    pub struct PhotoAlbumItemFields {
        image_id: u32 = 0x10 since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAlbumItemRecord {
    header: RawHeader,
    pub fields: PhotoAlbumItemFields,
    trailing: Vec<u8>,
}

impl PhotoAlbumItemRecord {
    pub fn new(endian: Endian, image_id: u32) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::AlbumItem), endian),
            fields: PhotoAlbumItemFields { image_id },
            trailing: Vec::new(),
        }
    }

    pub fn image_id(&self) -> u32 {
        self.fields.image_id
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, PHOTO_ALBUM_ITEM_TAG)?;
        let fields = PhotoAlbumItemFields::decode(&header, 0);
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
        header.write(
            w,
            PHOTO_ALBUM_ITEM_TAG,
            (header.len() + self.trailing.len()) as u32,
        );
        w.write_bytes(&self.trailing);
    }
}

header_fields! {
    pub struct PhotoAlbumFields {
        album_id: u32 = 0x14 since 0,
        album_type: u8 = 0x1e since 0,
        play_music: u8 = 0x1f since 0,
        repeat: u8 = 0x20 since 0,
        random: u8 = 0x21 since 0,
        show_titles: u8 = 0x22 since 0,
        transition_direction: u8 = 0x23 since 0,
        slide_duration: u32 = 0x24 since 0,
        transition_duration: u32 = 0x28 since 0,
        song_dbid: u64 = 0x34 since 0,
        previous_album_id: u32 = 0x3c since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAlbumRecord {
    header: RawHeader,
    pub fields: PhotoAlbumFields,
    pub details: Vec<ArtworkDetail>,
    pub items: Vec<PhotoAlbumItemRecord>,
    trailing: Vec<u8>,
}

impl PhotoAlbumRecord {
    pub fn new(endian: Endian, album_id: u32, name: &str, album_type: u8) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::Album), endian),
            fields: PhotoAlbumFields {
                album_id,
                album_type,
                ..Default::default()
            },
            details: vec![ArtworkDetail::new(
                endian,
                ArtworkDetailBody::AlbumName(name.to_string()),
            )],
            items: Vec::new(),
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn album_id(&self) -> u32 {
        self.fields.album_id
    }

    pub fn is_master(&self) -> bool {
        self.fields.album_type == ALBUM_TYPE_MASTER
    }

    pub fn name(&self) -> &str {
        self.details
            .iter()
            .find_map(|d| match &d.body {
                ArtworkDetailBody::AlbumName(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) {
        for detail in &mut self.details {
            if let ArtworkDetailBody::AlbumName(current) = &mut detail.body {
                *current = name.to_string();
                return;
            }
        }
        let endian = self.endian();
        self.details.push(ArtworkDetail::new(
            endian,
            ArtworkDetailBody::AlbumName(name.to_string()),
        ));
    }

    pub fn image_ids(&self) -> Vec<u32> {
        self.items.iter().map(|i| i.image_id()).collect()
    }

    pub fn contains(&self, image_id: u32) -> bool {
        self.items.iter().any(|i| i.image_id() == image_id)
    }

    pub fn push_image(&mut self, image_id: u32) {
        let endian = self.endian();
        self.items.push(PhotoAlbumItemRecord::new(endian, image_id));
    }

    pub fn remove_image(&mut self, image_id: u32) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.image_id() != image_id);
        self.items.len() != before
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, PHOTO_ALBUM_TAG)?;
        let fields = PhotoAlbumFields::decode(&header, 0);
        let detail_count: u32 = header.value(0x0c);
        let item_count: u32 = header.value(0x10);

        let mut details = Vec::new();
        for _ in 0..detail_count {
            details.push(ArtworkDetail::read(&mut body)?);
        }
        let mut items = Vec::new();
        for _ in 0..item_count {
            items.push(PhotoAlbumItemRecord::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            items,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut header = self.header.clone();
        self.fields.encode(&mut header, 0);
        header.set_value(0x0c, self.details.len() as u32);
        header.set_value(0x10, self.items.len() as u32);

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        for item in &self.items {
            item.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        header.write(w, PHOTO_ALBUM_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoAlbumListRecord {
    header: RawHeader,
    pub albums: Vec<PhotoAlbumRecord>,
}

impl PhotoAlbumListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::List), endian),
            albums: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, PHOTO_ALBUM_LIST_TAG)?;
        let mut albums = Vec::new();
        for _ in 0..count {
            albums.push(PhotoAlbumRecord::read(r)?);
        }
        Ok(Self { header, albums })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        self.header
            .write(w, PHOTO_ALBUM_LIST_TAG, self.albums.len() as u32);
        for album in &self.albums {
            album.write(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_album_roundtrip() {
        let mut album = PhotoAlbumRecord::new(Endian::Little, 7, "Summer 2007", ALBUM_TYPE_NORMAL);
        album.push_image(100);
        album.push_image(101);

        let mut list = PhotoAlbumListRecord::new(Endian::Little);
        list.albums.push(album);

        let mut w = ByteWriter::new(Endian::Little);
        list.write(&mut w);
        let bytes = w.into_bytes();

        let mut r = ByteReader::new(&bytes, Endian::Little);
        let parsed = PhotoAlbumListRecord::read(&mut r).unwrap();
        assert!(r.is_empty());
        let album = &parsed.albums[0];
        assert_eq!(album.name(), "Summer 2007");
        assert_eq!(album.image_ids(), vec![100, 101]);
        assert!(!album.is_master());
    }

    #[test]
    fn test_remove_image() {
        let mut album = PhotoAlbumRecord::new(Endian::Little, 1, "Library", ALBUM_TYPE_MASTER);
        album.push_image(5);
        assert!(album.remove_image(5));
        assert!(!album.remove_image(5));
        assert!(album.items.is_empty());
    }
}
