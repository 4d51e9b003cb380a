//! Album list (`mhla`) and album item (`mhia`) records, present from v20

use super::detail::{DetailKind, DetailRecord};
use super::version::{header_len, RecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const ALBUM_LIST_TAG: Tag = Tag::new(b"mhla");
pub const ALBUM_ITEM_TAG: Tag = Tag::new(b"mhia");

header_fields! {
    pub struct AlbumItemFields {
        album_id: u32 = 0x10 since 1,
        sql_id: u64 = 0x14 since 1,
        kind: u32 = 0x1c since 1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumItemRecord {
    header: RawHeader,
    pub fields: AlbumItemFields,
    pub details: Vec<DetailRecord>,
    trailing: Vec<u8>,
}

impl AlbumItemRecord {
    pub fn new(endian: Endian, album_id: u32, album: &str, artist: &str) -> Self {
        let mut record = Self {
            header: RawHeader::zeroed(header_len(RecordKind::AlbumItem, 1), endian),
            fields: AlbumItemFields {
                album_id,
                kind: 2,
                ..Default::default()
            },
            details: Vec::new(),
            trailing: Vec::new(),
        };
        if !album.is_empty() {
            record
                .details
                .push(DetailRecord::string(endian, DetailKind::AlbumListAlbum, album));
        }
        if !artist.is_empty() {
            record
                .details
                .push(DetailRecord::string(endian, DetailKind::AlbumListArtist, artist));
        }
        record
    }

    pub fn album_id(&self) -> u32 {
        self.fields.album_id
    }

    fn string(&self, kind: DetailKind) -> &str {
        self.details
            .iter()
            .find(|d| d.kind() == Some(kind))
            .and_then(|d| d.text())
            .unwrap_or_default()
    }

    pub fn album(&self) -> &str {
        self.string(DetailKind::AlbumListAlbum)
    }

    pub fn artist(&self) -> &str {
        self.string(DetailKind::AlbumListArtist)
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, ALBUM_ITEM_TAG)?;
        let fields = AlbumItemFields::decode(&header, version);
        let detail_count: u32 = header.value(0x0c);

        let mut details = Vec::new();
        for _ in 0..detail_count {
            details.push(DetailRecord::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::AlbumItem, version));
        self.fields.encode(&mut header, version);
        header.set_value(0x0c, self.details.len() as u32);

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        header.write(w, ALBUM_ITEM_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumListRecord {
    header: RawHeader,
    pub albums: Vec<AlbumItemRecord>,
}

impl AlbumListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::List, 1), endian),
            albums: Vec::new(),
        }
    }

    pub fn find(&self, album: &str, artist: &str) -> Option<&AlbumItemRecord> {
        self.albums
            .iter()
            .find(|a| a.album() == album && a.artist() == artist)
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, ALBUM_LIST_TAG)?;
        let mut albums = Vec::new();
        for _ in 0..count {
            albums.push(AlbumItemRecord::read(r, version)?);
        }
        Ok(Self { header, albums })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        self.header
            .write(w, ALBUM_LIST_TAG, self.albums.len() as u32);
        for album in &self.albums {
            album.write(w, version);
        }
    }
}
