//! Root record (`mhbd`) of the track database

use super::album::AlbumListRecord;
use super::dataset::{DataSet, DataSetKind, DataSetRecord};
use super::playlist::PlaylistListRecord;
use super::track::TrackListRecord;
use super::version::{self, header_len, RecordKind, MAX_VERSION};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const DATABASE_TAG: Tag = Tag::new(b"mhbd");

/// Where the signature lives in the root header
pub const SIGNATURE_OFFSET: usize = 0x58;
pub const SIGNATURE_LEN: usize = 20;

/// Two ASCII letters, stored as bytes regardless of byte order
const LANGUAGE_OFFSET: usize = 0x46;

/// Hashing scheme stored at 0x30 once a signature is embedded
pub const HASHING_SCHEME_SHA: u16 = 1;

header_fields! {
    pub struct DatabaseFields {
        unknown1: u32 = 0x0c since 1,
        database_id: u64 = 0x18 since 1,
        /// 1 for Mac-formatted devices, 2 for Windows
        platform: u16 = 0x20 since 1,
        hashing_scheme: u16 = 0x30 since version::SIGNED,
        library_persistent_id: u64 = 0x48 since version::ALBUM_LIST,
        timezone_offset: i32 = 0x6c since version::ALBUM_LIST,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseRecord {
    header: RawHeader,
    pub version: u32,
    pub fields: DatabaseFields,
    pub datasets: Vec<DataSetRecord>,
    trailing: Vec<u8>,
}

/// Work out the byte order from the root tag, which big-endian files store
/// reversed
pub fn detect_endian(bytes: &[u8]) -> Result<Endian, FormatError> {
    let found = bytes
        .get(..4)
        .ok_or(FormatError::Truncated {
            offset: 0,
            wanted: 4,
            available: bytes.len(),
        })?;
    if found == DATABASE_TAG.as_bytes() {
        Ok(Endian::Little)
    } else if found == DATABASE_TAG.reversed().as_bytes() {
        Ok(Endian::Big)
    } else {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(found);
        Err(FormatError::TagMismatch {
            expected: DATABASE_TAG,
            found: Tag(tag),
            offset: 0,
        })
    }
}

impl DatabaseRecord {
    /// An empty database carrying the library and playlist sets
    pub fn new(endian: Endian, version: u32) -> Self {
        let mut header = RawHeader::zeroed(header_len(RecordKind::Database, version), endian);
        header.set_bytes(LANGUAGE_OFFSET, b"en");
        Self {
            header,
            version,
            fields: DatabaseFields {
                unknown1: 1,
                platform: 1,
                ..Default::default()
            },
            datasets: vec![
                DataSetRecord::new(endian, DataSet::Library(TrackListRecord::new(endian))),
                DataSetRecord::new(endian, DataSet::Playlists(PlaylistListRecord::new(endian))),
            ],
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        let endian = detect_endian(bytes)?;
        let mut r = ByteReader::new(bytes, endian);
        let (header, mut body) = RawHeader::read_with_body(&mut r, DATABASE_TAG)?;

        let version: u32 = header.value(0x10);
        if version > MAX_VERSION {
            return Err(FormatError::UnsupportedVersion {
                version,
                max: MAX_VERSION,
            });
        }
        let fields = DatabaseFields::decode(&header, version);
        let child_count: u32 = header.value(0x14);

        let mut datasets = Vec::new();
        for _ in 0..child_count {
            datasets.push(DataSetRecord::read(&mut body, version)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();
        log::debug!(
            "Parsed database v{} ({:?}-endian) with {} data sets",
            version,
            endian,
            datasets.len()
        );

        Ok(Self {
            header,
            version,
            fields,
            datasets,
            trailing,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::Database, self.version));
        self.fields.encode(&mut header, self.version);
        header.set_value(0x10, self.version);
        header.set_value(0x14, self.datasets.len() as u32);

        let endian = self.endian();
        let mut body = ByteWriter::new(endian);
        for set in &self.datasets {
            set.write(&mut body, self.version);
        }
        body.write_bytes(&self.trailing);

        let mut w = ByteWriter::new(endian);
        header.write(&mut w, DATABASE_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
        w.into_bytes()
    }

    pub fn language(&self) -> String {
        self.header
            .bytes_at(LANGUAGE_OFFSET, 2)
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    pub fn dataset(&self, kind: DataSetKind) -> Option<&DataSet> {
        self.datasets
            .iter()
            .find(|s| s.kind() == Some(kind))
            .map(|s| &s.payload)
    }

    pub fn dataset_mut(&mut self, kind: DataSetKind) -> Option<&mut DataSet> {
        self.datasets
            .iter_mut()
            .find(|s| s.kind() == Some(kind))
            .map(|s| &mut s.payload)
    }

    /// Replace the payload of `kind`, appending a new set if none exists
    pub fn set_dataset(&mut self, payload: DataSet) {
        let kind = payload.kind();
        match self.datasets.iter_mut().find(|s| s.kind() == kind) {
            Some(set) => set.payload = payload,
            None => {
                let endian = self.endian();
                self.datasets.push(DataSetRecord::new(endian, payload));
            }
        }
    }

    pub fn remove_dataset(&mut self, kind: DataSetKind) {
        self.datasets.retain(|s| s.kind() != Some(kind));
    }

    pub fn track_list(&self) -> Option<&TrackListRecord> {
        match self.dataset(DataSetKind::Library) {
            Some(DataSet::Library(list)) => Some(list),
            _ => None,
        }
    }

    /// The library track list, created when the file has none
    pub fn track_list_mut(&mut self) -> &mut TrackListRecord {
        if self.track_list().is_none() {
            let endian = self.endian();
            self.set_dataset(DataSet::Library(TrackListRecord::new(endian)));
        }
        let set = self
            .datasets
            .iter_mut()
            .find(|s| s.kind() == Some(DataSetKind::Library));
        match set.map(|s| &mut s.payload) {
            Some(DataSet::Library(list)) => list,
            _ => unreachable!("library data set inserted above"),
        }
    }

    pub fn playlist_list(&self) -> Option<&PlaylistListRecord> {
        match self.dataset(DataSetKind::Playlists) {
            Some(DataSet::Playlists(list)) => Some(list),
            _ => None,
        }
    }

    pub fn playlist_list_mut(&mut self) -> &mut PlaylistListRecord {
        if self.playlist_list().is_none() {
            let endian = self.endian();
            self.set_dataset(DataSet::Playlists(PlaylistListRecord::new(endian)));
        }
        let set = self
            .datasets
            .iter_mut()
            .find(|s| s.kind() == Some(DataSetKind::Playlists));
        match set.map(|s| &mut s.payload) {
            Some(DataSet::Playlists(list)) => list,
            _ => unreachable!("playlist data set inserted above"),
        }
    }

    pub fn podcast_list(&self) -> Option<&PlaylistListRecord> {
        match self.dataset(DataSetKind::Podcasts) {
            Some(DataSet::Podcasts(list)) => Some(list),
            _ => None,
        }
    }

    pub fn album_list(&self) -> Option<&AlbumListRecord> {
        match self.dataset(DataSetKind::AlbumList) {
            Some(DataSet::AlbumList(list)) => Some(list),
            _ => None,
        }
    }
}
