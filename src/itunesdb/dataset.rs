//! Data set records (`mhsd`): one typed payload each

use super::album::AlbumListRecord;
use super::playlist::PlaylistListRecord;
use super::track::TrackListRecord;
use super::version::{header_len, RecordKind};
use crate::codec::{ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const DATASET_TAG: Tag = Tag::new(b"mhsd");

/// On-disk index of a data set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSetKind {
    Library = 1,
    Playlists = 2,
    Podcasts = 3,
    AlbumList = 4,
}

impl DataSetKind {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(Self::Library),
            2 => Some(Self::Playlists),
            3 => Some(Self::Podcasts),
            4 => Some(Self::AlbumList),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataSet {
    Library(TrackListRecord),
    Playlists(PlaylistListRecord),
    /// Same layout as the playlist set, with podcast items grouped by show
    Podcasts(PlaylistListRecord),
    AlbumList(AlbumListRecord),
    Unrecognized { type_code: u32, data: Vec<u8> },
}

impl DataSet {
    pub fn type_code(&self) -> u32 {
        match self {
            DataSet::Library(_) => DataSetKind::Library as u32,
            DataSet::Playlists(_) => DataSetKind::Playlists as u32,
            DataSet::Podcasts(_) => DataSetKind::Podcasts as u32,
            DataSet::AlbumList(_) => DataSetKind::AlbumList as u32,
            DataSet::Unrecognized { type_code, .. } => *type_code,
        }
    }

    pub fn kind(&self) -> Option<DataSetKind> {
        DataSetKind::from_code(self.type_code())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataSetRecord {
    header: RawHeader,
    pub payload: DataSet,
    trailing: Vec<u8>,
}

impl DataSetRecord {
    pub fn new(endian: Endian, payload: DataSet) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::DataSet, 1), endian),
            payload,
            trailing: Vec::new(),
        }
    }

    pub fn kind(&self) -> Option<DataSetKind> {
        self.payload.kind()
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, DATASET_TAG)?;
        let type_code: u32 = header.value(0x0c);

        let payload = match DataSetKind::from_code(type_code) {
            Some(DataSetKind::Library) => DataSet::Library(TrackListRecord::read(&mut body, version)?),
            Some(DataSetKind::Playlists) => {
                DataSet::Playlists(PlaylistListRecord::read(&mut body, version)?)
            }
            Some(DataSetKind::Podcasts) => {
                DataSet::Podcasts(PlaylistListRecord::read(&mut body, version)?)
            }
            Some(DataSetKind::AlbumList) => {
                DataSet::AlbumList(AlbumListRecord::read(&mut body, version)?)
            }
            None => {
                log::debug!("Keeping unrecognized data set type {} verbatim", type_code);
                DataSet::Unrecognized {
                    type_code,
                    data: body.read_bytes(body.remaining())?.to_vec(),
                }
            }
        };
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            payload,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::DataSet, version));
        header.set_value(0x0c, self.payload.type_code());

        let mut body = ByteWriter::new(w.endian());
        match &self.payload {
            DataSet::Library(list) => list.write(&mut body, version),
            DataSet::Playlists(list) | DataSet::Podcasts(list) => list.write(&mut body, version),
            DataSet::AlbumList(list) => list.write(&mut body, version),
            DataSet::Unrecognized { data, .. } => body.write_bytes(data),
        }
        body.write_bytes(&self.trailing);

        header.write(w, DATASET_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_set_is_kept() {
        let set = DataSetRecord::new(
            Endian::Little,
            DataSet::Unrecognized {
                type_code: 9,
                data: vec![0xde, 0xad, 0xbe, 0xef],
            },
        );
        let mut w = ByteWriter::new(Endian::Little);
        set.write(&mut w, 25);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 0x60 + 4);

        let parsed = DataSetRecord::read(&mut ByteReader::new(&bytes, Endian::Little), 25).unwrap();
        assert_eq!(parsed, set);
        assert_eq!(parsed.kind(), None);
    }

    #[test]
    fn test_podcast_set_uses_playlist_layout() {
        let set = DataSetRecord::new(
            Endian::Big,
            DataSet::Podcasts(PlaylistListRecord::new(Endian::Big)),
        );
        let mut w = ByteWriter::new(Endian::Big);
        set.write(&mut w, 20);
        let bytes = w.into_bytes();
        assert_eq!(&bytes[0x60..0x64], b"plhm");

        let parsed = DataSetRecord::read(&mut ByteReader::new(&bytes, Endian::Big), 20).unwrap();
        assert_eq!(parsed.kind(), Some(DataSetKind::Podcasts));
    }
}
