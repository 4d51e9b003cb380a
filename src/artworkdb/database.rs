//! Root (`mhfd`) and data set (`mhsd`) records of the artwork and photo
//! databases

use super::album::{PhotoAlbumListRecord, PhotoAlbumRecord};
use super::file::FileListRecord;
use super::image::{ImageItemRecord, ImageListRecord};
use super::{header_len, ArtworkRecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const ARTWORK_DATABASE_TAG: Tag = Tag::new(b"mhfd");
pub const ARTWORK_DATASET_TAG: Tag = Tag::new(b"mhsd");

/// Layout version written into fresh databases
const DEFAULT_VERSION: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub enum ArtworkDataSet {
    Images(ImageListRecord),
    Albums(PhotoAlbumListRecord),
    Files(FileListRecord),
    Unrecognized { index: u16, data: Vec<u8> },
}

impl ArtworkDataSet {
    pub fn index(&self) -> u16 {
        match self {
            ArtworkDataSet::Images(_) => 1,
            ArtworkDataSet::Albums(_) => 2,
            ArtworkDataSet::Files(_) => 3,
            ArtworkDataSet::Unrecognized { index, .. } => *index,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkDataSetRecord {
    header: RawHeader,
    pub payload: ArtworkDataSet,
    trailing: Vec<u8>,
}

impl ArtworkDataSetRecord {
    pub fn new(endian: Endian, payload: ArtworkDataSet) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::DataSet), endian),
            payload,
            trailing: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, ARTWORK_DATASET_TAG)?;
        let index: u16 = header.value(0x0c);
        let payload = match index {
            1 => ArtworkDataSet::Images(ImageListRecord::read(&mut body)?),
            2 => ArtworkDataSet::Albums(PhotoAlbumListRecord::read(&mut body)?),
            3 => ArtworkDataSet::Files(FileListRecord::read(&mut body)?),
            _ => ArtworkDataSet::Unrecognized {
                index,
                data: body.read_bytes(body.remaining())?.to_vec(),
            },
        };
        let trailing = body.read_bytes(body.remaining())?.to_vec();
        Ok(Self {
            header,
            payload,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut header = self.header.clone();
        header.set_value(0x0c, self.payload.index());

        let mut body = ByteWriter::new(w.endian());
        match &self.payload {
            ArtworkDataSet::Images(list) => list.write(&mut body),
            ArtworkDataSet::Albums(list) => list.write(&mut body),
            ArtworkDataSet::Files(list) => list.write(&mut body),
            ArtworkDataSet::Unrecognized { data, .. } => body.write_bytes(data),
        }
        body.write_bytes(&self.trailing);

        header.write(w, ARTWORK_DATASET_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

header_fields! {
    pub struct ArtworkDatabaseFields {
        unknown1: u32 = 0x0c since 0,
        version: u32 = 0x10 since 0,
        next_image_id: u32 = 0x1c since 0,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtworkDatabaseRecord {
    header: RawHeader,
    pub fields: ArtworkDatabaseFields,
    pub datasets: Vec<ArtworkDataSetRecord>,
    trailing: Vec<u8>,
}

impl ArtworkDatabaseRecord {
    /// An empty database with image, album and file sets
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(ArtworkRecordKind::Database), endian),
            fields: ArtworkDatabaseFields {
                version: DEFAULT_VERSION,
                next_image_id: super::FIRST_IMAGE_ID,
                ..Default::default()
            },
            datasets: vec![
                ArtworkDataSetRecord::new(endian, ArtworkDataSet::Images(ImageListRecord::new(endian))),
                ArtworkDataSetRecord::new(
                    endian,
                    ArtworkDataSet::Albums(PhotoAlbumListRecord::new(endian)),
                ),
                ArtworkDataSetRecord::new(endian, ArtworkDataSet::Files(FileListRecord::new(endian))),
            ],
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn from_bytes(bytes: &[u8], endian: Endian) -> Result<Self, FormatError> {
        let mut r = ByteReader::new(bytes, endian);
        let (header, mut body) = RawHeader::read_with_body(&mut r, ARTWORK_DATABASE_TAG)?;
        let fields = ArtworkDatabaseFields::decode(&header, 0);
        let child_count: u32 = header.value(0x14);

        let mut datasets = Vec::new();
        for _ in 0..child_count {
            datasets.push(ArtworkDataSetRecord::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            datasets,
            trailing,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut header = self.header.clone();
        self.fields.encode(&mut header, 0);
        header.set_value(0x14, self.datasets.len() as u32);

        let endian = self.endian();
        let mut body = ByteWriter::new(endian);
        for set in &self.datasets {
            set.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        let mut w = ByteWriter::new(endian);
        header.write(&mut w, ARTWORK_DATABASE_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
        w.into_bytes()
    }

    fn payload_mut(&mut self, index: u16) -> Option<&mut ArtworkDataSet> {
        self.datasets
            .iter_mut()
            .map(|s| &mut s.payload)
            .find(|p| p.index() == index)
    }

    fn ensure(&mut self, payload: ArtworkDataSet) {
        let index = payload.index();
        if !self.datasets.iter().any(|s| s.payload.index() == index) {
            let endian = self.endian();
            self.datasets.push(ArtworkDataSetRecord::new(endian, payload));
            self.datasets.sort_by_key(|s| s.payload.index());
        }
    }

    pub fn images(&self) -> &[ImageItemRecord] {
        self.datasets
            .iter()
            .find_map(|s| match &s.payload {
                ArtworkDataSet::Images(list) => Some(list.images.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn image_list_mut(&mut self) -> &mut ImageListRecord {
        let endian = self.endian();
        self.ensure(ArtworkDataSet::Images(ImageListRecord::new(endian)));
        match self.payload_mut(1) {
            Some(ArtworkDataSet::Images(list)) => list,
            _ => unreachable!("image set ensured above"),
        }
    }

    pub fn albums(&self) -> &[PhotoAlbumRecord] {
        self.datasets
            .iter()
            .find_map(|s| match &s.payload {
                ArtworkDataSet::Albums(list) => Some(list.albums.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn album_list_mut(&mut self) -> &mut PhotoAlbumListRecord {
        let endian = self.endian();
        self.ensure(ArtworkDataSet::Albums(PhotoAlbumListRecord::new(endian)));
        match self.payload_mut(2) {
            Some(ArtworkDataSet::Albums(list)) => list,
            _ => unreachable!("album set ensured above"),
        }
    }

    pub fn file_list_mut(&mut self) -> &mut FileListRecord {
        let endian = self.endian();
        self.ensure(ArtworkDataSet::Files(FileListRecord::new(endian)));
        match self.payload_mut(3) {
            Some(ArtworkDataSet::Files(list)) => list,
            _ => unreachable!("file set ensured above"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artworkdb::{ImageNameFields, ImageNameRecord};

    #[test]
    fn test_database_roundtrip() {
        let mut db = ArtworkDatabaseRecord::new(Endian::Little);
        let mut image = ImageItemRecord::new(Endian::Little, 100, 42);
        image.push_thumbnail(ImageNameRecord::new(
            Endian::Little,
            ImageNameFields {
                format_id: 1028,
                size: 20000,
                ..Default::default()
            },
            ":F1028_1.ithmb",
        ));
        db.image_list_mut().images.push(image);
        db.album_list_mut()
            .albums
            .push(PhotoAlbumRecord::new(Endian::Little, 1, "Library", 1));

        let bytes = db.to_bytes();
        assert_eq!(&bytes[..4], b"mhfd");
        assert_eq!(u32::from_le_bytes(bytes[0x14..0x18].try_into().unwrap()), 3);

        let parsed = ArtworkDatabaseRecord::from_bytes(&bytes, Endian::Little).unwrap();
        assert_eq!(parsed.images().len(), 1);
        assert_eq!(parsed.albums()[0].name(), "Library");
        assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn test_missing_sets_are_created_in_order() {
        let mut db = ArtworkDatabaseRecord::new(Endian::Little);
        db.datasets.clear();
        db.file_list_mut();
        db.image_list_mut();
        let indices: Vec<_> = db.datasets.iter().map(|s| s.payload.index()).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
