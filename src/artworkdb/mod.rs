//! Record tree of the artwork and photo databases (`ArtworkDB`,
//! `Photo Database`)
//!
//! Same record framing as the track database (tag, header length, total
//! length or child count) with a single header layout per record kind, so
//! header fields are declared `since 0`.

pub mod album;
pub mod database;
pub mod detail;
pub mod file;
pub mod image;

pub use album::{PhotoAlbumItemRecord, PhotoAlbumListRecord, PhotoAlbumRecord};
pub use database::{ArtworkDataSet, ArtworkDataSetRecord, ArtworkDatabaseRecord};
pub use detail::{ArtworkDetail, ArtworkDetailBody};
pub use file::{FileInfoRecord, FileListRecord};
pub use image::{ImageItemRecord, ImageListRecord, ImageNameFields, ImageNameRecord};

/// Image IDs handed out by a fresh database start here
pub const FIRST_IMAGE_ID: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkRecordKind {
    Database,
    DataSet,
    List,
    ImageItem,
    ImageName,
    Detail,
    Album,
    AlbumItem,
    FileInfo,
}

pub fn header_len(kind: ArtworkRecordKind) -> u32 {
    match kind {
        ArtworkRecordKind::Database => 0x84,
        ArtworkRecordKind::DataSet => 0x60,
        ArtworkRecordKind::List => crate::codec::LIST_HEADER_LEN,
        ArtworkRecordKind::ImageItem => 0x98,
        ArtworkRecordKind::ImageName => 0x4c,
        ArtworkRecordKind::Detail => 0x18,
        ArtworkRecordKind::Album => 0x94,
        ArtworkRecordKind::AlbumItem => 0x28,
        ArtworkRecordKind::FileInfo => 0x7c,
    }
}
