//! Error types for the database engine

use crate::codec::Tag;
use thiserror::Error;

/// Structural problems found while parsing a database file.
///
/// Every variant is fatal to the parse: a database that fails with a
/// `FormatError` is never partially loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("expected tag {expected} at offset {offset:#x}, found {found}")]
    TagMismatch {
        expected: Tag,
        found: Tag,
        offset: usize,
    },

    #[error("database version {version} is newer than the supported maximum {max}")]
    UnsupportedVersion { version: u32, max: u32 },

    #[error("read of {wanted} bytes at offset {offset:#x} runs past the end ({available} available)")]
    Truncated {
        offset: usize,
        wanted: usize,
        available: usize,
    },

    #[error("{tag} record at offset {offset:#x} declares invalid length {length}")]
    InvalidLength { tag: Tag, offset: usize, length: u32 },

    #[error("malformed record: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Insufficient space on device: {required} bytes required, {available} available")]
    InsufficientSpace { required: u64, available: u64 },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database write failed: {0}")]
    Write(#[source] Box<Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary format error: {0}")]
    Binary(String),

    #[error("Image error: {0}")]
    Image(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Error::Binary(e.to_string())
    }
}

impl From<image::ImageError> for Error {
    fn from(e: image::ImageError) -> Self {
        Error::Image(e.to_string())
    }
}

impl From<lofty::error::LoftyError> for Error {
    fn from(e: lofty::error::LoftyError) -> Self {
        Error::Metadata(e.to_string())
    }
}
