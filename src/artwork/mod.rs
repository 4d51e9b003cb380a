//! Cover art and photo management
//!
//! Pixels live in per-format thumbnail files; the artwork database records
//! where each image's thumbnails sit in those files.

pub mod database;
pub mod packer;
pub mod thumbnail;

pub use database::{ArtworkDatabase, ArtworkKind, PHOTO_LIBRARY_NAME};
pub use packer::{pack, BlobFile, FreedSlot, PendingBlob, StoredBlob};
pub use thumbnail::{extract_embedded_artwork, render, RenderedThumbnail, ThumbnailFormat};
