//! Cover art and photo databases with their thumbnail files

use super::packer::{self, FreedSlot, PendingBlob, StoredBlob};
use super::thumbnail::{decode_image, render, ThumbnailFormat};
use crate::artworkdb::album::{ALBUM_TYPE_MASTER, ALBUM_TYPE_NORMAL};
use crate::artworkdb::{
    ArtworkDatabaseRecord, ArtworkDetailBody, FileInfoRecord, ImageItemRecord, ImageNameFields, ImageNameRecord,
    PhotoAlbumRecord,
};
use crate::codec::{mac_now, Endian};
use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

/// Name of the photo library album every photo belongs to
pub const PHOTO_LIBRARY_NAME: &str = "Photo Library";

const FULL_RESOLUTION_DIR: &str = "Full Resolution";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkKind {
    /// Track covers, linked to tracks by `DatabaseId`
    Covers,
    /// Photos organised into albums
    Photos,
}

/// Thumbnail awaiting a slot in its format's file
#[derive(Debug)]
struct PendingThumbnail {
    image_id: u32,
    format_id: u32,
    data: Vec<u8>,
}

pub struct ArtworkDatabase {
    kind: ArtworkKind,
    db_path: PathBuf,
    thumbs_dir: PathBuf,
    formats: Vec<ThumbnailFormat>,
    record: ArtworkDatabaseRecord,
    pending: Vec<PendingThumbnail>,
    /// `(image_id, format_id)` blobs to overwrite in place
    rewrites: HashMap<(u32, u32), Vec<u8>>,
    freed: HashMap<u32, Vec<FreedSlot>>,
    /// Full-resolution photo files to write, relative to the thumbs dir
    full_res_writes: Vec<(PathBuf, Vec<u8>)>,
    full_res_deletes: Vec<PathBuf>,
}

impl ArtworkDatabase {
    /// Open the database at `db_path`, or start an empty one if it does not
    /// exist. Thumbnail files live in `thumbs_dir`.
    pub fn open(
        kind: ArtworkKind,
        db_path: impl Into<PathBuf>,
        thumbs_dir: impl Into<PathBuf>,
        formats: Vec<ThumbnailFormat>,
        endian: Endian,
    ) -> Result<Self> {
        let db_path = db_path.into();
        let record = if db_path.exists() {
            let bytes = fs::read(&db_path)?;
            let record = ArtworkDatabaseRecord::from_bytes(&bytes, endian)?;
            log::info!(
                "Loaded {} images from {}",
                record.images().len(),
                db_path.display()
            );
            record
        } else {
            log::debug!("No artwork database at {}, starting empty", db_path.display());
            ArtworkDatabaseRecord::new(endian)
        };

        let mut db = Self {
            kind,
            db_path,
            thumbs_dir: thumbs_dir.into(),
            formats,
            record,
            pending: Vec::new(),
            rewrites: HashMap::new(),
            freed: HashMap::new(),
            full_res_writes: Vec::new(),
            full_res_deletes: Vec::new(),
        };
        if kind == ArtworkKind::Photos && db.master_album_index().is_none() {
            db.create_master_album();
        }
        Ok(db)
    }

    pub fn kind(&self) -> ArtworkKind {
        self.kind
    }

    pub fn formats(&self) -> &[ThumbnailFormat] {
        &self.formats
    }

    pub fn images(&self) -> &[ImageItemRecord] {
        self.record.images()
    }

    pub fn image(&self, image_id: u32) -> Option<&ImageItemRecord> {
        self.images().iter().find(|i| i.image_id() == image_id)
    }

    pub fn image_for_song(&self, song_dbid: u64) -> Option<&ImageItemRecord> {
        self.images()
            .iter()
            .find(|i| song_dbid != 0 && i.fields.song_dbid == song_dbid)
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty()
            || !self.rewrites.is_empty()
            || !self.freed.is_empty()
            || !self.full_res_writes.is_empty()
            || !self.full_res_deletes.is_empty()
    }

    fn allocate_image_id(&mut self) -> u32 {
        let id = self.record.fields.next_image_id.max(crate::artworkdb::FIRST_IMAGE_ID);
        self.record.fields.next_image_id = id + 1;
        id
    }

    fn thumbnail_file_name(&self, format: &ThumbnailFormat) -> String {
        match self.kind {
            ArtworkKind::Covers => format!(":{}", format.file_name()),
            ArtworkKind::Photos => format!(":Thumbs:{}", format.file_name()),
        }
    }

    /// Render `image_bytes` into every format and attach the thumbnails to
    /// the image, reusing existing slots where the size is unchanged
    fn attach_thumbnails(&mut self, image_id: u32, image_bytes: &[u8]) -> Result<u32> {
        let source = decode_image(image_bytes)?;
        let endian = self.record.endian();
        let formats = self.formats.clone();
        let mut total = 0u32;

        for format in &formats {
            let rendered = render(&source, format, endian);
            let size = rendered.data.len() as u32;
            total += size;
            let file_name = self.thumbnail_file_name(format);
            let key = (image_id, format.format_id);
            let was_pending = self
                .pending
                .iter()
                .any(|p| p.image_id == image_id && p.format_id == format.format_id);

            let images = &mut self.record.image_list_mut().images;
            let Some(image) = images.iter_mut().find(|i| i.image_id() == image_id) else {
                return Err(Error::NotFound(format!("image {}", image_id)));
            };
            let existing = image
                .names_mut()
                .find(|n| n.format_id() == format.format_id);

            let fields = ImageNameFields {
                format_id: format.format_id,
                offset: 0,
                size,
                vertical_padding: rendered.vertical_padding,
                horizontal_padding: rendered.horizontal_padding,
                height: rendered.height,
                width: rendered.width,
            };

            match existing {
                Some(name) if was_pending => {
                    name.fields = fields;
                    self.pending
                        .retain(|p| !(p.image_id == image_id && p.format_id == format.format_id));
                    self.pending.push(PendingThumbnail {
                        image_id,
                        format_id: format.format_id,
                        data: rendered.data,
                    });
                }
                Some(name) if name.size() == size => {
                    name.fields = ImageNameFields {
                        offset: name.offset(),
                        ..fields
                    };
                    self.rewrites.insert(key, rendered.data);
                }
                Some(name) => {
                    self.freed.entry(format.format_id).or_default().push(FreedSlot {
                        offset: name.offset(),
                        size: name.size(),
                    });
                    self.rewrites.remove(&key);
                    name.fields = fields;
                    self.pending.push(PendingThumbnail {
                        image_id,
                        format_id: format.format_id,
                        data: rendered.data,
                    });
                }
                None => {
                    image.push_thumbnail(ImageNameRecord::new(endian, fields, &file_name));
                    self.pending.push(PendingThumbnail {
                        image_id,
                        format_id: format.format_id,
                        data: rendered.data,
                    });
                }
            }
        }
        Ok(total)
    }

    /// Set the cover of the track with `song_dbid`; returns the image ID and
    /// the total thumbnail bytes
    pub fn set_song_artwork(&mut self, song_dbid: u64, image_bytes: &[u8]) -> Result<(u32, u32)> {
        let image_id = match self.image_for_song(song_dbid) {
            Some(image) => image.image_id(),
            None => {
                let id = self.allocate_image_id();
                let endian = self.record.endian();
                let mut image = ImageItemRecord::new(endian, id, song_dbid);
                image.fields.source_size = image_bytes.len() as u32;
                self.record.image_list_mut().images.push(image);
                id
            }
        };
        let size = self.attach_thumbnails(image_id, image_bytes)?;
        log::debug!("Set artwork image {} for track {:#x}", image_id, song_dbid);
        Ok((image_id, size))
    }

    pub fn remove_song_artwork(&mut self, song_dbid: u64) -> bool {
        match self.image_for_song(song_dbid).map(|i| i.image_id()) {
            Some(image_id) => self.remove_image(image_id),
            None => false,
        }
    }

    /// Drop an image, freeing its thumbnail slots and removing it from every
    /// album
    pub fn remove_image(&mut self, image_id: u32) -> bool {
        let images = &mut self.record.image_list_mut().images;
        let Some(index) = images.iter().position(|i| i.image_id() == image_id) else {
            return false;
        };
        let image = images.remove(index);

        let pending_formats: HashSet<u32> = self
            .pending
            .iter()
            .filter(|p| p.image_id == image_id)
            .map(|p| p.format_id)
            .collect();
        self.pending.retain(|p| p.image_id != image_id);
        self.rewrites.retain(|(id, _), _| *id != image_id);

        for detail in &image.details {
            match &detail.body {
                ArtworkDetailBody::Thumbnail(name) => {
                    if !pending_formats.contains(&name.format_id()) {
                        self.freed.entry(name.format_id()).or_default().push(FreedSlot {
                            offset: name.offset(),
                            size: name.size(),
                        });
                    }
                }
                ArtworkDetailBody::FullResolution(name) => {
                    if let Some(file) = name.file_name() {
                        let relative = colon_path_to_relative(file);
                        self.full_res_writes.retain(|(path, _)| *path != relative);
                        self.full_res_deletes.push(relative);
                    }
                }
                _ => {}
            }
        }

        for album in &mut self.record.album_list_mut().albums {
            album.remove_image(image_id);
        }
        log::debug!("Removed image {}", image_id);
        true
    }

    // Photo albums

    fn master_album_index(&self) -> Option<usize> {
        self.record.albums().iter().position(|a| a.is_master())
    }

    fn create_master_album(&mut self) {
        let endian = self.record.endian();
        let id = self.next_album_id();
        self.record.album_list_mut().albums.insert(
            0,
            PhotoAlbumRecord::new(endian, id, PHOTO_LIBRARY_NAME, ALBUM_TYPE_MASTER),
        );
    }

    fn next_album_id(&self) -> u32 {
        self.record
            .albums()
            .iter()
            .map(|a| a.album_id())
            .max()
            .map_or(1, |id| id + 1)
    }

    pub fn albums(&self) -> &[PhotoAlbumRecord] {
        self.record.albums()
    }

    pub fn album(&self, album_id: u32) -> Option<&PhotoAlbumRecord> {
        self.albums().iter().find(|a| a.album_id() == album_id)
    }

    fn album_mut(&mut self, album_id: u32) -> Result<&mut PhotoAlbumRecord> {
        self.record
            .album_list_mut()
            .albums
            .iter_mut()
            .find(|a| a.album_id() == album_id)
            .ok_or_else(|| Error::NotFound(format!("photo album {}", album_id)))
    }

    pub fn create_album(&mut self, name: &str) -> u32 {
        let endian = self.record.endian();
        let id = self.next_album_id();
        self.record.album_list_mut().albums.push(PhotoAlbumRecord::new(
            endian,
            id,
            name,
            ALBUM_TYPE_NORMAL,
        ));
        log::debug!("Created photo album {} ({})", name, id);
        id
    }

    pub fn rename_album(&mut self, album_id: u32, name: &str) -> Result<()> {
        self.album_mut(album_id)?.set_name(name);
        Ok(())
    }

    /// Remove a user album; its photos stay in the library
    pub fn remove_album(&mut self, album_id: u32) -> Result<()> {
        if self.album(album_id).is_some_and(|a| a.is_master()) {
            return Err(Error::Validation(
                "the photo library album cannot be removed".to_string(),
            ));
        }
        let albums = &mut self.record.album_list_mut().albums;
        let before = albums.len();
        albums.retain(|a| a.album_id() != album_id);
        if albums.len() == before {
            return Err(Error::NotFound(format!("photo album {}", album_id)));
        }
        Ok(())
    }

    pub fn add_to_album(&mut self, album_id: u32, image_id: u32) -> Result<()> {
        if self.image(image_id).is_none() {
            return Err(Error::NotFound(format!("image {}", image_id)));
        }
        let album = self.album_mut(album_id)?;
        if !album.contains(image_id) {
            album.push_image(image_id);
        }
        Ok(())
    }

    pub fn remove_from_album(&mut self, album_id: u32, image_id: u32) -> Result<bool> {
        Ok(self.album_mut(album_id)?.remove_image(image_id))
    }

    /// Add a photo to the library: thumbnails for every photo format plus the
    /// original as the full-resolution rendition
    pub fn add_photo(&mut self, image_bytes: &[u8], album_id: Option<u32>) -> Result<u32> {
        if self.kind != ArtworkKind::Photos {
            return Err(Error::Validation(
                "photos can only be added to a photo database".to_string(),
            ));
        }
        let source = decode_image(image_bytes)?;
        let image_id = self.allocate_image_id();
        let endian = self.record.endian();

        let mut image = ImageItemRecord::new(endian, image_id, 0);
        let now = mac_now();
        image.fields.original_date = now;
        image.fields.digitized_date = now;
        image.fields.source_size = image_bytes.len() as u32;

        let relative = PathBuf::from(FULL_RESOLUTION_DIR).join(format!("{}.jpg", image_id));
        let file_name = format!(":{}:{}.jpg", FULL_RESOLUTION_DIR, image_id);
        image.set_full_resolution(ImageNameRecord::new(
            endian,
            ImageNameFields {
                format_id: 1,
                size: image_bytes.len() as u32,
                width: source.width().min(u16::MAX as u32) as u16,
                height: source.height().min(u16::MAX as u32) as u16,
                ..Default::default()
            },
            &file_name,
        ));
        self.record.image_list_mut().images.push(image);
        self.full_res_writes.push((relative, image_bytes.to_vec()));
        self.attach_thumbnails(image_id, image_bytes)?;

        if self.master_album_index().is_none() {
            self.create_master_album();
        }
        if let Some(index) = self.master_album_index() {
            self.record.album_list_mut().albums[index].push_image(image_id);
        }
        if let Some(album_id) = album_id {
            self.add_to_album(album_id, image_id)?;
        }
        log::debug!("Added photo {}", image_id);
        Ok(image_id)
    }

    /// Pack every thumbnail file and write the database
    pub fn save(&mut self) -> Result<()> {
        fs::create_dir_all(&self.thumbs_dir)?;
        let formats = self.formats.clone();

        for format in &formats {
            self.save_format(format)?;
        }

        for (relative, bytes) in self.full_res_writes.drain(..) {
            let path = self.thumbs_dir.join(&relative);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, bytes)?;
        }
        for relative in self.full_res_deletes.drain(..) {
            let path = self.thumbs_dir.join(&relative);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }

        let endian = self.record.endian();
        let files = &mut self.record.file_list_mut().files;
        files.clear();
        for format in &formats {
            files.push(FileInfoRecord::new(endian, format.format_id, format.byte_size()));
        }

        if let Some(parent) = self.db_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.db_path, self.record.to_bytes())?;
        log::info!(
            "Wrote {} images to {}",
            self.record.images().len(),
            self.db_path.display()
        );
        Ok(())
    }

    fn save_format(&mut self, format: &ThumbnailFormat) -> Result<()> {
        let format_id = format.format_id;
        let pending_keys: HashSet<u32> = self
            .pending
            .iter()
            .filter(|p| p.format_id == format_id)
            .map(|p| p.image_id)
            .collect();

        let mut stored_ids = Vec::new();
        let mut stored = Vec::new();
        for image in self.record.images() {
            if pending_keys.contains(&image.image_id()) {
                continue;
            }
            if let Some(name) = image.thumbnail(format_id) {
                let mut blob = StoredBlob::new(name.offset(), name.size());
                blob.rewrite = self.rewrites.remove(&(image.image_id(), format_id));
                stored_ids.push(image.image_id());
                stored.push(blob);
            }
        }

        let (mine, rest): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| p.format_id == format_id);
        self.pending = rest;
        let pending_ids: Vec<u32> = mine.iter().map(|p| p.image_id).collect();
        let mut pending: Vec<PendingBlob> =
            mine.into_iter().map(|p| PendingBlob::new(p.data)).collect();
        let freed = self.freed.remove(&format_id).unwrap_or_default();

        let path = self.thumbs_dir.join(format.file_name());
        if stored.is_empty() && pending.is_empty() {
            if path.exists() && !freed.is_empty() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        let len = packer::pack(&mut file, &mut stored, &mut pending, &freed)?;
        log::debug!("Packed {} ({} bytes)", path.display(), len);

        let offsets: HashMap<u32, u32> = stored_ids
            .into_iter()
            .zip(stored.iter().map(|b| b.offset))
            .chain(
                pending_ids
                    .into_iter()
                    .zip(pending.iter().map(|b| b.offset.unwrap_or(0))),
            )
            .collect();
        for image in &mut self.record.image_list_mut().images {
            if let Some(&offset) = offsets.get(&image.image_id()) {
                if let Some(name) = image.names_mut().find(|n| n.format_id() == format_id) {
                    name.fields.offset = offset;
                }
            }
        }
        Ok(())
    }
}

/// `:Full Resolution:100.jpg` to `Full Resolution/100.jpg`
fn colon_path_to_relative(path: &str) -> PathBuf {
    path.split(':').filter(|part| !part.is_empty()).collect()
}

impl std::fmt::Debug for ArtworkDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtworkDatabase")
            .field("kind", &self.kind)
            .field("path", &self.db_path)
            .field("images", &self.images().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png(color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb(color)));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn formats() -> Vec<ThumbnailFormat> {
        vec![ThumbnailFormat::new(1028, 8, 8), ThumbnailFormat::new(1029, 4, 4)]
    }

    fn open(dir: &TempDir, kind: ArtworkKind) -> ArtworkDatabase {
        ArtworkDatabase::open(
            kind,
            dir.path().join("ArtworkDB"),
            dir.path(),
            formats(),
            Endian::Little,
        )
        .unwrap()
    }

    #[test]
    fn test_cover_art_persists() {
        let dir = TempDir::new().unwrap();
        let mut db = open(&dir, ArtworkKind::Covers);
        let (first, size) = db.set_song_artwork(0xaa, &png([255, 0, 0])).unwrap();
        assert_eq!(size, 128 + 32);
        let (second, _) = db.set_song_artwork(0xbb, &png([0, 255, 0])).unwrap();
        db.save().unwrap();

        assert_eq!(fs::metadata(dir.path().join("F1028_1.ithmb")).unwrap().len(), 256);
        assert_eq!(fs::metadata(dir.path().join("F1029_1.ithmb")).unwrap().len(), 64);

        let db = open(&dir, ArtworkKind::Covers);
        assert_eq!(db.images().len(), 2);
        assert_eq!(db.image_for_song(0xaa).unwrap().image_id(), first);
        let offset = db.image(second).unwrap().thumbnail(1028).unwrap().offset();
        assert_eq!(offset, 128);
    }

    #[test]
    fn test_replacing_same_size_rewrites_in_place() {
        let dir = TempDir::new().unwrap();
        let mut db = open(&dir, ArtworkKind::Covers);
        db.set_song_artwork(1, &png([255, 0, 0])).unwrap();
        db.set_song_artwork(2, &png([0, 0, 255])).unwrap();
        db.save().unwrap();

        db.set_song_artwork(1, &png([255, 255, 255])).unwrap();
        db.save().unwrap();

        let bytes = fs::read(dir.path().join("F1029_1.ithmb")).unwrap();
        assert_eq!(bytes.len(), 64);
        assert_eq!(&bytes[0..2], &[0xff, 0xff]);
        assert_eq!(db.image_for_song(1).unwrap().thumbnail(1029).unwrap().offset(), 0);
    }

    #[test]
    fn test_removed_cover_space_is_reused() {
        let dir = TempDir::new().unwrap();
        let mut db = open(&dir, ArtworkKind::Covers);
        db.set_song_artwork(1, &png([1, 1, 1])).unwrap();
        db.set_song_artwork(2, &png([2, 2, 2])).unwrap();
        db.save().unwrap();

        assert!(db.remove_song_artwork(2));
        db.set_song_artwork(3, &png([3, 3, 3])).unwrap();
        db.save().unwrap();

        assert_eq!(fs::metadata(dir.path().join("F1028_1.ithmb")).unwrap().len(), 256);
        assert_eq!(db.image_for_song(3).unwrap().thumbnail(1028).unwrap().offset(), 128);
    }

    #[test]
    fn test_photo_albums() {
        let dir = TempDir::new().unwrap();
        let mut db = open(&dir, ArtworkKind::Photos);
        let album = db.create_album("Holiday");
        let photo = db.add_photo(&png([10, 20, 30]), Some(album)).unwrap();
        db.save().unwrap();

        assert!(dir.path().join("Full Resolution").join(format!("{}.jpg", photo)).exists());

        let mut db = open(&dir, ArtworkKind::Photos);
        assert_eq!(db.albums().len(), 2);
        assert!(db.albums()[0].is_master());
        assert_eq!(db.albums()[0].image_ids(), vec![photo]);
        assert_eq!(db.album(album).unwrap().name(), "Holiday");

        assert!(db.remove_album(db.albums()[0].album_id()).is_err());
        db.remove_album(album).unwrap();
        assert!(db.remove_image(photo));
        db.save().unwrap();
        assert!(!dir.path().join("Full Resolution").join(format!("{}.jpg", photo)).exists());
        assert!(db.albums()[0].items.is_empty());
    }
}
