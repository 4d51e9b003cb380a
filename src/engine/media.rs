//! Tag and stream properties of a media file about to be imported

use crate::artwork::extract_embedded_artwork;
use crate::error::Result;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub composer: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub track_count: Option<u32>,
    pub disc_number: Option<u32>,
    pub disc_count: Option<u32>,
    pub duration_ms: u32,
    /// kbit/s
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub size: u64,
    /// Lowercased file extension
    pub extension: String,
    pub artwork: Option<Vec<u8>>,
}

/// Read everything the track record needs from `path`
pub fn read_media_info(path: &Path) -> Result<MediaInfo> {
    log::debug!("Reading tags from {}", path.display());
    let size = fs::metadata(path)?.len();
    let tagged_file = Probe::open(path)?.read()?;
    let properties = tagged_file.properties();

    let mut info = MediaInfo {
        duration_ms: properties.duration().as_millis().min(u32::MAX as u128) as u32,
        bitrate: properties.audio_bitrate(),
        sample_rate: properties.sample_rate(),
        size,
        extension: path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase(),
        ..Default::default()
    };

    match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
        Some(tag) => {
            let text = |value: Option<std::borrow::Cow<'_, str>>| {
                value
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            };
            info.title = text(tag.title());
            info.artist = text(tag.artist());
            info.album = text(tag.album());
            info.genre = text(tag.genre());
            info.composer = tag
                .get_string(&ItemKey::Composer)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
            info.year = tag.year();
            info.track_number = tag.track();
            info.track_count = tag.track_total();
            info.disc_number = tag.disk();
            info.disc_count = tag.disk_total();
        }
        None => log::warn!("No tags in {}, using the file name as title", path.display()),
    }

    if info.title.is_none() {
        info.title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_string);
    }

    info.artwork = match extract_embedded_artwork(path) {
        Ok(artwork) => artwork,
        Err(e) => {
            log::warn!("Could not read artwork from {}: {}", path.display(), e);
            None
        }
    };

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unreadable_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.mp3");
        fs::write(&path, b"definitely not audio").unwrap();
        assert!(read_media_info(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(read_media_info(Path::new("/nonexistent/track.mp3")).is_err());
    }
}
