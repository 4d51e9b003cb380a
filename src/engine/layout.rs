//! On-device file layout

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of `Fxx` music bucket directories
pub const MUSIC_BUCKETS: u32 = 20;

/// Paths of every file the engine touches on a mounted device
#[derive(Debug, Clone)]
pub struct DeviceLayout {
    /// Mount point
    root: PathBuf,

    /// iPod_Control directory
    control_dir: PathBuf,
}

impl DeviceLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let control_dir = root.join("iPod_Control");
        Self { root, control_dir }
    }

    /// Create the directory skeleton a fresh device needs
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.itunes_dir())?;
        fs::create_dir_all(self.music_dir())?;
        fs::create_dir_all(self.device_dir())?;
        log::debug!("Device directory structure present at {}", self.root.display());
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn control_dir(&self) -> &Path {
        &self.control_dir
    }

    pub fn itunes_dir(&self) -> PathBuf {
        self.control_dir.join("iTunes")
    }

    pub fn device_dir(&self) -> PathBuf {
        self.control_dir.join("Device")
    }

    pub fn sysinfo_path(&self) -> PathBuf {
        self.device_dir().join("SysInfo")
    }

    pub fn database_path(&self) -> PathBuf {
        self.itunes_dir().join("iTunesDB")
    }

    pub fn play_counts_path(&self) -> PathBuf {
        self.itunes_dir().join("Play Counts")
    }

    /// On-The-Go index file `n`: `OTGPlaylistInfo`, then `_1`, `_2`, ...
    pub fn on_the_go_path(&self, n: usize) -> PathBuf {
        if n == 0 {
            self.itunes_dir().join("OTGPlaylistInfo")
        } else {
            self.itunes_dir().join(format!("OTGPlaylistInfo_{}", n))
        }
    }

    pub fn equalizer_path(&self) -> PathBuf {
        self.itunes_dir().join("iTunesEQPresets")
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.control_dir.join("Artwork")
    }

    pub fn artwork_database_path(&self) -> PathBuf {
        self.artwork_dir().join("ArtworkDB")
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.root.join("Photos")
    }

    pub fn photo_database_path(&self) -> PathBuf {
        self.photos_dir().join("Photo Database")
    }

    pub fn music_dir(&self) -> PathBuf {
        self.control_dir.join("Music")
    }

    pub fn bucket_dir(&self, bucket: u32) -> PathBuf {
        self.music_dir().join(format!("F{:02}", bucket % MUSIC_BUCKETS))
    }

    /// Destination of a music file copied onto the device, named after the
    /// track's `DatabaseId` so names never collide
    pub fn music_file_path(&self, source: &Path, database_id: u64) -> PathBuf {
        let bucket = (database_id % MUSIC_BUCKETS as u64) as u32;
        let stem = format!("{:016X}", database_id);
        let name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", stem, ext.to_ascii_lowercase()),
            None => stem,
        };
        self.bucket_dir(bucket).join(name)
    }

    pub fn is_on_device(&self, path: &Path) -> bool {
        path.starts_with(&self.music_dir())
    }

    /// Copy a music file onto the device
    pub fn copy_music_file(&self, source: &Path, dest: &Path) -> Result<()> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source, dest)?;
        Ok(())
    }

    /// `/media/ipod/iPod_Control/Music/F03/X.mp3` to
    /// `:iPod_Control:Music:F03:X.mp3`
    pub fn to_device_location(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut location = String::new();
        for part in relative.components() {
            location.push(':');
            location.push_str(part.as_os_str().to_str()?);
        }
        Some(location)
    }

    pub fn from_device_location(&self, location: &str) -> PathBuf {
        location
            .split(':')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    /// Remove bucket directories left empty by deletions
    pub fn remove_empty_buckets(&self) -> Result<usize> {
        let mut removed = 0;
        for bucket in 0..MUSIC_BUCKETS {
            let dir = self.bucket_dir(bucket);
            if dir.is_dir() && fs::read_dir(&dir)?.next().is_none() {
                fs::remove_dir(&dir)?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_device_location_roundtrip() {
        let layout = DeviceLayout::new("/media/ipod");
        let path = layout.music_file_path(Path::new("/home/me/Song.MP3"), 0x23);
        assert_eq!(
            path,
            PathBuf::from("/media/ipod/iPod_Control/Music/F15/0000000000000023.mp3")
        );

        let location = layout.to_device_location(&path).unwrap();
        assert_eq!(location, ":iPod_Control:Music:F15:0000000000000023.mp3");
        assert_eq!(layout.from_device_location(&location), path);
    }

    #[test]
    fn test_outside_root_has_no_location() {
        let layout = DeviceLayout::new("/media/ipod");
        assert_eq!(layout.to_device_location(Path::new("/tmp/x.mp3")), None);
        assert!(!layout.is_on_device(Path::new("/tmp/x.mp3")));
    }

    #[test]
    fn test_on_the_go_names() {
        let layout = DeviceLayout::new("/d");
        assert!(layout.on_the_go_path(0).ends_with("OTGPlaylistInfo"));
        assert!(layout.on_the_go_path(2).ends_with("OTGPlaylistInfo_2"));
    }

    #[test]
    fn test_remove_empty_buckets() {
        let dir = TempDir::new().unwrap();
        let layout = DeviceLayout::new(dir.path());
        fs::create_dir_all(layout.bucket_dir(0)).unwrap();
        fs::create_dir_all(layout.bucket_dir(1)).unwrap();
        fs::write(layout.bucket_dir(1).join("a.mp3"), b"x").unwrap();

        assert_eq!(layout.remove_empty_buckets().unwrap(), 1);
        assert!(!layout.bucket_dir(0).exists());
        assert!(layout.bucket_dir(1).exists());
    }
}
