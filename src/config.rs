//! Device configuration

use crate::artwork::ThumbnailFormat;
use crate::itunesdb::MAX_VERSION;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Player family, which decides what the database may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceModel {
    /// Plain music player: no artwork, no podcasts
    Generic,
    /// Small-screen player without podcast support
    Mini,
    /// Colour player with cover art and photos
    Photo,
    /// Video player with cover art, photos and podcasts
    Video,
    Nano,
    Classic,
    /// Handset with a big-endian database
    Mobile,
}

impl DeviceModel {
    pub const ALL: [DeviceModel; 7] = [
        DeviceModel::Generic,
        DeviceModel::Mini,
        DeviceModel::Photo,
        DeviceModel::Video,
        DeviceModel::Nano,
        DeviceModel::Classic,
        DeviceModel::Mobile,
    ];

    pub fn capabilities(self) -> Capabilities {
        let covers = |formats: &[(u32, u16, u16)]| {
            formats
                .iter()
                .map(|&(id, w, h)| ThumbnailFormat::new(id, w, h))
                .collect::<Vec<_>>()
        };

        match self {
            DeviceModel::Generic => Capabilities::basic(true),
            DeviceModel::Mini => Capabilities::basic(false),
            DeviceModel::Photo => Capabilities {
                cover_formats: covers(&[(1016, 140, 140), (1017, 56, 56)]),
                photo_formats: covers(&[(1009, 42, 30), (1013, 220, 176), (1015, 130, 88)]),
                ..Capabilities::basic(true)
            },
            DeviceModel::Video => Capabilities {
                cover_formats: covers(&[(1028, 100, 100), (1029, 200, 200)]),
                photo_formats: covers(&[
                    (1036, 50, 41),
                    (1015, 130, 88),
                    (1024, 320, 240),
                    (1019, 720, 480),
                ]),
                ..Capabilities::basic(true)
            },
            DeviceModel::Nano => Capabilities {
                cover_formats: covers(&[(1027, 100, 100), (1031, 42, 42)]),
                photo_formats: covers(&[(1032, 42, 37), (1023, 176, 132)]),
                ..Capabilities::basic(true)
            },
            DeviceModel::Classic => Capabilities {
                cover_formats: covers(&[(1055, 128, 128), (1060, 320, 320), (1061, 56, 56)]),
                photo_formats: covers(&[(1066, 64, 64), (1024, 320, 240), (1067, 720, 480)]),
                ..Capabilities::basic(true)
            },
            DeviceModel::Mobile => Capabilities {
                big_endian: true,
                ..Capabilities::basic(false)
            },
        }
    }

    /// Capacity assumed when none is configured
    pub fn default_capacity(self) -> u64 {
        const GB: u64 = 1_000_000_000;
        match self {
            DeviceModel::Mini | DeviceModel::Mobile => 4 * GB,
            DeviceModel::Nano => 8 * GB,
            DeviceModel::Generic | DeviceModel::Photo => 20 * GB,
            DeviceModel::Video => 30 * GB,
            DeviceModel::Classic => 80 * GB,
        }
    }
}

impl FromStr for DeviceModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeviceModel::ALL
            .into_iter()
            .find(|m| format!("{:?}", m).eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown device model '{}'", s))
    }
}

/// What a device model supports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub supports_podcasts: bool,
    pub cover_formats: Vec<ThumbnailFormat>,
    pub photo_formats: Vec<ThumbnailFormat>,
    pub max_database_version: u32,
    pub big_endian: bool,
}

impl Capabilities {
    fn basic(supports_podcasts: bool) -> Self {
        Self {
            supports_podcasts,
            cover_formats: Vec::new(),
            photo_formats: Vec::new(),
            max_database_version: MAX_VERSION,
            big_endian: false,
        }
    }

    pub fn supports_artwork(&self) -> bool {
        !self.cover_formats.is_empty()
    }

    pub fn supports_photos(&self) -> bool {
        !self.photo_formats.is_empty()
    }
}

/// How to reach and treat one mounted device
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Mount point of the device (e.g. /media/ipod)
    pub mount_path: PathBuf,

    pub model: DeviceModel,

    /// Total capacity in bytes; the model default when unset
    pub capacity: Option<u64>,

    /// Overrides the model's byte order for fresh databases
    pub big_endian: Option<bool>,

    /// Device identifier keying the database signature; read from SysInfo
    /// when unset
    pub firewire_id: Option<String>,

    /// Ignore any existing database and start empty
    pub create_fresh: bool,
}

impl DeviceConfig {
    pub fn new(mount_path: PathBuf) -> Self {
        Self {
            mount_path,
            model: DeviceModel::Video,
            capacity: None,
            big_endian: None,
            firewire_id: None,
            create_fresh: false,
        }
    }

    pub fn with_model(mut self, model: DeviceModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn with_big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = Some(big_endian);
        self
    }

    pub fn with_firewire_id(mut self, id: impl Into<String>) -> Self {
        self.firewire_id = Some(id.into());
        self
    }

    pub fn with_create_fresh(mut self, create_fresh: bool) -> Self {
        self.create_fresh = create_fresh;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_from_str() {
        assert_eq!("video".parse::<DeviceModel>(), Ok(DeviceModel::Video));
        assert_eq!("Classic".parse::<DeviceModel>(), Ok(DeviceModel::Classic));
        assert!("zune".parse::<DeviceModel>().is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(!DeviceModel::Mini.capabilities().supports_podcasts);
        assert!(DeviceModel::Video.capabilities().supports_artwork());
        assert!(DeviceModel::Mobile.capabilities().big_endian);
        assert!(!DeviceModel::Generic.capabilities().supports_photos());
    }

    #[test]
    fn test_builder() {
        let config = DeviceConfig::new(PathBuf::from("/media/ipod"))
            .with_model(DeviceModel::Nano)
            .with_capacity(1024)
            .with_create_fresh(true);
        assert_eq!(config.model, DeviceModel::Nano);
        assert_eq!(config.capacity, Some(1024));
        assert!(config.create_fresh);
    }
}
