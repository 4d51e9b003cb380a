//! Track database engine and its side files

pub mod database;
pub mod device;
pub mod layout;
pub mod library_index;
pub mod media;
pub mod otg;
pub mod play_counts;
pub mod podcast;
pub mod signature;

pub use database::{DatabaseState, SaveProgress, TrackDatabase, FIRST_TRACK_ID};
pub use device::{Device, MountedDevice, SysInfo};
pub use layout::DeviceLayout;
pub use media::{read_media_info, MediaInfo};
pub use play_counts::PlayCountEntry;

use crate::artwork::{ArtworkDatabase, ArtworkKind};
use crate::codec::Endian;
use crate::error::{Error, Result};

/// Open the photo database of a device that shows photos
pub fn open_photo_database<D: Device>(device: &D) -> Result<ArtworkDatabase> {
    let capabilities = device.capabilities();
    if !capabilities.supports_photos() {
        return Err(Error::Validation("device does not show photos".to_string()));
    }
    let layout = device.layout();
    let endian = if device.is_big_endian() {
        Endian::Big
    } else {
        Endian::Little
    };
    ArtworkDatabase::open(
        ArtworkKind::Photos,
        layout.photo_database_path(),
        layout.photos_dir(),
        capabilities.photo_formats.clone(),
        endian,
    )
}
