//! Pod Database - portable player database engine
//!
//! Reads and writes the on-device databases of iPod-family players: the
//! track database with its playlists and podcasts, the cover art and photo
//! databases with their thumbnail files, and the side files the player
//! writes back (play counts, On-The-Go playlists, equalizer presets).

pub mod artwork;
pub mod artworkdb;
pub mod codec;
pub mod config;
pub mod engine;
pub mod equalizer;
pub mod error;
pub mod itunesdb;
pub mod validation;

pub use config::{Capabilities, DeviceConfig, DeviceModel};
pub use engine::{Device, MountedDevice, TrackDatabase};
pub use error::{Error, FormatError, Result};
