//! Equalizer preset file (`iTunesEQPresets`)
//!
//! An `mqed` header followed by fixed-size `pqed` blocks. Each preset carries
//! a preamp and band gains in hundredths of a decibel, once for the 10-band
//! and once for the 5-band equalizer.

use crate::codec::{Endian, Tag};
use crate::error::{FormatError, Result};
use binrw::{binrw, BinRead, BinWrite};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Cursor;
use std::path::Path;

pub const EQ_FILE_TAG: Tag = Tag::new(b"mqed");
pub const EQ_PRESET_TAG: Tag = Tag::new(b"pqed");

const HEADER_LEN: u32 = 0x68;
const PRESET_LEN: u32 = 0x24c;
const NAME_UNITS: usize = 255;

pub const BAND_COUNT: usize = 10;
pub const SIMPLE_BAND_COUNT: usize = 5;

/// Largest gain, +/- 12 dB
pub const MAX_GAIN: i32 = 1200;

#[binrw]
#[derive(Debug, Clone)]
struct FileHeader {
    tag: [u8; 4],
    header_len: u32,
    unknown: u32,
    preset_count: u32,
    preset_len: u32,
}

#[binrw]
#[derive(Debug, Clone)]
struct PresetBlock {
    tag: [u8; 4],
    /// Bytes of UTF-16 in `name`
    name_len: u16,
    #[br(count = NAME_UNITS)]
    name: Vec<u16>,
    preamp: i32,
    band_count: u32,
    bands: [i32; BAND_COUNT],
    simple_band_count: u32,
    simple_bands: [i32; SIMPLE_BAND_COUNT],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualizerPreset {
    pub name: String,
    pub preamp: i32,
    pub bands: [i32; BAND_COUNT],
    pub simple_bands: [i32; SIMPLE_BAND_COUNT],
}

impl EqualizerPreset {
    /// A preset with every gain at zero
    pub fn flat(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preamp: 0,
            bands: [0; BAND_COUNT],
            simple_bands: [0; SIMPLE_BAND_COUNT],
        }
    }

    pub fn with_bands(mut self, bands: [i32; BAND_COUNT]) -> Self {
        self.bands = bands.map(clamp_gain);
        self
    }

    pub fn with_simple_bands(mut self, bands: [i32; SIMPLE_BAND_COUNT]) -> Self {
        self.simple_bands = bands.map(clamp_gain);
        self
    }

    pub fn with_preamp(mut self, preamp: i32) -> Self {
        self.preamp = clamp_gain(preamp);
        self
    }

    fn from_block(block: PresetBlock) -> Self {
        let units = (block.name_len as usize / 2).min(block.name.len());
        Self {
            name: String::from_utf16_lossy(&block.name[..units]),
            preamp: block.preamp,
            bands: block.bands,
            simple_bands: block.simple_bands,
        }
    }

    fn to_block(&self, tag: [u8; 4]) -> PresetBlock {
        let mut name: Vec<u16> = self.name.encode_utf16().take(NAME_UNITS).collect();
        let name_len = (name.len() * 2) as u16;
        name.resize(NAME_UNITS, 0);
        PresetBlock {
            tag,
            name_len,
            name,
            preamp: self.preamp,
            band_count: BAND_COUNT as u32,
            bands: self.bands,
            simple_band_count: SIMPLE_BAND_COUNT as u32,
            simple_bands: self.simple_bands,
        }
    }
}

fn clamp_gain(gain: i32) -> i32 {
    gain.clamp(-MAX_GAIN, MAX_GAIN)
}

fn disk_tag(tag: Tag, endian: Endian) -> [u8; 4] {
    match endian {
        Endian::Little => *tag.as_bytes(),
        Endian::Big => *tag.reversed().as_bytes(),
    }
}

fn check_tag(found: [u8; 4], expected: Tag, offset: usize) -> Result<()> {
    if found == *expected.as_bytes() || found == *expected.reversed().as_bytes() {
        Ok(())
    } else {
        Err(FormatError::TagMismatch {
            expected,
            found: Tag(found),
            offset,
        }
        .into())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualizerPresets {
    pub presets: Vec<EqualizerPreset>,
}

impl EqualizerPresets {
    pub fn parse(bytes: &[u8], endian: Endian) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let header = FileHeader::read_options(&mut cursor, endian, ())?;
        check_tag(header.tag, EQ_FILE_TAG, 0)?;
        if header.preset_len < PRESET_LEN {
            return Err(FormatError::Malformed(format!(
                "equalizer preset length {:#x} is too short",
                header.preset_len
            ))
            .into());
        }

        let body = bytes.len().saturating_sub(header.header_len as usize);
        let wanted = header.preset_count as u64 * header.preset_len as u64;
        if wanted > body as u64 {
            return Err(FormatError::Truncated {
                offset: header.header_len as usize,
                wanted: usize::try_from(wanted).unwrap_or(usize::MAX),
                available: body,
            }
            .into());
        }

        let mut presets = Vec::with_capacity(header.preset_count as usize);
        for index in 0..header.preset_count as u64 {
            let offset = header.header_len as u64 + index * header.preset_len as u64;
            cursor.set_position(offset);
            let block = PresetBlock::read_options(&mut cursor, endian, ())?;
            check_tag(block.tag, EQ_PRESET_TAG, offset as usize)?;
            presets.push(EqualizerPreset::from_block(block));
        }
        Ok(Self { presets })
    }

    pub fn to_bytes(&self, endian: Endian) -> Result<Vec<u8>> {
        let header = FileHeader {
            tag: disk_tag(EQ_FILE_TAG, endian),
            header_len: HEADER_LEN,
            unknown: 1,
            preset_count: self.presets.len() as u32,
            preset_len: PRESET_LEN,
        };
        let mut out = Cursor::new(Vec::new());
        header.write_options(&mut out, endian, ())?;
        let mut bytes = out.into_inner();
        bytes.resize(HEADER_LEN as usize, 0);

        let tag = disk_tag(EQ_PRESET_TAG, endian);
        for preset in &self.presets {
            let mut block = Cursor::new(Vec::new());
            preset.to_block(tag).write_options(&mut block, endian, ())?;
            bytes.extend_from_slice(&block.into_inner());
        }
        Ok(bytes)
    }

    /// `None` when the device has no preset file yet
    pub fn load(path: &Path, endian: Endian) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::parse(&fs::read(path)?, endian)?))
    }

    pub fn save(&self, path: &Path, endian: Endian) -> Result<()> {
        fs::write(path, self.to_bytes(endian)?)?;
        log::info!("Wrote {} equalizer presets to {}", self.presets.len(), path.display());
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&EqualizerPreset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Add a preset, replacing one of the same name
    pub fn upsert(&mut self, preset: EqualizerPreset) {
        match self.presets.iter_mut().find(|p| p.name == preset.name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        self.presets.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn presets() -> EqualizerPresets {
        let mut presets = EqualizerPresets::default();
        presets.upsert(
            EqualizerPreset::flat("Bass Booster")
                .with_bands([550, 430, 330, 220, 100, 0, 0, 0, 0, 0])
                .with_simple_bands([500, 200, 0, 0, 0]),
        );
        presets.upsert(EqualizerPreset::flat("Flat"));
        presets
    }

    #[test]
    fn test_file_layout() {
        let bytes = presets().to_bytes(Endian::Little).unwrap();
        assert_eq!(&bytes[..4], b"mqed");
        assert_eq!(bytes.len(), 0x68 + 2 * 0x24c);
        assert_eq!(&bytes[0x68..0x6c], b"pqed");
        // "Bass Booster" is 12 UTF-16 units
        assert_eq!(u16::from_le_bytes([bytes[0x6c], bytes[0x6d]]), 24);
    }

    #[test]
    fn test_parse_written_presets() {
        for endian in [Endian::Little, Endian::Big] {
            let bytes = presets().to_bytes(endian).unwrap();
            let parsed = EqualizerPresets::parse(&bytes, endian).unwrap();
            assert_eq!(parsed, presets());
        }
    }

    #[test]
    fn test_gains_are_clamped() {
        let preset = EqualizerPreset::flat("Loud")
            .with_preamp(5000)
            .with_bands([-3000; BAND_COUNT]);
        assert_eq!(preset.preamp, MAX_GAIN);
        assert!(preset.bands.iter().all(|&b| b == -MAX_GAIN));
    }

    #[test]
    fn test_upsert_and_remove() {
        let mut presets = presets();
        presets.upsert(EqualizerPreset::flat("Flat").with_preamp(100));
        assert_eq!(presets.presets.len(), 2);
        assert_eq!(presets.find("Flat").unwrap().preamp, 100);
        assert!(presets.remove("Flat"));
        assert!(!presets.remove("Flat"));
    }

    #[test]
    fn test_bad_tag() {
        let mut bytes = presets().to_bytes(Endian::Little).unwrap();
        bytes[0x68] = b'x';
        assert!(EqualizerPresets::parse(&bytes, Endian::Little).is_err());
    }

    #[test]
    fn test_preset_count_past_end_is_format_error() {
        let mut bytes = presets().to_bytes(Endian::Little).unwrap();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            EqualizerPresets::parse(&bytes, Endian::Little),
            Err(Error::Format(FormatError::Truncated { .. }))
        ));
    }

    #[test]
    fn test_long_name_is_clamped() {
        let name = "x".repeat(1000);
        let bytes = EqualizerPresets {
            presets: vec![EqualizerPreset::flat(name)],
        }
        .to_bytes(Endian::Little)
        .unwrap();
        assert_eq!(bytes.len(), 0x68 + 0x24c);
        assert_eq!(u16::from_le_bytes([bytes[0x6c], bytes[0x6d]]), 510);

        let parsed = EqualizerPresets::parse(&bytes, Endian::Little).unwrap();
        assert_eq!(parsed.presets[0].name, "x".repeat(255));
    }
}
