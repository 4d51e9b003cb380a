//! The "Play Counts" side file written by the player
//!
//! One fixed-width entry per track, in the track list's load order, holding
//! what happened on the device since the last sync.

use crate::codec::{Endian, Tag};
use crate::error::{Error, FormatError, Result};
use binrw::{binrw, BinRead, BinWrite};
use std::io::Cursor;

pub const PLAY_COUNTS_TAG: Tag = Tag::new(b"mhdp");

/// Fixed header length
pub const HEADER_LEN: u32 = 0x60;

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Header {
    tag: [u8; 4],
    header_len: u32,
    entry_len: u32,
    entry_count: u32,
}

/// Activity on the device since the last sync
#[binrw]
#[br(import(entry_len: u32))]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlayCountEntry {
    pub play_count: u32,
    /// Mac timestamp
    pub last_played: u32,
    /// Milliseconds
    pub bookmark: u32,
    #[br(if(entry_len >= 0x10))]
    #[bw(if(rating.is_some()))]
    pub rating: Option<u32>,
    #[br(if(entry_len >= 0x14))]
    #[bw(if(unknown.is_some()))]
    unknown: Option<u32>,
    #[br(if(entry_len >= 0x18))]
    #[bw(if(skip_count.is_some()))]
    pub skip_count: Option<u32>,
    #[br(if(entry_len >= 0x1c))]
    #[bw(if(last_skipped.is_some()))]
    pub last_skipped: Option<u32>,
}

impl PlayCountEntry {
    pub fn new(play_count: u32, last_played: u32) -> Self {
        Self {
            play_count,
            last_played,
            ..Default::default()
        }
    }

    pub fn with_rating(mut self, rating: u32) -> Self {
        self.rating = Some(rating);
        self
    }

    pub fn with_skips(mut self, skip_count: u32, last_skipped: u32) -> Self {
        self.skip_count = Some(skip_count);
        self.last_skipped = Some(last_skipped);
        self
    }
}

/// Parse a play counts file; the byte order follows the database's
pub fn parse(bytes: &[u8], endian: Endian) -> Result<Vec<PlayCountEntry>> {
    let mut cursor = Cursor::new(bytes);
    let header = Header::read_options(&mut cursor, endian, ())?;
    let tag_ok = header.tag == *PLAY_COUNTS_TAG.as_bytes()
        || header.tag == *PLAY_COUNTS_TAG.reversed().as_bytes();
    if !tag_ok {
        return Err(FormatError::TagMismatch {
            expected: PLAY_COUNTS_TAG,
            found: Tag(header.tag),
            offset: 0,
        }
        .into());
    }
    if header.entry_len < 0x0c {
        return Err(FormatError::Malformed(format!(
            "play counts entry length {:#x} is too short",
            header.entry_len
        ))
        .into());
    }

    let body = bytes.len().saturating_sub(header.header_len as usize);
    let wanted = header.entry_count as u64 * header.entry_len as u64;
    if wanted > body as u64 {
        return Err(FormatError::Truncated {
            offset: header.header_len as usize,
            wanted: usize::try_from(wanted).unwrap_or(usize::MAX),
            available: body,
        }
        .into());
    }

    let mut entries = Vec::with_capacity(header.entry_count as usize);
    for index in 0..header.entry_count as usize {
        let start = header.header_len as usize + index * header.entry_len as usize;
        let end = start + header.entry_len as usize;
        let chunk = bytes.get(start..end).ok_or(FormatError::Truncated {
            offset: start,
            wanted: header.entry_len as usize,
            available: bytes.len().saturating_sub(start),
        })?;
        let entry =
            PlayCountEntry::read_options(&mut Cursor::new(chunk), endian, (header.entry_len,))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Serialize entries with the longest entry layout in use
pub fn to_bytes(entries: &[PlayCountEntry], endian: Endian) -> Result<Vec<u8>> {
    let entry_len = 0x1c;
    let tag = match endian {
        Endian::Little => *PLAY_COUNTS_TAG.as_bytes(),
        Endian::Big => *PLAY_COUNTS_TAG.reversed().as_bytes(),
    };
    let header = Header {
        tag,
        header_len: HEADER_LEN,
        entry_len,
        entry_count: entries.len() as u32,
    };

    let mut out = Cursor::new(Vec::new());
    header.write_options(&mut out, endian, ())?;
    let mut bytes = out.into_inner();
    bytes.resize(HEADER_LEN as usize, 0);

    for entry in entries {
        let full = PlayCountEntry {
            rating: Some(entry.rating.unwrap_or(0)),
            unknown: Some(entry.unknown.unwrap_or(0)),
            skip_count: Some(entry.skip_count.unwrap_or(0)),
            last_skipped: Some(entry.last_skipped.unwrap_or(0)),
            ..entry.clone()
        };
        let mut chunk = Cursor::new(Vec::new());
        full.write_options(&mut chunk, endian, ())
            .map_err(Error::from)?;
        bytes.extend_from_slice(&chunk.into_inner());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_entries_have_no_rating() {
        let mut bytes = vec![0u8; HEADER_LEN as usize];
        bytes[..4].copy_from_slice(b"mhdp");
        bytes[4..8].copy_from_slice(&HEADER_LEN.to_le_bytes());
        bytes[8..12].copy_from_slice(&0x0cu32.to_le_bytes());
        bytes[12..16].copy_from_slice(&2u32.to_le_bytes());
        for (plays, last) in [(3u32, 100u32), (0, 0)] {
            bytes.extend_from_slice(&plays.to_le_bytes());
            bytes.extend_from_slice(&last.to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }

        let entries = parse(&bytes, Endian::Little).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].play_count, 3);
        assert_eq!(entries[0].last_played, 100);
        assert_eq!(entries[0].rating, None);
        assert_eq!(entries[0].skip_count, None);
    }

    #[test]
    fn test_full_entries_roundtrip() {
        let entries = vec![
            PlayCountEntry::new(5, 3_400_000_000).with_rating(80).with_skips(2, 3_400_000_100),
            PlayCountEntry::new(1, 3_400_000_500),
        ];
        let bytes = to_bytes(&entries, Endian::Big).unwrap();
        assert_eq!(bytes.len(), 0x60 + 2 * 0x1c);
        assert_eq!(&bytes[..4], b"pdhm");

        let parsed = parse(&bytes, Endian::Big).unwrap();
        assert_eq!(parsed[0].rating, Some(80));
        assert_eq!(parsed[0].skip_count, Some(2));
        assert_eq!(parsed[1].play_count, 1);
        assert_eq!(parsed[1].rating, Some(0));
    }

    #[test]
    fn test_truncated_file_is_an_error() {
        let entries = vec![PlayCountEntry::new(1, 1)];
        let bytes = to_bytes(&entries, Endian::Little).unwrap();
        assert!(parse(&bytes[..bytes.len() - 4], Endian::Little).is_err());
        assert!(parse(b"nope", Endian::Little).is_err());
    }

    #[test]
    fn test_entry_count_past_end_is_format_error() {
        let mut bytes = to_bytes(&[PlayCountEntry::new(1, 1)], Endian::Little).unwrap();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            parse(&bytes, Endian::Little),
            Err(Error::Format(FormatError::Truncated { .. }))
        ));
    }
}
