//! On-The-Go playlist files (`OTGPlaylistInfo`, `OTGPlaylistInfo_1`, ...)
//!
//! Each file lists positions into the track list as it was last written.

use super::layout::DeviceLayout;
use crate::codec::{Endian, Tag};
use crate::error::{FormatError, Result};
use binrw::{binrw, BinRead, BinWrite};
use std::fs;
use std::io::Cursor;

pub const ON_THE_GO_TAG: Tag = Tag::new(b"mhpo");

const HEADER_LEN: u32 = 0x14;

#[binrw]
#[derive(Debug, Clone, PartialEq, Eq)]
struct OnTheGoHeader {
    tag: [u8; 4],
    header_len: u32,
    unknown1: u32,
    count: u32,
    unknown2: u32,
}

/// Track-list positions of one On-The-Go playlist
pub fn parse(bytes: &[u8], endian: Endian) -> Result<Vec<u32>> {
    let mut cursor = Cursor::new(bytes);
    let header = OnTheGoHeader::read_options(&mut cursor, endian, ())?;
    if header.tag != *ON_THE_GO_TAG.as_bytes() && header.tag != *ON_THE_GO_TAG.reversed().as_bytes()
    {
        return Err(FormatError::TagMismatch {
            expected: ON_THE_GO_TAG,
            found: Tag(header.tag),
            offset: 0,
        }
        .into());
    }

    let body = bytes.len().saturating_sub(header.header_len as usize);
    let wanted = header.count as u64 * 4;
    if wanted > body as u64 {
        return Err(FormatError::Truncated {
            offset: header.header_len as usize,
            wanted: usize::try_from(wanted).unwrap_or(usize::MAX),
            available: body,
        }
        .into());
    }

    cursor.set_position(header.header_len as u64);
    let mut indices = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        indices.push(u32::read_options(&mut cursor, endian, ())?);
    }
    Ok(indices)
}

pub fn to_bytes(indices: &[u32], endian: Endian) -> Result<Vec<u8>> {
    let tag = match endian {
        Endian::Little => *ON_THE_GO_TAG.as_bytes(),
        Endian::Big => *ON_THE_GO_TAG.reversed().as_bytes(),
    };
    let header = OnTheGoHeader {
        tag,
        header_len: HEADER_LEN,
        unknown1: 0,
        count: indices.len() as u32,
        unknown2: 0,
    };
    let mut out = Cursor::new(Vec::new());
    header.write_options(&mut out, endian, ())?;
    for index in indices {
        index.write_options(&mut out, endian, ())?;
    }
    Ok(out.into_inner())
}

/// Read every On-The-Go file present, stopping at the first gap
pub fn load_all(layout: &DeviceLayout, endian: Endian) -> Result<Vec<Vec<u32>>> {
    let mut playlists = Vec::new();
    for n in 0.. {
        let path = layout.on_the_go_path(n);
        if !path.exists() {
            break;
        }
        let indices = parse(&fs::read(&path)?, endian)?;
        log::debug!("On-The-Go file {} lists {} tracks", path.display(), indices.len());
        playlists.push(indices);
    }
    Ok(playlists)
}

/// Delete On-The-Go files once their contents are in the database
pub fn remove_all(layout: &DeviceLayout) -> Result<usize> {
    let mut removed = 0;
    for n in 0.. {
        let path = layout.on_the_go_path(n);
        if !path.exists() {
            break;
        }
        fs::remove_file(&path)?;
        removed += 1;
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_parse_written_file() {
        let bytes = to_bytes(&[4, 0, 2], Endian::Little).unwrap();
        assert_eq!(&bytes[..4], b"mhpo");
        assert_eq!(bytes.len(), 0x14 + 12);
        assert_eq!(parse(&bytes, Endian::Little).unwrap(), vec![4, 0, 2]);

        let big = to_bytes(&[7], Endian::Big).unwrap();
        assert_eq!(&big[..4], b"ophm");
        assert_eq!(parse(&big, Endian::Big).unwrap(), vec![7]);
    }

    #[test]
    fn test_scan_stops_at_first_missing_file() {
        let dir = TempDir::new().unwrap();
        let layout = DeviceLayout::new(dir.path());
        layout.init().unwrap();
        fs::write(layout.on_the_go_path(0), to_bytes(&[1], Endian::Little).unwrap()).unwrap();
        fs::write(layout.on_the_go_path(1), to_bytes(&[2, 3], Endian::Little).unwrap()).unwrap();
        fs::write(layout.on_the_go_path(3), to_bytes(&[9], Endian::Little).unwrap()).unwrap();

        let lists = load_all(&layout, Endian::Little).unwrap();
        assert_eq!(lists, vec![vec![1], vec![2, 3]]);

        assert_eq!(remove_all(&layout).unwrap(), 2);
        assert!(layout.on_the_go_path(3).exists());
    }

    #[test]
    fn test_wrong_tag() {
        let mut bytes = to_bytes(&[1], Endian::Little).unwrap();
        bytes[0] = b'x';
        assert!(parse(&bytes, Endian::Little).is_err());
    }

    #[test]
    fn test_count_past_end_is_format_error() {
        let mut bytes = to_bytes(&[1, 2], Endian::Little).unwrap();
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            parse(&bytes, Endian::Little),
            Err(Error::Format(FormatError::Truncated { .. }))
        ));

        let whole = to_bytes(&[1, 2, 3], Endian::Little).unwrap();
        assert!(parse(&whole[..whole.len() - 2], Endian::Little).is_err());
    }
}
