//! Format version thresholds and per-version header lengths
//!
//! This table is the single place that knows which version introduced what.
//! Record readers and writers consult it instead of branching on literals.

/// Newest format version this crate reads and writes
pub const MAX_VERSION: u32 = 25;

/// Extended track block: skip counts, media type, podcast and lyrics flags
pub const EXTENDED_TRACK: u32 = 12;

/// Gapless playback fields; playlist item children count towards the item's
/// total length; library sort indices on the master playlist
pub const COUNTED_ITEM_CHILDREN: u32 = 13;

/// Letter jump tables alongside the library sort indices
pub const JUMP_TABLES: u32 = 19;

/// Album list dataset and per-track album/artwork links
pub const ALBUM_LIST: u32 = 20;

/// Database signature over the serialized bytes
pub const SIGNED: u32 = 25;

/// Every version at which the layout changes, ascending
pub const THRESHOLDS: [u32; 5] = [
    EXTENDED_TRACK,
    COUNTED_ITEM_CHILDREN,
    JUMP_TABLES,
    ALBUM_LIST,
    SIGNED,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Database,
    DataSet,
    List,
    Track,
    Detail,
    Playlist,
    PlaylistItem,
    AlbumItem,
}

/// `(since, header length)` steps, ascending by version
const HEADER_LENGTHS: &[(RecordKind, &[(u32, u32)])] = &[
    (RecordKind::Database, &[(1, 0x68), (ALBUM_LIST, 0xbc)]),
    (RecordKind::DataSet, &[(1, 0x60)]),
    (RecordKind::List, &[(1, 0x5c)]),
    (
        RecordKind::Track,
        &[
            (1, 0x9c),
            (EXTENDED_TRACK, 0xf4),
            (COUNTED_ITEM_CHILDREN, 0x148),
            (ALBUM_LIST, 0x184),
        ],
    ),
    (RecordKind::Detail, &[(1, 0x18)]),
    (RecordKind::Playlist, &[(1, 0x6c)]),
    (RecordKind::PlaylistItem, &[(1, 0x4c)]),
    (RecordKind::AlbumItem, &[(1, 0x58)]),
];

/// Header length a record of `kind` needs to hold every field of `version`
pub fn header_len(kind: RecordKind, version: u32) -> u32 {
    HEADER_LENGTHS
        .iter()
        .find(|(k, _)| *k == kind)
        .and_then(|(_, steps)| {
            steps
                .iter()
                .rev()
                .find(|(since, _)| version >= *since)
                .map(|(_, len)| *len)
        })
        .unwrap_or(0x0c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thresholds_ascending() {
        assert!(THRESHOLDS.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*THRESHOLDS.last().unwrap(), MAX_VERSION);
    }

    #[test]
    fn test_track_header_grows_with_version() {
        assert_eq!(header_len(RecordKind::Track, 9), 0x9c);
        assert_eq!(header_len(RecordKind::Track, 12), 0xf4);
        assert_eq!(header_len(RecordKind::Track, 13), 0x148);
        assert_eq!(header_len(RecordKind::Track, 19), 0x148);
        assert_eq!(header_len(RecordKind::Track, 25), 0x184);
    }

    #[test]
    fn test_database_header_holds_signature_when_signed() {
        // Signature occupies 0x58..0x6c
        assert!(header_len(RecordKind::Database, SIGNED) >= 0x6c);
    }
}
