//! Playlist list (`mhlp`), playlist (`mhyp`) and playlist item (`mhip`) records

use super::detail::{DetailBody, DetailKind, DetailRecord};
use super::version::{self, header_len, RecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const PLAYLIST_LIST_TAG: Tag = Tag::new(b"mhlp");
pub const PLAYLIST_TAG: Tag = Tag::new(b"mhyp");
pub const PLAYLIST_ITEM_TAG: Tag = Tag::new(b"mhip");

/// `podcast_group_flag` value marking a synthetic show header
pub const PODCAST_GROUP_FLAG: u32 = 0x100;

header_fields! {
    pub struct PlaylistFields {
        /// The hidden master playlist mirroring the whole library
        is_library: bool = 0x14 since 1,
        is_hidden: bool = 0x15 since 1,
        timestamp: u32 = 0x18 since 1,
        playlist_id: u64 = 0x1c since 1,
        podcast_flag: u16 = 0x2a since 1,
        sort_order: u32 = 0x2c since 1,
    }
}

header_fields! {
    pub struct PlaylistItemFields {
        podcast_group_flag: u32 = 0x10 since 1,
        group_id: u32 = 0x14 since 1,
        track_id: u32 = 0x18 since 1,
        timestamp: u32 = 0x1c since 1,
        podcast_group_ref: u32 = 0x20 since 1,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistItemRecord {
    header: RawHeader,
    pub fields: PlaylistItemFields,
    pub details: Vec<DetailRecord>,
    trailing: Vec<u8>,
}

impl PlaylistItemRecord {
    /// A regular item pointing at a track, carrying its position record
    pub fn for_track(endian: Endian, track_id: u32, position: u32) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::PlaylistItem, 1), endian),
            fields: PlaylistItemFields {
                track_id,
                ..Default::default()
            },
            details: vec![DetailRecord::position(endian, position)],
            trailing: Vec::new(),
        }
    }

    /// A podcast show header; it references no track
    pub fn podcast_group(endian: Endian, group_id: u32, title: &str) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::PlaylistItem, 1), endian),
            fields: PlaylistItemFields {
                podcast_group_flag: PODCAST_GROUP_FLAG,
                group_id,
                track_id: 0,
                ..Default::default()
            },
            details: vec![DetailRecord::string(endian, DetailKind::Title, title)],
            trailing: Vec::new(),
        }
    }

    pub fn track_id(&self) -> u32 {
        self.fields.track_id
    }

    pub fn is_podcast_group(&self) -> bool {
        self.fields.podcast_group_flag & PODCAST_GROUP_FLAG != 0
    }

    /// Title of a podcast group header
    pub fn title(&self) -> Option<&str> {
        self.details
            .iter()
            .find(|d| d.kind() == Some(DetailKind::Title))
            .and_then(|d| d.text())
    }

    pub fn position(&self) -> Option<u32> {
        self.details.iter().find_map(|d| match d.body {
            DetailBody::Position(p) => Some(p),
            _ => None,
        })
    }

    pub fn set_position(&mut self, position: u32) {
        match self
            .details
            .iter_mut()
            .find(|d| matches!(d.body, DetailBody::Position(_)))
        {
            Some(detail) => detail.body = DetailBody::Position(position),
            None => {
                let endian = self.header.endian();
                self.details.push(DetailRecord::position(endian, position));
            }
        }
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let offset = r.offset();
        let (header, total_len) = RawHeader::read(r, PLAYLIST_ITEM_TAG)?;
        let fields = PlaylistItemFields::decode(&header, version);
        let detail_count: u32 = header.value(0x0c);
        let extra = (total_len as usize)
            .checked_sub(header.len())
            .ok_or(FormatError::InvalidLength {
                tag: PLAYLIST_ITEM_TAG,
                offset,
                length: total_len,
            })?;

        let mut details = Vec::new();
        let trailing = if version >= version::COUNTED_ITEM_CHILDREN {
            let mut body = r.sub_reader(extra)?;
            for _ in 0..detail_count {
                details.push(DetailRecord::read(&mut body)?);
            }
            body.read_bytes(body.remaining())?.to_vec()
        } else {
            // Older files count only the header; children follow outside it
            let trailing = r.read_bytes(extra)?.to_vec();
            for _ in 0..detail_count {
                details.push(DetailRecord::read(r)?);
            }
            trailing
        };

        Ok(Self {
            header,
            fields,
            details,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::PlaylistItem, version));
        self.fields.encode(&mut header, version);
        header.set_value(0x0c, self.details.len() as u32);

        let mut children = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut children);
        }

        if version >= version::COUNTED_ITEM_CHILDREN {
            let total = header.len() + children.len() + self.trailing.len();
            header.write(w, PLAYLIST_ITEM_TAG, total as u32);
            w.write_bytes(children.as_slice());
            w.write_bytes(&self.trailing);
        } else {
            let total = header.len() + self.trailing.len();
            header.write(w, PLAYLIST_ITEM_TAG, total as u32);
            w.write_bytes(&self.trailing);
            w.write_bytes(children.as_slice());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistRecord {
    header: RawHeader,
    pub fields: PlaylistFields,
    pub details: Vec<DetailRecord>,
    pub items: Vec<PlaylistItemRecord>,
    trailing: Vec<u8>,
}

impl PlaylistRecord {
    pub fn new(endian: Endian, playlist_id: u64, name: &str) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::Playlist, 1), endian),
            fields: PlaylistFields {
                playlist_id,
                ..Default::default()
            },
            details: vec![DetailRecord::string(endian, DetailKind::Title, name)],
            items: Vec::new(),
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn playlist_id(&self) -> u64 {
        self.fields.playlist_id
    }

    pub fn name(&self) -> &str {
        self.details
            .iter()
            .find(|d| d.kind() == Some(DetailKind::Title))
            .and_then(|d| d.text())
            .unwrap_or_default()
    }

    pub fn set_name(&mut self, name: &str) {
        match self
            .details
            .iter_mut()
            .find(|d| d.kind() == Some(DetailKind::Title))
        {
            Some(detail) => detail.set_text(name),
            None => {
                let endian = self.endian();
                self.details
                    .insert(0, DetailRecord::string(endian, DetailKind::Title, name));
            }
        }
    }

    pub fn is_library(&self) -> bool {
        self.fields.is_library
    }

    pub fn is_podcast(&self) -> bool {
        self.fields.podcast_flag != 0
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Track IDs of the non-group items, in playlist order
    pub fn track_ids(&self) -> Vec<u32> {
        self.items
            .iter()
            .filter(|item| !item.is_podcast_group())
            .map(|item| item.track_id())
            .collect()
    }

    pub fn contains(&self, track_id: u32) -> bool {
        self.items.iter().any(|item| item.track_id() == track_id)
    }

    pub fn push_track(&mut self, track_id: u32) {
        let position = self.items.len() as u32;
        let endian = self.endian();
        self.items
            .push(PlaylistItemRecord::for_track(endian, track_id, position));
    }

    /// Remove every item referencing `track_id`; returns how many were removed
    pub fn remove_track(&mut self, track_id: u32) -> usize {
        let before = self.items.len();
        self.items.retain(|item| item.track_id() != track_id);
        let removed = before - self.items.len();
        if removed > 0 {
            self.renumber_positions();
        }
        removed
    }

    pub fn remove_at(&mut self, index: usize) -> Option<PlaylistItemRecord> {
        if index >= self.items.len() {
            return None;
        }
        let item = self.items.remove(index);
        self.renumber_positions();
        Some(item)
    }

    pub fn move_item(&mut self, from: usize, to: usize) -> bool {
        if from >= self.items.len() || to >= self.items.len() {
            return false;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.renumber_positions();
        true
    }

    /// Rewrite position records so they follow item order
    pub fn renumber_positions(&mut self) {
        for (position, item) in self
            .items
            .iter_mut()
            .filter(|item| !item.is_podcast_group())
            .enumerate()
        {
            item.set_position(position as u32);
        }
    }

    /// Number of string attributes, stored redundantly in the header
    fn string_detail_count(&self) -> u16 {
        self.details.iter().filter(|d| d.is_string_kind()).count() as u16
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, PLAYLIST_TAG)?;
        let fields = PlaylistFields::decode(&header, version);
        let detail_count: u32 = header.value(0x0c);
        let item_count: u32 = header.value(0x10);

        let mut details = Vec::new();
        for _ in 0..detail_count {
            details.push(DetailRecord::read(&mut body)?);
        }
        let mut items = Vec::new();
        for _ in 0..item_count {
            items.push(PlaylistItemRecord::read(&mut body, version)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            items,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::Playlist, version));
        self.fields.encode(&mut header, version);
        header.set_value(0x0c, self.details.len() as u32);
        header.set_value(0x10, self.items.len() as u32);
        header.set_value(0x28, self.string_detail_count());

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        for item in &self.items {
            item.write(&mut body, version);
        }
        body.write_bytes(&self.trailing);

        header.write(w, PLAYLIST_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistListRecord {
    header: RawHeader,
    pub playlists: Vec<PlaylistRecord>,
}

impl PlaylistListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::List, 1), endian),
            playlists: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn master(&self) -> Option<&PlaylistRecord> {
        self.playlists.iter().find(|p| p.is_library())
    }

    pub fn master_mut(&mut self) -> Option<&mut PlaylistRecord> {
        self.playlists.iter_mut().find(|p| p.is_library())
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, PLAYLIST_LIST_TAG)?;
        let mut playlists = Vec::new();
        for _ in 0..count {
            playlists.push(PlaylistRecord::read(r, version)?);
        }
        Ok(Self { header, playlists })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        self.header
            .write(w, PLAYLIST_LIST_TAG, self.playlists.len() as u32);
        for playlist in &self.playlists {
            playlist.write(w, version);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_item(item: &PlaylistItemRecord, version: u32) -> Vec<u8> {
        let mut w = ByteWriter::new(Endian::Little);
        item.write(&mut w, version);
        w.into_bytes()
    }

    fn total_len(bytes: &[u8]) -> u32 {
        u32::from_le_bytes(bytes[8..12].try_into().unwrap())
    }

    #[test]
    fn test_item_children_counted_from_thirteen() {
        let item = PlaylistItemRecord::for_track(Endian::Little, 60, 0);

        let modern = write_item(&item, 13);
        assert_eq!(total_len(&modern) as usize, modern.len());

        let legacy = write_item(&item, 12);
        assert_eq!(total_len(&legacy), 0x4c);
        assert_eq!(legacy.len(), 0x4c + 0x2c);

        let parsed = PlaylistItemRecord::read(&mut ByteReader::new(&legacy, Endian::Little), 12)
            .unwrap();
        assert_eq!(parsed.track_id(), 60);
        assert_eq!(parsed.position(), Some(0));
    }

    #[test]
    fn test_legacy_playlist_roundtrip() {
        let mut playlist = PlaylistRecord::new(Endian::Little, 7, "Road Trip");
        for id in [52, 53, 54] {
            playlist.push_track(id);
        }

        let mut w = ByteWriter::new(Endian::Little);
        playlist.write(&mut w, 11);
        let bytes = w.into_bytes();
        assert_eq!(total_len(&bytes) as usize, bytes.len());

        let mut r = ByteReader::new(&bytes, Endian::Little);
        let parsed = PlaylistRecord::read(&mut r, 11).unwrap();
        assert!(r.is_empty());
        assert_eq!(parsed.name(), "Road Trip");
        assert_eq!(parsed.track_ids(), vec![52, 53, 54]);
    }

    #[test]
    fn test_podcast_group_item() {
        let group = PlaylistItemRecord::podcast_group(Endian::Big, 900, "Science Friday");
        let mut w = ByteWriter::new(Endian::Big);
        group.write(&mut w, 25);
        let bytes = w.into_bytes();

        let parsed = PlaylistItemRecord::read(&mut ByteReader::new(&bytes, Endian::Big), 25).unwrap();
        assert!(parsed.is_podcast_group());
        assert_eq!(parsed.track_id(), 0);
        assert_eq!(parsed.fields.group_id, 900);
        assert_eq!(parsed.title(), Some("Science Friday"));
    }

    #[test]
    fn test_remove_and_move_keep_positions_dense() {
        let mut playlist = PlaylistRecord::new(Endian::Little, 1, "Mix");
        for id in 100..110 {
            playlist.push_track(id);
        }

        let removed = playlist.remove_at(4).unwrap();
        assert_eq!(removed.track_id(), 104);
        assert_eq!(playlist.len(), 9);
        assert!(!playlist.contains(104));

        assert!(playlist.move_item(0, 8));
        assert_eq!(playlist.track_ids()[8], 100);

        let positions: Vec<_> = playlist.items.iter().filter_map(|i| i.position()).collect();
        assert_eq!(positions, (0..9).collect::<Vec<u32>>());
    }

    #[test]
    fn test_remove_track_removes_duplicates() {
        let mut playlist = PlaylistRecord::new(Endian::Little, 1, "Repeat");
        playlist.push_track(5);
        playlist.push_track(6);
        playlist.push_track(5);
        assert_eq!(playlist.remove_track(5), 2);
        assert_eq!(playlist.track_ids(), vec![6]);
    }

    #[test]
    fn test_header_string_count() {
        let playlist = PlaylistRecord::new(Endian::Little, 1, "Named");
        let mut w = ByteWriter::new(Endian::Little);
        playlist.write(&mut w, 25);
        let bytes = w.into_bytes();
        assert_eq!(u16::from_le_bytes(bytes[0x28..0x2a].try_into().unwrap()), 1);
    }
}
