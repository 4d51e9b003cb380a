//! Track list (`mhlt`) and track (`mhit`) records

use super::detail::{DetailKind, DetailRecord};
use super::version::{self, header_len, RecordKind};
use crate::codec::{header_fields, ByteReader, ByteWriter, Endian, RawHeader, Tag};
use crate::error::FormatError;

pub const TRACK_LIST_TAG: Tag = Tag::new(b"mhlt");
pub const TRACK_TAG: Tag = Tag::new(b"mhit");

/// `has_artwork` values
pub const ARTWORK_PRESENT: u8 = 1;
pub const ARTWORK_ABSENT: u8 = 2;

/// Media type bits
pub mod media_type {
    pub const AUDIO: u32 = 0x01;
    pub const VIDEO: u32 = 0x02;
    pub const PODCAST: u32 = 0x04;
    pub const AUDIOBOOK: u32 = 0x08;
    pub const MUSIC_VIDEO: u32 = 0x20;
    pub const TV_SHOW: u32 = 0x40;
}

header_fields! {
    /// Fixed-width track metadata; fields appear as the format version grows
    pub struct TrackFields {
        id: u32 = 0x10 since 1,
        visible: u32 = 0x14 since 1,
        /// Four-character file type, e.g. `MP3 `, stored as an integer
        file_type: u32 = 0x18 since 1,
        vbr: u8 = 0x1c since 1,
        mp3_flag: u8 = 0x1d since 1,
        compilation: bool = 0x1e since 1,
        /// Stars times 20
        rating: u8 = 0x1f since 1,
        time_modified: u32 = 0x20 since 1,
        size: u32 = 0x24 since 1,
        duration_ms: u32 = 0x28 since 1,
        track_number: u32 = 0x2c since 1,
        track_count: u32 = 0x30 since 1,
        year: u32 = 0x34 since 1,
        bitrate: u32 = 0x38 since 1,
        /// Sample rate shifted left by 16
        sample_rate_fixed: u32 = 0x3c since 1,
        volume: i32 = 0x40 since 1,
        start_time: u32 = 0x44 since 1,
        stop_time: u32 = 0x48 since 1,
        sound_check: u32 = 0x4c since 1,
        play_count: u32 = 0x50 since 1,
        play_count_since_sync: u32 = 0x54 since 1,
        last_played: u32 = 0x58 since 1,
        disc_number: u32 = 0x5c since 1,
        disc_count: u32 = 0x60 since 1,
        drm_user_id: u32 = 0x64 since 1,
        time_added: u32 = 0x68 since 1,
        bookmark_time: u32 = 0x6c since 1,
        database_id: u64 = 0x70 since 1,
        checked: u8 = 0x78 since 1,
        app_rating: u8 = 0x79 since 1,
        bpm: u16 = 0x7a since 1,
        artwork_count: u16 = 0x7c since 1,
        artwork_size: u32 = 0x80 since 1,
        time_released: u32 = 0x8c since 1,
        skip_count: u32 = 0x9c since version::EXTENDED_TRACK,
        last_skipped: u32 = 0xa0 since version::EXTENDED_TRACK,
        has_artwork: u8 = 0xa4 since version::EXTENDED_TRACK,
        skip_when_shuffling: bool = 0xa5 since version::EXTENDED_TRACK,
        remember_position: bool = 0xa6 since version::EXTENDED_TRACK,
        podcast_flag: u8 = 0xa7 since version::EXTENDED_TRACK,
        database_id2: u64 = 0xa8 since version::EXTENDED_TRACK,
        has_lyrics: bool = 0xb0 since version::EXTENDED_TRACK,
        is_movie: bool = 0xb1 since version::EXTENDED_TRACK,
        mark_unplayed: u8 = 0xb2 since version::EXTENDED_TRACK,
        pregap: u32 = 0xb8 since version::EXTENDED_TRACK,
        sample_count: u64 = 0xbc since version::EXTENDED_TRACK,
        postgap: u32 = 0xc8 since version::EXTENDED_TRACK,
        media_type: u32 = 0xd0 since version::EXTENDED_TRACK,
        season_number: u32 = 0xd4 since version::EXTENDED_TRACK,
        episode_number: u32 = 0xd8 since version::EXTENDED_TRACK,
        gapless_data: u32 = 0xf8 since version::COUNTED_ITEM_CHILDREN,
        gapless_track: u16 = 0x100 since version::COUNTED_ITEM_CHILDREN,
        gapless_album: u16 = 0x102 since version::COUNTED_ITEM_CHILDREN,
        album_id: u32 = 0x120 since version::ALBUM_LIST,
        artwork_id: u32 = 0x160 since version::ALBUM_LIST,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackRecord {
    header: RawHeader,
    pub fields: TrackFields,
    pub details: Vec<DetailRecord>,
    trailing: Vec<u8>,
}

impl TrackRecord {
    /// A blank, visible audio track
    pub fn new(endian: Endian, version: u32) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::Track, version), endian),
            fields: TrackFields {
                visible: 1,
                has_artwork: ARTWORK_ABSENT,
                media_type: media_type::AUDIO,
                ..Default::default()
            },
            details: Vec::new(),
            trailing: Vec::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.header.endian()
    }

    pub fn id(&self) -> u32 {
        self.fields.id
    }

    pub fn database_id(&self) -> u64 {
        self.fields.database_id
    }

    pub fn string(&self, kind: DetailKind) -> Option<&str> {
        self.details
            .iter()
            .find(|d| d.kind() == Some(kind))
            .and_then(|d| d.text())
    }

    /// Set a string attribute; an empty value removes it
    pub fn set_string(&mut self, kind: DetailKind, value: &str) {
        if value.is_empty() {
            self.details.retain(|d| d.kind() != Some(kind));
            return;
        }
        match self.details.iter_mut().find(|d| d.kind() == Some(kind)) {
            Some(detail) => detail.set_text(value),
            None => {
                let endian = self.endian();
                self.details
                    .push(DetailRecord::string(endian, kind, value));
            }
        }
    }

    pub fn title(&self) -> &str {
        self.string(DetailKind::Title).unwrap_or_default()
    }

    pub fn artist(&self) -> &str {
        self.string(DetailKind::Artist).unwrap_or_default()
    }

    pub fn album(&self) -> &str {
        self.string(DetailKind::Album).unwrap_or_default()
    }

    pub fn genre(&self) -> &str {
        self.string(DetailKind::Genre).unwrap_or_default()
    }

    pub fn composer(&self) -> &str {
        self.string(DetailKind::Composer).unwrap_or_default()
    }

    /// Colon-separated path relative to the device root
    pub fn location(&self) -> Option<&str> {
        self.string(DetailKind::Location)
    }

    pub fn sample_rate(&self) -> u32 {
        self.fields.sample_rate_fixed >> 16
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        self.fields.sample_rate_fixed = rate << 16;
    }

    pub fn set_file_type(&mut self, extension: &str) {
        let mut code = [b' '; 4];
        for (slot, b) in code.iter_mut().zip(extension.to_ascii_uppercase().bytes()) {
            *slot = b;
        }
        self.fields.file_type = u32::from_be_bytes(code);
    }

    pub fn is_podcast(&self) -> bool {
        self.fields.media_type & media_type::PODCAST != 0 || self.fields.podcast_flag != 0
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, TRACK_TAG)?;
        let fields = TrackFields::decode(&header, version);
        let detail_count: u32 = header.value(0x0c);

        let mut details = Vec::new();
        for _ in 0..detail_count {
            details.push(DetailRecord::read(&mut body)?);
        }
        let trailing = body.read_bytes(body.remaining())?.to_vec();

        Ok(Self {
            header,
            fields,
            details,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        let mut header = self.header.clone();
        header.ensure_len(header_len(RecordKind::Track, version));
        self.fields.encode(&mut header, version);
        header.set_value(0x0c, self.details.len() as u32);

        let mut body = ByteWriter::new(w.endian());
        for detail in &self.details {
            detail.write(&mut body);
        }
        body.write_bytes(&self.trailing);

        header.write(w, TRACK_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}

/// The Library dataset's list of every track on the device
#[derive(Debug, Clone, PartialEq)]
pub struct TrackListRecord {
    header: RawHeader,
    pub tracks: Vec<TrackRecord>,
}

impl TrackListRecord {
    pub fn new(endian: Endian) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::List, 1), endian),
            tracks: Vec::new(),
        }
    }

    pub fn read(r: &mut ByteReader<'_>, version: u32) -> Result<Self, FormatError> {
        let (header, count) = RawHeader::read(r, TRACK_LIST_TAG)?;
        let mut tracks = Vec::new();
        for _ in 0..count {
            tracks.push(TrackRecord::read(r, version)?);
        }
        Ok(Self { header, tracks })
    }

    pub fn write(&self, w: &mut ByteWriter, version: u32) {
        self.header
            .write(w, TRACK_LIST_TAG, self.tracks.len() as u32);
        for track in &self.tracks {
            track.write(w, version);
        }
    }
}
