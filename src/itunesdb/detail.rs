//! Detail records (`mhod`): typed attributes attached to tracks, playlists,
//! playlist items and albums

use super::version::{header_len, RecordKind};
use crate::codec::{
    decode_string, encode_string, ByteReader, ByteWriter, Endian, RawHeader, StringEncoding, Tag,
};
use crate::error::FormatError;

pub const DETAIL_TAG: Tag = Tag::new(b"mhod");

/// Size of a playlist item position record
const POSITION_RECORD_LEN: u32 = 0x2c;

/// Padding between the count and the entries of a library index
const INDEX_PADDING: usize = 40;

/// Padding between the count and the entries of a jump table
const JUMP_TABLE_PADDING: usize = 8;

/// Detail type codes this crate knows by name
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetailKind {
    Title = 1,
    Location = 2,
    Album = 3,
    Artist = 4,
    Genre = 5,
    FileType = 6,
    EqSetting = 7,
    Comment = 8,
    Category = 9,
    Composer = 12,
    Grouping = 13,
    Description = 14,
    PodcastEnclosureUrl = 15,
    PodcastRssUrl = 16,
    ChapterData = 17,
    Subtitle = 18,
    TvShow = 19,
    TvEpisode = 20,
    TvNetwork = 21,
    AlbumArtist = 22,
    SortArtist = 23,
    Keywords = 24,
    SortTitle = 27,
    SortAlbum = 28,
    SortAlbumArtist = 29,
    SortComposer = 30,
    SortTvShow = 31,
    SmartPlaylistPrefs = 50,
    SmartPlaylistRules = 51,
    LibraryIndex = 52,
    LibraryJumpTable = 53,
    PlaylistPosition = 100,
    AlbumListAlbum = 200,
    AlbumListArtist = 201,
    AlbumListSortArtist = 202,
    AlbumListPodcastUrl = 203,
    AlbumListShow = 204,
}

impl DetailKind {
    pub fn from_code(code: u32) -> Option<Self> {
        use DetailKind::*;
        Some(match code {
            1 => Title,
            2 => Location,
            3 => Album,
            4 => Artist,
            5 => Genre,
            6 => FileType,
            7 => EqSetting,
            8 => Comment,
            9 => Category,
            12 => Composer,
            13 => Grouping,
            14 => Description,
            15 => PodcastEnclosureUrl,
            16 => PodcastRssUrl,
            17 => ChapterData,
            18 => Subtitle,
            19 => TvShow,
            20 => TvEpisode,
            21 => TvNetwork,
            22 => AlbumArtist,
            23 => SortArtist,
            24 => Keywords,
            27 => SortTitle,
            28 => SortAlbum,
            29 => SortAlbumArtist,
            30 => SortComposer,
            31 => SortTvShow,
            50 => SmartPlaylistPrefs,
            51 => SmartPlaylistRules,
            52 => LibraryIndex,
            53 => LibraryJumpTable,
            100 => PlaylistPosition,
            200 => AlbumListAlbum,
            201 => AlbumListArtist,
            202 => AlbumListSortArtist,
            203 => AlbumListPodcastUrl,
            204 => AlbumListShow,
            _ => return None,
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    /// Kinds stored with the string sub-header (encoding + length)
    pub fn is_string(self) -> bool {
        use DetailKind::*;
        !matches!(
            self,
            PodcastEnclosureUrl
                | PodcastRssUrl
                | ChapterData
                | SmartPlaylistPrefs
                | SmartPlaylistRules
                | LibraryIndex
                | LibraryJumpTable
                | PlaylistPosition
        )
    }
}

/// Sort order of a library index
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSort {
    Title = 0x03,
    Album = 0x04,
    Artist = 0x05,
    Genre = 0x07,
    Composer = 0x12,
}

impl IndexSort {
    pub const ALL: [IndexSort; 5] = [
        IndexSort::Title,
        IndexSort::Album,
        IndexSort::Artist,
        IndexSort::Genre,
        IndexSort::Composer,
    ];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringDetail {
    pub kind: DetailKind,
    pub value: String,
    pub encoding: StringEncoding,
    /// The two words following the length, kept as found
    pub reserved: [u32; 2],
}

/// One letter of a jump table: the run of index positions starting with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpEntry {
    pub letter: u16,
    pub start: u32,
    pub count: u32,
}

/// Per-type payload of a detail record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailBody {
    String(StringDetail),
    /// Podcast URLs are bare UTF-8 without a string sub-header
    Url { kind: DetailKind, value: String },
    /// Chapter data is carried through uninterpreted
    ChapterData(Vec<u8>),
    /// Track-list positions of every library track in a sort order
    LibraryIndex { sort: u32, indices: Vec<u32> },
    LibraryJumpTable { sort: u32, entries: Vec<JumpEntry> },
    /// Position of a playlist item within its playlist
    Position(u32),
    /// Type codes this crate does not interpret, re-emitted verbatim
    Unrecognized { type_code: u32, data: Vec<u8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    header: RawHeader,
    pub body: DetailBody,
    /// Bytes left in the record after the interpreted payload
    trailing: Vec<u8>,
}

impl DetailRecord {
    fn with_body(endian: Endian, body: DetailBody, trailing: Vec<u8>) -> Self {
        Self {
            header: RawHeader::zeroed(header_len(RecordKind::Detail, 1), endian),
            body,
            trailing,
        }
    }

    /// A string attribute encoded as UTF-16 in the database's byte order
    pub fn string(endian: Endian, kind: DetailKind, value: impl Into<String>) -> Self {
        let value = value.into();
        let body = match kind {
            DetailKind::PodcastEnclosureUrl | DetailKind::PodcastRssUrl => {
                DetailBody::Url { kind, value }
            }
            _ => DetailBody::String(StringDetail {
                kind,
                value,
                encoding: StringEncoding::Utf16,
                reserved: [0, 0],
            }),
        };
        Self::with_body(endian, body, Vec::new())
    }

    pub fn position(endian: Endian, position: u32) -> Self {
        let padding = (POSITION_RECORD_LEN - header_len(RecordKind::Detail, 1) - 4) as usize;
        Self::with_body(endian, DetailBody::Position(position), vec![0; padding])
    }

    pub fn library_index(endian: Endian, sort: IndexSort, indices: Vec<u32>) -> Self {
        Self::with_body(
            endian,
            DetailBody::LibraryIndex {
                sort: sort as u32,
                indices,
            },
            Vec::new(),
        )
    }

    pub fn jump_table(endian: Endian, sort: IndexSort, entries: Vec<JumpEntry>) -> Self {
        Self::with_body(
            endian,
            DetailBody::LibraryJumpTable {
                sort: sort as u32,
                entries,
            },
            Vec::new(),
        )
    }

    pub fn type_code(&self) -> u32 {
        match &self.body {
            DetailBody::String(s) => s.kind.code(),
            DetailBody::Url { kind, .. } => kind.code(),
            DetailBody::ChapterData(_) => DetailKind::ChapterData.code(),
            DetailBody::LibraryIndex { .. } => DetailKind::LibraryIndex.code(),
            DetailBody::LibraryJumpTable { .. } => DetailKind::LibraryJumpTable.code(),
            DetailBody::Position(_) => DetailKind::PlaylistPosition.code(),
            DetailBody::Unrecognized { type_code, .. } => *type_code,
        }
    }

    pub fn kind(&self) -> Option<DetailKind> {
        DetailKind::from_code(self.type_code())
    }

    /// The text of string and URL attributes
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            DetailBody::String(s) => Some(&s.value),
            DetailBody::Url { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Replace the text of a string or URL attribute; other kinds are left alone
    pub fn set_text(&mut self, text: impl Into<String>) {
        match &mut self.body {
            DetailBody::String(s) => s.value = text.into(),
            DetailBody::Url { value, .. } => *value = text.into(),
            _ => {}
        }
    }

    pub fn is_string_kind(&self) -> bool {
        matches!(self.body, DetailBody::String(_))
    }

    pub fn read(r: &mut ByteReader<'_>) -> Result<Self, FormatError> {
        let (header, mut body) = RawHeader::read_with_body(r, DETAIL_TAG)?;
        let type_code: u32 = header.value(0x0c);
        let total_len = header.len() + body.remaining();
        let endian = r.endian();

        let parsed = match DetailKind::from_code(type_code) {
            Some(kind) if kind.is_string() => {
                let flag = body.read_u32()?;
                let len = body.read_u32()? as usize;
                let reserved = [body.read_u32()?, body.read_u32()?];
                let encoding = if flag == 2 {
                    StringEncoding::Utf8
                } else {
                    StringEncoding::Utf16
                };
                let value = decode_string(body.read_bytes(len)?, encoding, endian);
                DetailBody::String(StringDetail {
                    kind,
                    value,
                    encoding,
                    reserved,
                })
            }
            Some(kind @ (DetailKind::PodcastEnclosureUrl | DetailKind::PodcastRssUrl)) => {
                let bytes = body.read_bytes(body.remaining())?;
                DetailBody::Url {
                    kind,
                    value: decode_string(bytes, StringEncoding::Utf8, endian),
                }
            }
            Some(DetailKind::ChapterData) => {
                DetailBody::ChapterData(body.read_bytes(body.remaining())?.to_vec())
            }
            Some(DetailKind::LibraryIndex) => {
                let sort = body.read_u32()?;
                let count = body.read_u32()? as usize;
                body.skip(INDEX_PADDING)?;
                if count * 4 > body.remaining() {
                    return Err(FormatError::Truncated {
                        offset: body.offset(),
                        wanted: count * 4,
                        available: body.remaining(),
                    });
                }
                let indices = (0..count)
                    .map(|_| body.read_u32())
                    .collect::<Result<Vec<_>, _>>()?;
                DetailBody::LibraryIndex { sort, indices }
            }
            Some(DetailKind::LibraryJumpTable) => {
                let sort = body.read_u32()?;
                let count = body.read_u32()? as usize;
                body.skip(JUMP_TABLE_PADDING)?;
                if count * 12 > body.remaining() {
                    return Err(FormatError::Truncated {
                        offset: body.offset(),
                        wanted: count * 12,
                        available: body.remaining(),
                    });
                }
                let mut entries = Vec::with_capacity(count);
                for _ in 0..count {
                    let letter = body.read_u16()?;
                    body.skip(2)?;
                    let start = body.read_u32()?;
                    let count = body.read_u32()?;
                    entries.push(JumpEntry {
                        letter,
                        start,
                        count,
                    });
                }
                DetailBody::LibraryJumpTable { sort, entries }
            }
            // Playlists use type 100 for a much larger column-preferences
            // block; only the item-sized record is a position
            Some(DetailKind::PlaylistPosition) if total_len == POSITION_RECORD_LEN as usize => {
                DetailBody::Position(body.read_u32()?)
            }
            _ => DetailBody::Unrecognized {
                type_code,
                data: body.read_bytes(body.remaining())?.to_vec(),
            },
        };

        let trailing = body.read_bytes(body.remaining())?.to_vec();
        Ok(Self {
            header,
            body: parsed,
            trailing,
        })
    }

    pub fn write(&self, w: &mut ByteWriter) {
        let mut body = ByteWriter::new(w.endian());
        match &self.body {
            DetailBody::String(s) => {
                let bytes = encode_string(&s.value, s.encoding, w.endian());
                body.write_u32(match s.encoding {
                    StringEncoding::Utf16 => 1,
                    StringEncoding::Utf8 => 2,
                });
                body.write_u32(bytes.len() as u32);
                body.write_u32(s.reserved[0]);
                body.write_u32(s.reserved[1]);
                body.write_bytes(&bytes);
            }
            DetailBody::Url { value, .. } => body.write_bytes(value.as_bytes()),
            DetailBody::ChapterData(data) => body.write_bytes(data),
            DetailBody::LibraryIndex { sort, indices } => {
                body.write_u32(*sort);
                body.write_u32(indices.len() as u32);
                body.write_zeros(INDEX_PADDING);
                for index in indices {
                    body.write_u32(*index);
                }
            }
            DetailBody::LibraryJumpTable { sort, entries } => {
                body.write_u32(*sort);
                body.write_u32(entries.len() as u32);
                body.write_zeros(JUMP_TABLE_PADDING);
                for entry in entries {
                    body.write_u16(entry.letter);
                    body.write_u16(0);
                    body.write_u32(entry.start);
                    body.write_u32(entry.count);
                }
            }
            DetailBody::Position(position) => body.write_u32(*position),
            DetailBody::Unrecognized { data, .. } => body.write_bytes(data),
        }
        body.write_bytes(&self.trailing);

        let mut header = self.header.clone();
        header.set_value(0x0c, self.type_code());
        header.write(w, DETAIL_TAG, (header.len() + body.len()) as u32);
        w.write_bytes(body.as_slice());
    }
}
