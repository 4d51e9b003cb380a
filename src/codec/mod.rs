//! Binary codec primitives
//!
//! Endian-aware readers and writers shared by every on-device file format:
//! the track database, the artwork/photo databases, the play-counts and
//! On-The-Go side files and the equalizer presets.

mod bytes;
mod layout;
mod strings;
mod tag;
mod time;

pub use binrw::Endian;
pub use bytes::{ByteReader, ByteWriter};
pub(crate) use layout::header_fields;
pub use layout::{Field, HeaderValue, RawHeader, LIST_HEADER_LEN};
pub use strings::{decode_string, encode_string, encode_utf16, StringEncoding};
pub use tag::Tag;
pub use time::{from_mac_time, mac_now, to_mac_time};
