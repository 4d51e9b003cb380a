//! Four-character record tags

use std::fmt;

/// A record tag such as `mhbd` or `mhit`.
///
/// Tags are kept in their little-endian spelling. Big-endian databases store
/// every tag byte-reversed (`mhbd` is written as `dbhm`), so the reader and
/// writer flip them according to the database's endianness.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    pub const fn new(bytes: &[u8; 4]) -> Self {
        Tag(*bytes)
    }

    /// The tag as it appears on disk in a big-endian file
    pub fn reversed(self) -> Self {
        let [a, b, c, d] = self.0;
        Tag([d, c, b, a])
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Tag::new(b"mhbd").to_string(), "mhbd");
        assert_eq!(Tag([0, b'a', b'b', b'c']).to_string(), "\\x00abc");
    }

    #[test]
    fn test_reversed() {
        assert_eq!(Tag::new(b"mhbd").reversed(), Tag::new(b"dbhm"));
    }
}
