//! Device-bound signature over a serialized track database
//!
//! The digest covers the device identifier followed by the whole file with
//! the volatile header ranges (database ID, reserved block and the signature
//! slot itself) zeroed.

use crate::codec::Endian;
use crate::error::{FormatError, Result};
use crate::itunesdb::database::{HASHING_SCHEME_SHA, SIGNATURE_LEN, SIGNATURE_OFFSET};
use sha2::{Digest, Sha256};
use std::ops::Range;

/// Header ranges excluded from the digest
pub const ZEROED_RANGES: [Range<usize>; 3] = [0x18..0x20, 0x32..0x46, 0x58..0x6c];

const HASHING_SCHEME_OFFSET: usize = 0x30;

fn digest(bytes: &[u8], key: &str) -> Result<[u8; SIGNATURE_LEN]> {
    let end = ZEROED_RANGES.iter().map(|r| r.end).max().unwrap_or(0);
    if bytes.len() < end {
        return Err(FormatError::Truncated {
            offset: 0,
            wanted: end,
            available: bytes.len(),
        }
        .into());
    }

    let mut copy = bytes.to_vec();
    for range in ZEROED_RANGES {
        copy[range].fill(0);
    }

    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(&copy);
    let full = hasher.finalize();

    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&full[..SIGNATURE_LEN]);
    Ok(signature)
}

/// Mark the hashing scheme and embed the signature in place
pub fn sign(bytes: &mut [u8], key: &str, endian: Endian) -> Result<()> {
    let scheme = match endian {
        Endian::Little => HASHING_SCHEME_SHA.to_le_bytes(),
        Endian::Big => HASHING_SCHEME_SHA.to_be_bytes(),
    };
    if bytes.len() < HASHING_SCHEME_OFFSET + 2 {
        return Err(FormatError::Truncated {
            offset: HASHING_SCHEME_OFFSET,
            wanted: 2,
            available: bytes.len(),
        }
        .into());
    }
    bytes[HASHING_SCHEME_OFFSET..HASHING_SCHEME_OFFSET + 2].copy_from_slice(&scheme);

    let signature = digest(bytes, key)?;
    bytes[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN].copy_from_slice(&signature);
    log::debug!("Signed database ({} bytes)", bytes.len());
    Ok(())
}

pub fn verify(bytes: &[u8], key: &str) -> bool {
    match digest(bytes, key) {
        Ok(expected) => bytes[SIGNATURE_OFFSET..SIGNATURE_OFFSET + SIGNATURE_LEN] == expected,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itunesdb::DatabaseRecord;

    fn serialized() -> Vec<u8> {
        DatabaseRecord::new(Endian::Little, 25).to_bytes()
    }

    #[test]
    fn test_sign_then_verify() {
        let mut bytes = serialized();
        sign(&mut bytes, "000A27001234ABCD", Endian::Little).unwrap();
        assert!(verify(&bytes, "000A27001234ABCD"));
        assert!(!verify(&bytes, "other"));
        assert_eq!(&bytes[0x30..0x32], &[1, 0]);
    }

    #[test]
    fn test_zeroed_ranges_do_not_affect_signature() {
        let mut bytes = serialized();
        sign(&mut bytes, "key", Endian::Little).unwrap();
        bytes[0x18] ^= 0xff;
        bytes[0x40] ^= 0xff;
        assert!(verify(&bytes, "key"));

        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        assert!(!verify(&bytes, "key"));
    }

    #[test]
    fn test_too_short() {
        let mut bytes = vec![0u8; 0x40];
        assert!(sign(&mut bytes, "key", Endian::Little).is_err());
        assert!(!verify(&bytes, "key"));
    }
}
