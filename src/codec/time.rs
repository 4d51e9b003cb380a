//! Timestamps counted in seconds since 1904-01-01 (the Mac epoch)

use chrono::{DateTime, Utc};

/// Seconds between 1904-01-01 and 1970-01-01
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Convert to a Mac timestamp, clamping to the representable range
pub fn to_mac_time(time: DateTime<Utc>) -> u32 {
    (time.timestamp() + MAC_EPOCH_OFFSET).clamp(0, u32::MAX as i64) as u32
}

/// Zero means "never" and maps to `None`
pub fn from_mac_time(value: u32) -> Option<DateTime<Utc>> {
    if value == 0 {
        return None;
    }
    DateTime::from_timestamp(value as i64 - MAC_EPOCH_OFFSET, 0)
}

pub fn mac_now() -> u32 {
    to_mac_time(Utc::now())
}
