//! Round-trip validation of a track database file

use crate::engine::signature;
use crate::itunesdb::version::SIGNED;
use crate::itunesdb::{DatabaseRecord, PlaylistRecord, TrackRecord};
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// What a validation run found
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub version: u32,
    pub big_endian: bool,
    pub tracks: usize,
    pub playlists: usize,
    pub file_size: usize,
    /// Re-serializing produced the same bytes
    pub byte_identical: bool,
    /// `None` when the file is unsigned or no key was given
    pub signature_valid: Option<bool>,
}

fn track_summary(track: &TrackRecord) -> (String, String, String, Option<String>, u32) {
    (
        track.title().to_string(),
        track.artist().to_string(),
        track.album().to_string(),
        track.location().map(str::to_string),
        track.fields.duration_ms,
    )
}

fn playlist_summary(playlist: &PlaylistRecord) -> (String, Vec<u32>) {
    (playlist.name().to_string(), playlist.track_ids())
}

/// Parse a database, write it back out, parse that again and check both
/// parses describe the same tracks and playlists
pub fn validate_database(path: &Path, signing_key: Option<&str>) -> Result<ValidationReport> {
    log::info!("Validating database at: {:?}", path);

    let original =
        std::fs::read(path).with_context(|| format!("Failed to read database: {:?}", path))?;
    let first = DatabaseRecord::from_bytes(&original).context("Failed to parse database")?;
    let rewritten = first.to_bytes();
    let second =
        DatabaseRecord::from_bytes(&rewritten).context("Failed to parse re-serialized database")?;

    let tracks_before: HashMap<u64, _> = first
        .track_list()
        .map(|l| l.tracks.iter().map(|t| (t.database_id(), track_summary(t))).collect())
        .unwrap_or_default();
    let tracks_after: HashMap<u64, _> = second
        .track_list()
        .map(|l| l.tracks.iter().map(|t| (t.database_id(), track_summary(t))).collect())
        .unwrap_or_default();
    if tracks_before != tracks_after {
        anyhow::bail!("Tracks differ after a write/read round trip");
    }

    let playlists_before: HashMap<u64, _> = first
        .playlist_list()
        .map(|l| l.playlists.iter().map(|p| (p.playlist_id(), playlist_summary(p))).collect())
        .unwrap_or_default();
    let playlists_after: HashMap<u64, _> = second
        .playlist_list()
        .map(|l| l.playlists.iter().map(|p| (p.playlist_id(), playlist_summary(p))).collect())
        .unwrap_or_default();
    if playlists_before != playlists_after {
        anyhow::bail!("Playlists differ after a write/read round trip");
    }

    let signature_valid = match signing_key {
        Some(key) if first.version >= SIGNED => Some(signature::verify(&original, key)),
        _ => None,
    };

    let report = ValidationReport {
        version: first.version,
        big_endian: first.endian() == binrw::Endian::Big,
        tracks: tracks_before.len(),
        playlists: playlists_before.len(),
        file_size: original.len(),
        byte_identical: rewritten == original,
        signature_valid,
    };
    log::info!(
        "✅ Database v{} round-trips: {} tracks, {} playlists",
        report.version,
        report.tracks,
        report.playlists
    );
    if !report.byte_identical {
        log::debug!("Re-serialized bytes differ from the file (lengths or signature recomputed)");
    }
    Ok(report)
}
