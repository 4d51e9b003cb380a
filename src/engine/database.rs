//! Track database lifecycle: open, in-place mutation, save
//!
//! The record tree is parsed once at open. Tracks and playlists are mutated
//! in place; `save` renumbers, derives the podcast, index and album data,
//! serializes, signs and then moves media files on the device.

use super::device::Device;
use super::library_index::{rebuild_album_list, rebuild_indices};
use super::media::read_media_info;
use super::play_counts::{self, PlayCountEntry};
use super::podcast::group_podcasts;
use super::{otg, signature};
use crate::artwork::{ArtworkDatabase, ArtworkKind};
use crate::codec::{mac_now, Endian};
use crate::error::{Error, Result};
use crate::itunesdb::database::HASHING_SCHEME_SHA;
use crate::itunesdb::track::ARTWORK_PRESENT;
use crate::itunesdb::version::SIGNED;
use crate::itunesdb::{
    DataSet, DataSetKind, DatabaseRecord, DetailKind, PlaylistListRecord, PlaylistRecord,
    TrackRecord,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// First track ID handed out when renumbering
pub const FIRST_TRACK_ID: u32 = 52;

/// Name of the hidden master playlist of a fresh database
pub const MASTER_PLAYLIST_NAME: &str = "iPod";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseState {
    Loaded,
    Saving,
    /// The last save failed and the previous file was restored
    Failed,
}

/// Progress of the file copy phase of a save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveProgress {
    pub copied: usize,
    pub total: usize,
    pub percent: u32,
}

/// A track created since the last save
#[derive(Debug, Clone)]
struct PendingAddition {
    database_id: u64,
    source: Option<PathBuf>,
}

/// A media file to delete once the database no longer references it
#[derive(Debug, Clone)]
struct PendingRemoval {
    path: PathBuf,
    size: u64,
}

pub struct TrackDatabase<D: Device> {
    device: D,
    path: PathBuf,
    record: DatabaseRecord,
    state: DatabaseState,
    /// Play count file entries as found at open, by `DatabaseId`
    latest_play_counts: HashMap<u64, PlayCountEntry>,
    on_the_go: Vec<PlaylistRecord>,
    additions: Vec<PendingAddition>,
    removals: Vec<PendingRemoval>,
    artwork: Option<ArtworkDatabase>,
    id_counter: u64,
}

impl<D: Device> TrackDatabase<D> {
    pub fn open(device: D) -> Result<Self> {
        Self::open_with(device, false)
    }

    /// Open the device's database; with `create_fresh`, or when there is no
    /// database yet, start from an empty one at the newest version
    pub fn open_with(device: D, create_fresh: bool) -> Result<Self> {
        let layout = device.layout();
        let path = layout.database_path();

        let record = if create_fresh || !path.exists() {
            let endian = if device.is_big_endian() {
                Endian::Big
            } else {
                Endian::Little
            };
            log::info!("Creating an empty database for {}", device.mount_path().display());
            DatabaseRecord::new(endian, device.capabilities().max_database_version)
        } else {
            let bytes = fs::read(&path)?;
            let record = DatabaseRecord::from_bytes(&bytes)?;
            log::info!(
                "Loaded database v{} from {} ({} tracks)",
                record.version,
                path.display(),
                record.track_list().map_or(0, |l| l.tracks.len())
            );
            record
        };

        let artwork = if device.capabilities().supports_artwork() {
            Some(ArtworkDatabase::open(
                ArtworkKind::Covers,
                layout.artwork_database_path(),
                layout.artwork_dir(),
                device.capabilities().cover_formats.clone(),
                record.endian(),
            )?)
        } else {
            None
        };

        let mut db = Self {
            device,
            path,
            record,
            state: DatabaseState::Loaded,
            latest_play_counts: HashMap::new(),
            on_the_go: Vec::new(),
            additions: Vec::new(),
            removals: Vec::new(),
            artwork,
            id_counter: 0,
        };

        if db.record.fields.database_id == 0 {
            db.record.fields.database_id = db.generate_id();
        }
        db.ensure_master_playlist();
        db.drop_dangling_items();
        if !create_fresh {
            db.merge_play_counts();
            if let Err(e) = db.load_on_the_go() {
                log::warn!("Ignoring unreadable On-The-Go playlists: {}", e);
                db.on_the_go.clear();
            }
        }
        Ok(db)
    }

    fn ensure_master_playlist(&mut self) {
        if self.record.playlist_list().and_then(|l| l.master()).is_some() {
            return;
        }
        let endian = self.record.endian();
        let id = self.generate_id();
        let track_ids: Vec<u32> = self.tracks().iter().map(|t| t.id()).collect();

        let mut master = PlaylistRecord::new(endian, id, MASTER_PLAYLIST_NAME);
        master.fields.is_library = true;
        master.fields.is_hidden = true;
        master.fields.timestamp = mac_now();
        for track_id in track_ids {
            master.push_track(track_id);
        }
        self.record.playlist_list_mut().playlists.insert(0, master);
    }

    /// Skip playlist items whose track is gone
    fn drop_dangling_items(&mut self) {
        let known: HashSet<u32> = self.tracks().iter().map(|t| t.id()).collect();
        for playlist in &mut self.record.playlist_list_mut().playlists {
            let name = playlist.name().to_string();
            let before = playlist.items.len();
            playlist
                .items
                .retain(|item| item.is_podcast_group() || known.contains(&item.track_id()));
            let dropped = before - playlist.items.len();
            if dropped > 0 {
                log::warn!(
                    "Playlist '{}' referenced {} missing tracks; skipped",
                    name,
                    dropped
                );
                playlist.renumber_positions();
            }
        }
    }

    fn merge_play_counts(&mut self) {
        let path = self.device.layout().play_counts_path();
        let entries = match fs::read(&path) {
            Ok(bytes) => match play_counts::parse(&bytes, self.record.endian()) {
                Ok(entries) => entries,
                Err(e) => {
                    log::warn!("Ignoring unreadable play counts file: {}", e);
                    return;
                }
            },
            Err(_) => return,
        };

        let tracks = &mut self.record.track_list_mut().tracks;
        if entries.len() != tracks.len() {
            log::warn!(
                "Play counts file has {} entries for {} tracks",
                entries.len(),
                tracks.len()
            );
        }
        for (track, entry) in tracks.iter_mut().zip(entries) {
            let fields = &mut track.fields;
            fields.play_count = fields.play_count.saturating_add(entry.play_count);
            fields.play_count_since_sync = entry.play_count;
            fields.last_played = fields.last_played.max(entry.last_played);
            if entry.bookmark != 0 {
                fields.bookmark_time = entry.bookmark;
            }
            if let Some(rating) = entry.rating {
                fields.rating = rating.min(100) as u8;
            }
            if let Some(skips) = entry.skip_count {
                fields.skip_count = fields.skip_count.saturating_add(skips);
            }
            if let Some(last_skipped) = entry.last_skipped {
                fields.last_skipped = fields.last_skipped.max(last_skipped);
            }
            self.latest_play_counts.insert(track.database_id(), entry);
        }
        log::info!("Merged {} play count entries", self.latest_play_counts.len());
    }

    fn load_on_the_go(&mut self) -> Result<()> {
        let lists = otg::load_all(self.device.layout(), self.record.endian())?;
        let endian = self.record.endian();
        let track_ids: Vec<u32> = self.tracks().iter().map(|t| t.id()).collect();

        for (n, indices) in lists.into_iter().enumerate() {
            let mut playlist = PlaylistRecord::new(endian, 0, &format!("On-The-Go {}", n + 1));
            for index in indices {
                match track_ids.get(index as usize) {
                    Some(&id) => playlist.push_track(id),
                    None => log::warn!("On-The-Go list {} names missing track {}", n + 1, index),
                }
            }
            self.on_the_go.push(playlist);
        }
        Ok(())
    }

    /// Unique, non-zero 64-bit identifier
    fn generate_id(&mut self) -> u64 {
        loop {
            self.id_counter += 1;
            let seed = format!(
                "{}:{}:{}",
                self.path.display(),
                chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default(),
                self.id_counter
            );
            let digest = md5::compute(seed.as_bytes());
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&digest.0[..8]);
            let id = u64::from_le_bytes(bytes);

            let taken = id == 0
                || self.tracks().iter().any(|t| t.database_id() == id)
                || self.playlists().iter().any(|p| p.playlist_id() == id);
            if !taken {
                return id;
            }
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> DatabaseState {
        self.state
    }

    pub fn version(&self) -> u32 {
        self.record.version
    }

    pub fn endian(&self) -> Endian {
        self.record.endian()
    }

    pub fn record(&self) -> &DatabaseRecord {
        &self.record
    }

    pub fn artwork(&self) -> Option<&ArtworkDatabase> {
        self.artwork.as_ref()
    }

    // Tracks

    pub fn tracks(&self) -> &[TrackRecord] {
        self.record
            .track_list()
            .map(|l| l.tracks.as_slice())
            .unwrap_or_default()
    }

    pub fn track(&self, database_id: u64) -> Option<&TrackRecord> {
        self.tracks().iter().find(|t| t.database_id() == database_id)
    }

    pub fn track_mut(&mut self, database_id: u64) -> Option<&mut TrackRecord> {
        self.record
            .track_list_mut()
            .tracks
            .iter_mut()
            .find(|t| t.database_id() == database_id)
    }

    fn require_track(&self, database_id: u64) -> Result<&TrackRecord> {
        self.track(database_id)
            .ok_or_else(|| Error::NotFound(format!("track {:#x}", database_id)))
    }

    /// Play counts reported by the device since the last sync, apart from
    /// the cumulative totals merged into the track
    pub fn latest_play_count(&self, database_id: u64) -> Option<&PlayCountEntry> {
        self.latest_play_counts.get(&database_id)
    }

    /// Add an empty track to the library and the master playlist
    pub fn create_track(&mut self) -> &mut TrackRecord {
        let database_id = self.generate_id();
        let endian = self.record.endian();
        let version = self.record.version;
        let id = match self.tracks().iter().map(|t| t.id()).max() {
            None => FIRST_TRACK_ID,
            Some(max) => max
                .checked_add(1)
                .unwrap_or_else(|| self.free_track_id())
                .max(FIRST_TRACK_ID),
        };

        let mut track = TrackRecord::new(endian, version);
        track.fields.id = id;
        track.fields.database_id = database_id;
        track.fields.database_id2 = database_id;
        track.fields.time_added = mac_now();
        track.fields.time_modified = track.fields.time_added;

        if let Some(master) = self.record.playlist_list_mut().master_mut() {
            master.push_track(id);
        }
        self.additions.push(PendingAddition {
            database_id,
            source: None,
        });
        log::debug!("Created track {} ({:#x})", id, database_id);

        let tracks = &mut self.record.track_list_mut().tracks;
        tracks.push(track);
        let index = tracks.len() - 1;
        &mut tracks[index]
    }

    /// Lowest unused ID from the base up, for when the top of the range is taken
    fn free_track_id(&self) -> u32 {
        let used: HashSet<u32> = self.tracks().iter().map(|t| t.id()).collect();
        (FIRST_TRACK_ID..u32::MAX)
            .find(|id| !used.contains(id))
            .unwrap_or(FIRST_TRACK_ID)
    }

    /// Point a track created since the last save at the file to copy
    pub fn set_source_file(&mut self, database_id: u64, source: &Path) -> Result<()> {
        let size = fs::metadata(source)?.len();
        let addition = self
            .additions
            .iter_mut()
            .find(|a| a.database_id == database_id)
            .ok_or_else(|| Error::NotFound(format!("pending track {:#x}", database_id)))?;
        addition.source = Some(source.to_path_buf());

        let track = self
            .track_mut(database_id)
            .ok_or_else(|| Error::NotFound(format!("track {:#x}", database_id)))?;
        track.fields.size = size.min(u32::MAX as u64) as u32;
        if let Some(ext) = source.extension().and_then(|e| e.to_str()) {
            track.set_file_type(ext);
        }
        Ok(())
    }

    /// Create a track from a media file's tags and embedded cover
    pub fn import_file(&mut self, source: &Path) -> Result<u64> {
        let info = read_media_info(source)?;
        let track = self.create_track();
        let database_id = track.database_id();

        let strings = [
            (DetailKind::Title, &info.title),
            (DetailKind::Artist, &info.artist),
            (DetailKind::Album, &info.album),
            (DetailKind::Genre, &info.genre),
            (DetailKind::Composer, &info.composer),
        ];
        for (kind, value) in strings {
            if let Some(value) = value {
                track.set_string(kind, value);
            }
        }
        let fields = &mut track.fields;
        fields.duration_ms = info.duration_ms;
        fields.year = info.year.unwrap_or_default();
        fields.track_number = info.track_number.unwrap_or_default();
        fields.track_count = info.track_count.unwrap_or_default();
        fields.disc_number = info.disc_number.unwrap_or_default();
        fields.disc_count = info.disc_count.unwrap_or_default();
        fields.bitrate = info.bitrate.unwrap_or_default();
        if let Some(rate) = info.sample_rate {
            track.set_sample_rate(rate);
        }

        self.set_source_file(database_id, source)?;

        if let Some(artwork) = info.artwork {
            if self.artwork.is_some() {
                if let Err(e) = self.set_track_artwork(database_id, &artwork) {
                    log::warn!("Skipping artwork of {}: {}", source.display(), e);
                }
            }
        }

        log::info!("Imported {}", source.display());
        Ok(database_id)
    }

    /// Remove a track from the library, every playlist and the On-The-Go
    /// lists; its file is deleted at the next save
    pub fn remove_track(&mut self, database_id: u64) -> Result<()> {
        let track = self.require_track(database_id)?;
        let track_id = track.id();
        let location = track.location().map(str::to_string);
        let recorded_size = track.fields.size as u64;

        self.record
            .track_list_mut()
            .tracks
            .retain(|t| t.database_id() != database_id);
        for playlist in &mut self.record.playlist_list_mut().playlists {
            playlist.remove_track(track_id);
        }
        if let Some(DataSet::Podcasts(list)) = self.record.dataset_mut(DataSetKind::Podcasts) {
            for playlist in &mut list.playlists {
                playlist.remove_track(track_id);
            }
        }
        for playlist in &mut self.on_the_go {
            playlist.remove_track(track_id);
        }
        self.latest_play_counts.remove(&database_id);

        if let Some(artwork) = &mut self.artwork {
            artwork.remove_song_artwork(database_id);
        }

        let was_pending = self.additions.len();
        self.additions.retain(|a| a.database_id != database_id);
        if self.additions.len() == was_pending {
            if let Some(location) = location {
                let layout = self.device.layout();
                let path = layout.from_device_location(&location);
                if layout.is_on_device(&path) {
                    let size = fs::metadata(&path).map_or(recorded_size, |m| m.len());
                    self.removals.push(PendingRemoval { path, size });
                }
            }
        }
        log::debug!("Removed track {} ({:#x})", track_id, database_id);
        Ok(())
    }

    // Playlists

    /// Every playlist, the master playlist first
    pub fn playlists(&self) -> &[PlaylistRecord] {
        self.record
            .playlist_list()
            .map(|l| l.playlists.as_slice())
            .unwrap_or_default()
    }

    pub fn master_playlist(&self) -> Option<&PlaylistRecord> {
        self.record.playlist_list().and_then(|l| l.master())
    }

    pub fn playlist(&self, playlist_id: u64) -> Option<&PlaylistRecord> {
        self.playlists()
            .iter()
            .find(|p| p.playlist_id() == playlist_id)
    }

    /// Read-only playlists recorded on the device itself
    pub fn on_the_go(&self) -> &[PlaylistRecord] {
        &self.on_the_go
    }

    /// The podcast dataset as written at the last save or found at open
    pub fn podcast_playlists(&self) -> Option<&PlaylistListRecord> {
        self.record.podcast_list()
    }

    fn user_playlist_mut(&mut self, playlist_id: u64) -> Result<&mut PlaylistRecord> {
        let playlist = self
            .record
            .playlist_list_mut()
            .playlists
            .iter_mut()
            .find(|p| p.playlist_id() == playlist_id)
            .ok_or_else(|| Error::NotFound(format!("playlist {:#x}", playlist_id)))?;
        if playlist.is_library() {
            return Err(Error::Validation(
                "the master playlist follows the library and cannot be edited".to_string(),
            ));
        }
        Ok(playlist)
    }

    fn push_playlist(&mut self, mut playlist: PlaylistRecord) -> u64 {
        let id = playlist.playlist_id();
        playlist.fields.timestamp = mac_now();
        self.record.playlist_list_mut().playlists.push(playlist);
        id
    }

    pub fn create_playlist(&mut self, name: &str) -> u64 {
        let id = self.generate_id();
        let playlist = PlaylistRecord::new(self.record.endian(), id, name);
        log::debug!("Created playlist '{}'", name);
        self.push_playlist(playlist)
    }

    /// A playlist shown grouped by show in the podcast dataset
    pub fn create_podcast_playlist(&mut self, name: &str) -> u64 {
        let id = self.generate_id();
        let mut playlist = PlaylistRecord::new(self.record.endian(), id, name);
        playlist.fields.podcast_flag = 1;
        if !self.device.capabilities().supports_podcasts {
            log::warn!("Device does not show podcasts; '{}' stays a plain playlist", name);
        }
        self.push_playlist(playlist)
    }

    pub fn rename_playlist(&mut self, playlist_id: u64, name: &str) -> Result<()> {
        self.user_playlist_mut(playlist_id)?.set_name(name);
        Ok(())
    }

    pub fn remove_playlist(&mut self, playlist_id: u64) -> Result<()> {
        self.user_playlist_mut(playlist_id)?;
        self.record
            .playlist_list_mut()
            .playlists
            .retain(|p| p.playlist_id() != playlist_id);
        Ok(())
    }

    pub fn add_to_playlist(&mut self, playlist_id: u64, database_id: u64) -> Result<()> {
        let track_id = self.require_track(database_id)?.id();
        self.user_playlist_mut(playlist_id)?.push_track(track_id);
        Ok(())
    }

    /// Remove the item at `index`; later items move up by one
    pub fn remove_from_playlist(&mut self, playlist_id: u64, index: usize) -> Result<()> {
        self.user_playlist_mut(playlist_id)?
            .remove_at(index)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("playlist item {}", index)))
    }

    pub fn move_in_playlist(&mut self, playlist_id: u64, from: usize, to: usize) -> Result<()> {
        if self.user_playlist_mut(playlist_id)?.move_item(from, to) {
            Ok(())
        } else {
            Err(Error::NotFound(format!("playlist item {} or {}", from, to)))
        }
    }

    /// Turn an On-The-Go list into a regular playlist
    pub fn promote_on_the_go(&mut self, index: usize, name: &str) -> Result<u64> {
        if index >= self.on_the_go.len() {
            return Err(Error::NotFound(format!("On-The-Go playlist {}", index)));
        }
        let mut playlist = self.on_the_go.remove(index);
        let id = self.generate_id();
        playlist.fields.playlist_id = id;
        playlist.set_name(name);
        log::info!("Promoted On-The-Go playlist to '{}'", name);
        Ok(self.push_playlist(playlist))
    }

    // Artwork

    pub fn set_track_artwork(&mut self, database_id: u64, image_bytes: &[u8]) -> Result<()> {
        self.require_track(database_id)?;
        let artwork = self
            .artwork
            .as_mut()
            .ok_or_else(|| Error::Validation("device does not show cover art".to_string()))?;
        let (image_id, size) = artwork.set_song_artwork(database_id, image_bytes)?;

        if let Some(track) = self.track_mut(database_id) {
            track.fields.artwork_count = 1;
            track.fields.artwork_size = size;
            track.fields.has_artwork = ARTWORK_PRESENT;
            track.fields.artwork_id = image_id;
        }
        Ok(())
    }

    // Saving

    pub fn save(&mut self) -> Result<()> {
        self.save_with_progress(&mut |_| {})
    }

    pub fn save_with_progress(&mut self, progress: &mut dyn FnMut(SaveProgress)) -> Result<()> {
        log::info!("Saving database to {}", self.path.display());

        // Step 1: pending tracks must be complete
        let mut additions_size = 0u64;
        for addition in &self.additions {
            let track = self.require_track(addition.database_id)?;
            let source = addition.source.as_ref().ok_or_else(|| {
                Error::Validation(format!("track '{}' has no source file", track.title()))
            })?;
            let metadata = fs::metadata(source).map_err(|_| {
                Error::Validation(format!("source file {} does not exist", source.display()))
            })?;
            if track.fields.duration_ms == 0 {
                return Err(Error::Validation(format!(
                    "track '{}' has no duration",
                    track.title()
                )));
            }
            additions_size += metadata.len();
        }

        // Step 2: space admission, before anything is written
        let removals_size: u64 = self.removals.iter().map(|r| r.size).sum();
        let required = additions_size as i128 - removals_size as i128;
        let available = self.device.available_space()?;
        if required >= available as i128 {
            return Err(Error::InsufficientSpace {
                required: required.max(0) as u64,
                available,
            });
        }

        // Step 3: backup
        let backup = self.backup();

        self.state = DatabaseState::Saving;
        match self.write_all(progress) {
            Ok(()) => {
                self.additions.clear();
                self.removals.clear();
                self.state = DatabaseState::Loaded;
                log::info!("Saved {} tracks", self.tracks().len());
                Ok(())
            }
            Err(e) => {
                log::error!("Save failed: {}", e);
                self.restore(backup.as_deref());
                self.state = DatabaseState::Failed;
                Err(Error::Write(Box::new(e)))
            }
        }
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Copy the current file aside; best effort
    fn backup(&self) -> Option<PathBuf> {
        if !self.path.exists() {
            return None;
        }
        let backup = self.backup_path();
        match fs::copy(&self.path, &backup) {
            Ok(_) => Some(backup),
            Err(e) => {
                log::warn!("Skipping database backup: {}", e);
                None
            }
        }
    }

    fn restore(&self, backup: Option<&Path>) {
        let result = match backup {
            Some(backup) => fs::copy(backup, &self.path).map(|_| ()),
            None if self.path.exists() => fs::remove_file(&self.path),
            None => Ok(()),
        };
        match result {
            Ok(()) => log::info!("Restored previous database"),
            Err(e) => log::error!("Could not restore previous database: {}", e),
        }
    }

    /// Steps 4 to 8 of a save
    fn write_all(&mut self, progress: &mut dyn FnMut(SaveProgress)) -> Result<()> {
        self.device.layout().init()?;

        let mapping = self.renumber();
        self.assign_locations()?;
        self.derive_datasets(&mapping);

        let mut bytes = self.record.to_bytes();
        if self.record.version >= SIGNED {
            let key = self.device.firewire_id().unwrap_or_else(|| {
                log::warn!("No device identifier; signing with an empty key");
                ""
            });
            signature::sign(&mut bytes, key, self.record.endian())?;
        }
        fs::write(&self.path, &bytes)?;
        log::info!("Wrote {} bytes to {}", bytes.len(), self.path.display());

        self.copy_new_tracks(progress)?;

        if let Some(artwork) = &mut self.artwork {
            if artwork.has_pending_changes() {
                artwork.save()?;
            }
        }

        self.cleanup()
    }

    /// Renumber track IDs from the base and remap every playlist item;
    /// returns the substitution table
    fn renumber(&mut self) -> HashMap<u32, u32> {
        let mut mapping = HashMap::new();
        for (index, track) in self.record.track_list_mut().tracks.iter_mut().enumerate() {
            let new_id = FIRST_TRACK_ID + index as u32;
            mapping.insert(track.id(), new_id);
            track.fields.id = new_id;
        }

        let remap = |playlist: &mut PlaylistRecord| {
            let name = playlist.name().to_string();
            let before = playlist.items.len();
            playlist.items.retain_mut(|item| {
                if item.is_podcast_group() {
                    return true;
                }
                match mapping.get(&item.track_id()) {
                    Some(&new_id) => {
                        item.fields.track_id = new_id;
                        true
                    }
                    None => false,
                }
            });
            if playlist.items.len() != before {
                log::warn!(
                    "Dropped {} items of '{}' referencing missing tracks",
                    before - playlist.items.len(),
                    name
                );
                playlist.renumber_positions();
            }
        };
        self.record
            .playlist_list_mut()
            .playlists
            .iter_mut()
            .for_each(remap);
        self.on_the_go.iter_mut().for_each(remap);

        log::debug!("Renumbered {} tracks", mapping.len());
        mapping
    }

    /// Give every new track its on-device location
    fn assign_locations(&mut self) -> Result<()> {
        for addition in &self.additions {
            let Some(source) = &addition.source else {
                continue;
            };
            let layout = self.device.layout();
            let dest = if layout.is_on_device(source) {
                source.clone()
            } else {
                layout.music_file_path(source, addition.database_id)
            };
            let location = layout.to_device_location(&dest).ok_or_else(|| {
                Error::Validation(format!("{} is outside the device", dest.display()))
            })?;
            if let Some(track) = self
                .record
                .track_list_mut()
                .tracks
                .iter_mut()
                .find(|t| t.database_id() == addition.database_id)
            {
                track.set_string(DetailKind::Location, &location);
            }
        }
        Ok(())
    }

    /// Library indices, album list and podcast dataset
    fn derive_datasets(&mut self, mapping: &HashMap<u32, u32>) {
        let version = self.record.version;
        let endian = self.record.endian();

        let tracks = self.tracks().to_vec();
        if let Some(master) = self.record.playlist_list_mut().master_mut() {
            rebuild_indices(master, &tracks, version);
        }

        let album_list = rebuild_album_list(&mut self.record.track_list_mut().tracks, endian, version);
        match album_list {
            Some(list) => self.record.set_dataset(DataSet::AlbumList(list)),
            None => self.record.remove_dataset(DataSetKind::AlbumList),
        }

        if self.device.capabilities().supports_podcasts {
            let mut next_id = FIRST_TRACK_ID + mapping.len() as u32;
            let tracks = self.tracks();
            let playlists = self
                .record
                .playlist_list()
                .cloned()
                .unwrap_or_else(|| PlaylistListRecord::new(endian));
            let podcasts = group_podcasts(&playlists, tracks, &mut next_id);
            self.record.set_dataset(DataSet::Podcasts(podcasts));
        } else {
            self.record.remove_dataset(DataSetKind::Podcasts);
        }

        if version >= SIGNED {
            self.record.fields.hashing_scheme = HASHING_SCHEME_SHA;
        }
    }

    fn copy_new_tracks(&mut self, progress: &mut dyn FnMut(SaveProgress)) -> Result<()> {
        let total = self.additions.len();
        let mut last_percent = 0;
        for (copied, addition) in self.additions.iter().enumerate() {
            let Some(source) = &addition.source else {
                continue;
            };
            let layout = self.device.layout();
            if !layout.is_on_device(source) {
                let dest = layout.music_file_path(source, addition.database_id);
                layout.copy_music_file(source, &dest)?;
                log::debug!("Copied {} to {}", source.display(), dest.display());
            }

            let percent = ((copied + 1) * 100 / total) as u32;
            if percent >= last_percent + 10 || percent == 100 {
                last_percent = percent;
                progress(SaveProgress {
                    copied: copied + 1,
                    total,
                    percent,
                });
            }
        }
        if total == 0 {
            progress(SaveProgress {
                copied: 0,
                total: 0,
                percent: 100,
            });
        }
        Ok(())
    }

    /// Step 8: removed files, empty buckets, stale side files
    fn cleanup(&mut self) -> Result<()> {
        for removal in &self.removals {
            match fs::remove_file(&removal.path) {
                Ok(()) => log::debug!("Deleted {}", removal.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        let layout = self.device.layout();
        layout.remove_empty_buckets()?;

        let play_counts = layout.play_counts_path();
        if play_counts.exists() {
            fs::remove_file(&play_counts)?;
        }

        // On-The-Go files list track-list positions, which may have shifted
        otg::remove_all(layout)?;
        let positions: HashMap<u32, u32> = self
            .tracks()
            .iter()
            .enumerate()
            .map(|(index, t)| (t.id(), index as u32))
            .collect();
        for (n, playlist) in self.on_the_go.iter().enumerate() {
            let indices: Vec<u32> = playlist
                .track_ids()
                .iter()
                .filter_map(|id| positions.get(id).copied())
                .collect();
            let bytes = otg::to_bytes(&indices, self.record.endian())?;
            fs::write(layout.on_the_go_path(n), bytes)?;
        }
        Ok(())
    }
}

impl<D: Device> std::fmt::Debug for TrackDatabase<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackDatabase")
            .field("path", &self.path)
            .field("version", &self.record.version)
            .field("state", &self.state)
            .field("tracks", &self.tracks().len())
            .field("pending_additions", &self.additions.len())
            .field("pending_removals", &self.removals.len())
            .finish()
    }
}
