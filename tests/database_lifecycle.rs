use pod_database::config::Capabilities;
use pod_database::engine::{open_photo_database, Device, DeviceLayout, FIRST_TRACK_ID};
use pod_database::itunesdb::track::ARTWORK_PRESENT;
use pod_database::itunesdb::DetailKind;
use pod_database::{DeviceConfig, DeviceModel, Error, MountedDevice, TrackDatabase};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

/// Device with a fixed amount of free space
struct FixedSpaceDevice {
    layout: DeviceLayout,
    capabilities: Capabilities,
    available: u64,
}

impl Device for FixedSpaceDevice {
    fn layout(&self) -> &DeviceLayout {
        &self.layout
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn available_space(&self) -> pod_database::Result<u64> {
        Ok(self.available)
    }

    fn used_space(&self) -> pod_database::Result<u64> {
        Ok(0)
    }

    fn is_big_endian(&self) -> bool {
        false
    }

    fn firewire_id(&self) -> Option<&str> {
        None
    }
}

fn mounted(dir: &TempDir, model: DeviceModel) -> MountedDevice {
    let config = DeviceConfig::new(dir.path().join("ipod"))
        .with_model(model)
        .with_capacity(100_000_000);
    MountedDevice::new(&config).unwrap()
}

/// Create a track backed by a dummy source file of `size` bytes
fn add_track<D: Device>(
    db: &mut TrackDatabase<D>,
    dir: &TempDir,
    title: &str,
    album: &str,
    size: usize,
) -> u64 {
    let source = dir.path().join(format!("{}.mp3", title));
    fs::write(&source, vec![0u8; size]).unwrap();

    let track = db.create_track();
    track.set_string(DetailKind::Title, title);
    track.set_string(DetailKind::Artist, "Test Artist");
    track.set_string(DetailKind::Album, album);
    track.fields.duration_ms = 180_000; // 3 minutes
    let database_id = track.database_id();
    db.set_source_file(database_id, &source).unwrap();
    database_id
}

fn cover_png() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(300, 200, image::Rgb([200, 40, 40]));
    let mut bytes = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut bytes, image::ImageFormat::Png)
        .unwrap();
    bytes.into_inner()
}

#[test]
fn test_new_tracks_get_increasing_ids_from_base() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    for title in ["one", "two", "three"] {
        add_track(&mut db, &dir, title, "Album", 1000);
    }
    db.save().unwrap();

    let ids: Vec<u32> = db.tracks().iter().map(|t| t.id()).collect();
    assert_eq!(ids, vec![FIRST_TRACK_ID, FIRST_TRACK_ID + 1, FIRST_TRACK_ID + 2]);
    assert_eq!(db.master_playlist().unwrap().track_ids(), ids);
}

#[test]
fn test_roundtrip_by_database_id() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let ids: Vec<u64> = ["alpha", "beta"]
        .iter()
        .map(|title| add_track(&mut db, &dir, title, "Record", 2000))
        .collect();
    db.save().unwrap();

    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    assert_eq!(reopened.tracks().len(), 2);
    for (database_id, title) in ids.iter().zip(["alpha", "beta"]) {
        let track = reopened.track(*database_id).unwrap();
        assert_eq!(track.title(), title);
        assert_eq!(track.album(), "Record");
        assert_eq!(track.fields.duration_ms, 180_000);
        assert_eq!(track.fields.size, 2000);

        let location = track.location().unwrap();
        assert!(location.starts_with(":iPod_Control:Music:F"));
        assert!(reopened.device().layout().from_device_location(location).exists());
    }
}

#[test]
fn test_renumbering_after_removal() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let ids: Vec<u64> = (0..4)
        .map(|i| add_track(&mut db, &dir, &format!("t{}", i), "Album", 500))
        .collect();
    let playlist = db.create_playlist("Mix");
    for id in ids.iter().rev() {
        db.add_to_playlist(playlist, *id).unwrap();
    }
    db.save().unwrap();

    let removed_file = {
        let location = db.track(ids[1]).unwrap().location().unwrap().to_string();
        db.device().layout().from_device_location(&location)
    };
    assert!(removed_file.exists());

    db.remove_track(ids[1]).unwrap();
    db.save().unwrap();
    assert!(!removed_file.exists());

    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let track_ids: Vec<u32> = reopened.tracks().iter().map(|t| t.id()).collect();
    assert_eq!(track_ids, vec![FIRST_TRACK_ID, FIRST_TRACK_ID + 1, FIRST_TRACK_ID + 2]);

    // Playlist items follow the renumbered tracks: t3, t2, t0
    let titles: Vec<String> = reopened
        .playlist(playlist)
        .unwrap()
        .track_ids()
        .iter()
        .map(|id| {
            reopened
                .tracks()
                .iter()
                .find(|t| t.id() == *id)
                .unwrap()
                .title()
                .to_string()
        })
        .collect();
    assert_eq!(titles, vec!["t3", "t2", "t0"]);
}

#[test]
fn test_remove_index_four_of_ten() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let ids: Vec<u64> = (0..10)
        .map(|i| add_track(&mut db, &dir, &format!("song{}", i), "Album", 100))
        .collect();
    let playlist = db.create_playlist("Ten");
    for id in &ids {
        db.add_to_playlist(playlist, *id).unwrap();
    }
    db.save().unwrap();

    // Dropping the item keeps the track in the library
    let before = db.playlist(playlist).unwrap().track_ids();
    db.remove_from_playlist(playlist, 4).unwrap();
    let after = db.playlist(playlist).unwrap();
    let mut expected = before;
    expected.remove(4);
    assert_eq!(after.track_ids(), expected);
    let positions: Vec<Option<u32>> = after.items.iter().map(|i| i.position()).collect();
    assert_eq!(positions, (0..9).map(Some).collect::<Vec<_>>());
    assert_eq!(db.tracks().len(), 10);
    assert!(db.remove_from_playlist(playlist, 9).is_err());

    // Removing the track deletes its file at save
    let removed_file = {
        let location = db.track(ids[4]).unwrap().location().unwrap().to_string();
        db.device().layout().from_device_location(&location)
    };
    assert!(removed_file.exists());
    db.remove_track(ids[4]).unwrap();
    db.save().unwrap();
    assert!(!removed_file.exists());

    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let dense: Vec<u32> = (FIRST_TRACK_ID..FIRST_TRACK_ID + 9).collect();
    let track_ids: Vec<u32> = reopened.tracks().iter().map(|t| t.id()).collect();
    assert_eq!(track_ids, dense);
    assert!(reopened.track(ids[4]).is_none());

    let titles: Vec<&str> = reopened.tracks().iter().map(|t| t.title()).collect();
    let expected_titles: Vec<String> = (0..10)
        .filter(|i| *i != 4)
        .map(|i| format!("song{}", i))
        .collect();
    assert_eq!(titles, expected_titles);

    let items = reopened.playlist(playlist).unwrap();
    assert_eq!(items.track_ids(), dense);
    assert_eq!(reopened.master_playlist().unwrap().track_ids(), dense);
}

#[test]
fn test_podcast_episodes_grouped_by_album() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let first = add_track(&mut db, &dir, "Episode 1", "The Show", 100);
    let second = add_track(&mut db, &dir, "Episode 2", "The Show", 100);
    let podcasts = db.create_podcast_playlist("Podcasts");
    db.add_to_playlist(podcasts, first).unwrap();
    db.add_to_playlist(podcasts, second).unwrap();
    db.save().unwrap();

    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let grouped = reopened
        .podcast_playlists()
        .unwrap()
        .playlists
        .iter()
        .find(|p| p.playlist_id() == podcasts)
        .unwrap();
    assert_eq!(grouped.items.len(), 3);

    let header = &grouped.items[0];
    assert!(header.is_podcast_group());
    assert_eq!(header.track_id(), 0);
    assert_eq!(header.title(), Some("The Show"));
    for episode in &grouped.items[1..] {
        assert!(!episode.is_podcast_group());
        assert_eq!(episode.fields.podcast_group_ref, header.fields.group_id);
    }

    // The playlists dataset keeps the flat list
    assert_eq!(reopened.playlist(podcasts).unwrap().len(), 2);
}

#[test]
fn test_podcast_dataset_absent_without_support() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Mini)).unwrap();
    add_track(&mut db, &dir, "song", "Album", 100);
    db.save().unwrap();
    assert!(db.podcast_playlists().is_none());
}

#[test]
fn test_space_admission() {
    let dir = TempDir::new().unwrap();
    let device = |available| FixedSpaceDevice {
        layout: DeviceLayout::new(dir.path().join("ipod")),
        capabilities: DeviceModel::Generic.capabilities(),
        available,
    };

    // Exactly as much as is free is refused
    let mut db = TrackDatabase::open(device(2000)).unwrap();
    add_track(&mut db, &dir, "a", "Album", 1000);
    add_track(&mut db, &dir, "b", "Album", 1000);
    match db.save() {
        Err(Error::InsufficientSpace {
            required,
            available,
        }) => {
            assert_eq!(required, 2000);
            assert_eq!(available, 2000);
        }
        other => panic!("expected insufficient space, got {:?}", other),
    }
    assert!(!dir.path().join("ipod/iPod_Control/iTunes/iTunesDB").exists());

    // Nothing to copy still needs room for the database itself
    let mut db = TrackDatabase::open(device(0)).unwrap();
    assert!(matches!(
        db.save(),
        Err(Error::InsufficientSpace {
            required: 0,
            available: 0
        })
    ));

    // One byte more is enough
    let mut db = TrackDatabase::open(device(2001)).unwrap();
    add_track(&mut db, &dir, "a", "Album", 1000);
    add_track(&mut db, &dir, "b", "Album", 1000);
    db.save().unwrap();
}

#[test]
fn test_space_freed_by_removals_counts() {
    let dir = TempDir::new().unwrap();
    let device = |available| FixedSpaceDevice {
        layout: DeviceLayout::new(dir.path().join("ipod")),
        capabilities: DeviceModel::Generic.capabilities(),
        available,
    };

    let mut db = TrackDatabase::open(device(10_000)).unwrap();
    let old = add_track(&mut db, &dir, "old", "Album", 3000);
    db.save().unwrap();

    let mut db = TrackDatabase::open(device(1000)).unwrap();
    db.remove_track(old).unwrap();
    add_track(&mut db, &dir, "new", "Album", 3500);
    // 3500 - 3000 = 500 < 1000
    db.save().unwrap();
    assert_eq!(db.tracks().len(), 1);
}

#[test]
fn test_track_artwork() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let database_id = add_track(&mut db, &dir, "covered", "Album", 100);
    db.set_track_artwork(database_id, &cover_png()).unwrap();
    db.save().unwrap();

    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    let track = reopened.track(database_id).unwrap();
    assert_eq!(track.fields.has_artwork, ARTWORK_PRESENT);
    assert_eq!(track.fields.artwork_count, 1);

    let artwork = reopened.artwork().unwrap();
    let image = artwork.image_for_song(database_id).unwrap();
    assert_eq!(track.fields.artwork_id, image.image_id());

    let layout = reopened.device().layout();
    for format in &DeviceModel::Video.capabilities().cover_formats {
        let thumbs = layout.artwork_dir().join(format.file_name());
        assert_eq!(fs::metadata(&thumbs).unwrap().len(), format.byte_size() as u64);
    }
}

#[test]
fn test_artwork_rejected_without_support() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Generic)).unwrap();
    let database_id = add_track(&mut db, &dir, "plain", "Album", 100);
    assert!(db.set_track_artwork(database_id, &cover_png()).is_err());
}

#[test]
fn test_big_endian_database() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Mobile)).unwrap();
    let database_id = add_track(&mut db, &dir, "swapped", "Album", 100);
    db.save().unwrap();

    let bytes = fs::read(db.path()).unwrap();
    assert_eq!(&bytes[..4], b"dbhm");

    // Byte order comes from the file, whatever the device says
    let reopened = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    assert_eq!(reopened.track(database_id).unwrap().title(), "swapped");
}

#[test]
fn test_create_fresh_ignores_existing() {
    let dir = TempDir::new().unwrap();
    let mut db = TrackDatabase::open(mounted(&dir, DeviceModel::Video)).unwrap();
    add_track(&mut db, &dir, "old", "Album", 100);
    db.save().unwrap();

    let fresh = TrackDatabase::open_with(mounted(&dir, DeviceModel::Video), true).unwrap();
    assert!(fresh.tracks().is_empty());
}

#[test]
fn test_photo_albums() {
    let dir = TempDir::new().unwrap();
    let device = mounted(&dir, DeviceModel::Video);

    let mut photos = open_photo_database(&device).unwrap();
    let album = photos.create_album("Holiday");
    let photo = photos.add_photo(&cover_png(), Some(album)).unwrap();
    photos.save().unwrap();

    let reopened = open_photo_database(&device).unwrap();
    assert_eq!(reopened.images().len(), 1);
    assert!(reopened.album(album).unwrap().contains(photo));
    let master = reopened.albums().iter().find(|a| a.is_master()).unwrap();
    assert!(master.contains(photo));

    let generic = mounted(&dir, DeviceModel::Generic);
    assert!(open_photo_database(&generic).is_err());
}
