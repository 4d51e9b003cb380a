//! Derived lookup structures regenerated on every save: the master
//! playlist's sort indices and jump tables, and the album list

use crate::codec::Endian;
use crate::itunesdb::version::{ALBUM_LIST, COUNTED_ITEM_CHILDREN, JUMP_TABLES};
use crate::itunesdb::{
    AlbumItemRecord, AlbumListRecord, DetailBody, DetailRecord, IndexSort, JumpEntry,
    PlaylistRecord, TrackRecord,
};
use std::cmp::Ordering;

fn sort_key(track: &TrackRecord, sort: IndexSort) -> String {
    match sort {
        IndexSort::Title => track.title(),
        IndexSort::Album => track.album(),
        IndexSort::Artist => track.artist(),
        IndexSort::Genre => track.genre(),
        IndexSort::Composer => track.composer(),
    }
    .to_lowercase()
}

fn compare(a: &TrackRecord, b: &TrackRecord, sort: IndexSort) -> Ordering {
    let by_position = |x: &TrackRecord| (x.fields.disc_number, x.fields.track_number);
    let by_title = |x: &TrackRecord| x.title().to_lowercase();

    let primary = sort_key(a, sort).cmp(&sort_key(b, sort));
    match sort {
        IndexSort::Title | IndexSort::Composer => primary.then_with(|| by_title(a).cmp(&by_title(b))),
        IndexSort::Album => primary
            .then_with(|| by_position(a).cmp(&by_position(b)))
            .then_with(|| by_title(a).cmp(&by_title(b))),
        IndexSort::Artist | IndexSort::Genre => primary
            .then_with(|| sort_key(a, IndexSort::Album).cmp(&sort_key(b, IndexSort::Album)))
            .then_with(|| by_position(a).cmp(&by_position(b)))
            .then_with(|| by_title(a).cmp(&by_title(b))),
    }
}

/// Track-list positions in `sort` order
pub fn sorted_positions(tracks: &[TrackRecord], sort: IndexSort) -> Vec<u32> {
    let mut positions: Vec<u32> = (0..tracks.len() as u32).collect();
    positions.sort_by(|&a, &b| compare(&tracks[a as usize], &tracks[b as usize], sort));
    positions
}

/// Letter shown when jumping through a sorted list
fn jump_letter(key: &str) -> u16 {
    match key.chars().find(|c| c.is_alphanumeric()) {
        Some(c) if c.is_ascii_digit() => b'0' as u16,
        Some(c) => c.to_uppercase().next().map(|u| u as u32).unwrap_or(0) as u16,
        None => b'0' as u16,
    }
}

/// Runs of equal first letters over an index
pub fn jump_table(tracks: &[TrackRecord], sort: IndexSort, positions: &[u32]) -> Vec<JumpEntry> {
    let mut entries: Vec<JumpEntry> = Vec::new();
    for (start, &position) in positions.iter().enumerate() {
        let letter = jump_letter(&sort_key(&tracks[position as usize], sort));
        match entries.last_mut() {
            Some(entry) if entry.letter == letter => entry.count += 1,
            _ => entries.push(JumpEntry {
                letter,
                start: start as u32,
                count: 1,
            }),
        }
    }
    entries
}

/// Replace the master playlist's index records with fresh ones for `version`
pub fn rebuild_indices(master: &mut PlaylistRecord, tracks: &[TrackRecord], version: u32) {
    master.details.retain(|d| {
        !matches!(
            d.body,
            DetailBody::LibraryIndex { .. } | DetailBody::LibraryJumpTable { .. }
        )
    });
    if version < COUNTED_ITEM_CHILDREN {
        return;
    }

    let endian = master.endian();
    for sort in IndexSort::ALL {
        let positions = sorted_positions(tracks, sort);
        if version >= JUMP_TABLES {
            let entries = jump_table(tracks, sort, &positions);
            master.details.push(DetailRecord::library_index(endian, sort, positions));
            master.details.push(DetailRecord::jump_table(endian, sort, entries));
        } else {
            master.details.push(DetailRecord::library_index(endian, sort, positions));
        }
    }
}

/// Build the album list from the tracks' (album, artist) pairs and point
/// every track at its album. `None` below the version that carries one.
pub fn rebuild_album_list(
    tracks: &mut [TrackRecord],
    endian: Endian,
    version: u32,
) -> Option<AlbumListRecord> {
    if version < ALBUM_LIST {
        return None;
    }

    let mut list = AlbumListRecord::new(endian);
    for track in tracks.iter_mut() {
        let album_id = match list.find(track.album(), track.artist()) {
            Some(existing) => existing.album_id(),
            None => {
                let album_id = list.albums.len() as u32 + 1;
                list.albums.push(AlbumItemRecord::new(
                    endian,
                    album_id,
                    track.album(),
                    track.artist(),
                ));
                album_id
            }
        };
        track.fields.album_id = album_id;
    }
    log::debug!("Album list holds {} albums", list.albums.len());
    Some(list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::itunesdb::DetailKind;

    fn track(title: &str, artist: &str, album: &str, number: u32) -> TrackRecord {
        let mut track = TrackRecord::new(Endian::Little, 25);
        track.set_string(DetailKind::Title, title);
        track.set_string(DetailKind::Artist, artist);
        track.set_string(DetailKind::Album, album);
        track.fields.track_number = number;
        track
    }

    fn library() -> Vec<TrackRecord> {
        vec![
            track("Zebra", "beta", "Second", 2),
            track("apple", "Alpha", "First", 1),
            track("Mango", "beta", "Second", 1),
            track("7 Seas", "alpha", "First", 2),
        ]
    }

    #[test]
    fn test_title_order_ignores_case() {
        assert_eq!(sorted_positions(&library(), IndexSort::Title), vec![3, 1, 2, 0]);
    }

    #[test]
    fn test_album_order_follows_track_numbers() {
        assert_eq!(sorted_positions(&library(), IndexSort::Album), vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_jump_table_runs() {
        let tracks = library();
        let positions = sorted_positions(&tracks, IndexSort::Title);
        let entries = jump_table(&tracks, IndexSort::Title, &positions);
        let letters: Vec<(u16, u32, u32)> =
            entries.iter().map(|e| (e.letter, e.start, e.count)).collect();
        assert_eq!(
            letters,
            vec![
                (b'0' as u16, 0, 1),
                (b'A' as u16, 1, 1),
                (b'M' as u16, 2, 1),
                (b'Z' as u16, 3, 1)
            ]
        );
    }

    #[test]
    fn test_indices_depend_on_version() {
        let tracks = library();
        let mut master = PlaylistRecord::new(Endian::Little, 1, "Library");

        rebuild_indices(&mut master, &tracks, 12);
        assert_eq!(master.details.len(), 1);

        rebuild_indices(&mut master, &tracks, 13);
        assert_eq!(master.details.len(), 1 + 5);

        rebuild_indices(&mut master, &tracks, 19);
        assert_eq!(master.details.len(), 1 + 10);
        assert_eq!(master.name(), "Library");
    }

    #[test]
    fn test_album_list_assigns_ids() {
        let mut tracks = library();
        assert!(rebuild_album_list(&mut tracks, Endian::Little, 19).is_none());

        let list = rebuild_album_list(&mut tracks, Endian::Little, 20).unwrap();
        // "Alpha" and "alpha" are distinct artists
        assert_eq!(list.albums.len(), 3);
        assert_eq!(tracks[0].fields.album_id, tracks[2].fields.album_id);
        assert_ne!(tracks[1].fields.album_id, tracks[3].fields.album_id);
    }
}
