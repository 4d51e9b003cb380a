//! Podcast dataset projection
//!
//! The player shows podcasts grouped by show. The playlists dataset keeps
//! podcast playlists flat; at save the podcasts dataset is derived from it
//! with one synthetic header item per album name followed by its episodes.

use crate::itunesdb::{PlaylistItemRecord, PlaylistListRecord, PlaylistRecord, TrackRecord};
use std::collections::HashMap;

/// Regroup every podcast playlist of `playlists`; other playlists are copied
/// unchanged. Group and item IDs are handed out from `next_id` upwards.
pub fn group_podcasts(
    playlists: &PlaylistListRecord,
    tracks: &[TrackRecord],
    next_id: &mut u32,
) -> PlaylistListRecord {
    let albums: HashMap<u32, &str> = tracks.iter().map(|t| (t.id(), t.album())).collect();

    let mut grouped = playlists.clone();
    for playlist in grouped.playlists.iter_mut().filter(|p| p.is_podcast()) {
        group_playlist(playlist, &albums, next_id);
    }
    grouped
}

fn group_playlist(playlist: &mut PlaylistRecord, albums: &HashMap<u32, &str>, next_id: &mut u32) {
    let endian = playlist.endian();
    let name = playlist.name().to_string();

    // Album names in first-seen order, each with its episodes
    let mut groups: Vec<(String, Vec<PlaylistItemRecord>)> = Vec::new();
    for item in playlist.items.drain(..) {
        if item.is_podcast_group() {
            continue;
        }
        let Some(album) = albums.get(&item.track_id()) else {
            log::warn!(
                "Podcast playlist '{}' references missing track {}",
                name,
                item.track_id()
            );
            continue;
        };
        match groups.iter_mut().find(|(existing, _)| existing.as_str() == *album) {
            Some((_, episodes)) => episodes.push(item),
            None => groups.push((album.to_string(), vec![item])),
        }
    }

    for (album, episodes) in groups {
        if episodes.is_empty() {
            continue;
        }
        let group_id = *next_id;
        *next_id += 1;
        playlist
            .items
            .push(PlaylistItemRecord::podcast_group(endian, group_id, &album));

        for mut episode in episodes {
            episode.fields.group_id = *next_id;
            *next_id += 1;
            episode.fields.podcast_group_ref = group_id;
            playlist.items.push(episode);
        }
    }
    playlist.renumber_positions();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Endian;
    use crate::itunesdb::DetailKind;

    fn track(id: u32, album: &str) -> TrackRecord {
        let mut track = TrackRecord::new(Endian::Little, 25);
        track.fields.id = id;
        track.set_string(DetailKind::Album, album);
        track
    }

    #[test]
    fn test_shared_album_makes_one_group() {
        let tracks = vec![track(52, "Show A"), track(53, "Show A"), track(54, "Show B")];
        let mut list = PlaylistListRecord::new(Endian::Little);
        let mut podcasts = PlaylistRecord::new(Endian::Little, 7, "Podcasts");
        podcasts.fields.podcast_flag = 1;
        for id in [52, 54, 53] {
            podcasts.push_track(id);
        }
        list.playlists.push(podcasts);

        let mut next_id = 100;
        let grouped = group_podcasts(&list, &tracks, &mut next_id);
        let items = &grouped.playlists[0].items;

        assert_eq!(items.len(), 5);
        assert!(items[0].is_podcast_group());
        assert_eq!(items[0].title(), Some("Show A"));
        assert_eq!(items[0].track_id(), 0);
        assert_eq!(items[1].track_id(), 52);
        assert_eq!(items[2].track_id(), 53);
        assert_eq!(items[1].fields.podcast_group_ref, items[0].fields.group_id);
        assert_eq!(items[2].fields.podcast_group_ref, items[0].fields.group_id);

        assert!(items[3].is_podcast_group());
        assert_eq!(items[3].title(), Some("Show B"));
        assert_eq!(items[4].fields.podcast_group_ref, items[3].fields.group_id);
        assert_eq!(next_id, 105);
    }

    #[test]
    fn test_groups_without_episodes_are_dropped() {
        let tracks = vec![track(52, "Show A")];
        let mut list = PlaylistListRecord::new(Endian::Little);
        let mut podcasts = PlaylistRecord::new(Endian::Little, 7, "Podcasts");
        podcasts.fields.podcast_flag = 1;
        podcasts.push_track(99);
        list.playlists.push(podcasts);

        let grouped = group_podcasts(&list, &tracks, &mut 100);
        assert!(grouped.playlists[0].items.is_empty());
    }

    #[test]
    fn test_regular_playlists_untouched() {
        let tracks = vec![track(52, "Album")];
        let mut list = PlaylistListRecord::new(Endian::Little);
        let mut regular = PlaylistRecord::new(Endian::Little, 8, "Mix");
        regular.push_track(52);
        list.playlists.push(regular.clone());

        let grouped = group_podcasts(&list, &tracks, &mut 100);
        assert_eq!(grouped.playlists[0], regular);
    }
}
