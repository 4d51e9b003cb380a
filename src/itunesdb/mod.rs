//! Record tree of the track database (`iTunesDB`)
//!
//! ```text
//! mhbd                      database root
//! ├── mhsd type 1           library
//! │   └── mhlt              track list
//! │       └── mhit          track
//! │           └── mhod      string / typed attribute
//! ├── mhsd type 2 and 3     playlists, podcasts
//! │   └── mhlp              playlist list
//! │       └── mhyp          playlist
//! │           ├── mhod      name, library indices
//! │           └── mhip      item
//! │               └── mhod  position
//! └── mhsd type 4           album list (v20+)
//!     └── mhla
//!         └── mhia
//! ```

pub mod album;
pub mod database;
pub mod dataset;
pub mod detail;
pub mod playlist;
pub mod track;
pub mod version;

pub use album::{AlbumItemRecord, AlbumListRecord};
pub use database::{detect_endian, DatabaseFields, DatabaseRecord};
pub use dataset::{DataSet, DataSetKind, DataSetRecord};
pub use detail::{DetailBody, DetailKind, DetailRecord, IndexSort, JumpEntry, StringDetail};
pub use playlist::{PlaylistItemRecord, PlaylistListRecord, PlaylistRecord};
pub use track::{TrackFields, TrackListRecord, TrackRecord};
pub use version::{RecordKind, MAX_VERSION};
