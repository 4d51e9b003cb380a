use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pod_database::codec::Endian;
use pod_database::engine::{Device, SaveProgress};
use pod_database::equalizer::{EqualizerPreset, EqualizerPresets, BAND_COUNT};
use pod_database::validation::validate_database;
use pod_database::{DeviceConfig, DeviceModel, MountedDevice, TrackDatabase};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pod-database")]
#[command(about = "Manage the music, playlist and artwork databases of an iPod", long_about = None)]
struct Args {
    /// Device mount point
    #[arg(short = 'm', long, default_value = "/media/ipod")]
    mount: String,

    /// Device model (generic, mini, photo, video, nano, classic, mobile)
    #[arg(long, default_value = "video")]
    model: DeviceModel,

    /// Device capacity in bytes (defaults to the model's)
    #[arg(long)]
    capacity: Option<u64>,

    /// Ignore any existing database and start empty
    #[arg(long)]
    create: bool,

    /// Write fresh databases big-endian
    #[arg(long)]
    big_endian: bool,

    /// Device identifier for the database signature (read from SysInfo when omitted)
    #[arg(long)]
    firewire_id: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show database and device summary
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tracks
    Tracks,
    /// List playlists, including On-The-Go lists
    Playlists,
    /// Import media files and copy them to the device
    Add {
        files: Vec<PathBuf>,

        /// Also add the tracks to this playlist, creating it if needed
        #[arg(long)]
        playlist: Option<String>,

        /// Add to a podcast playlist instead
        #[arg(long)]
        podcast: bool,
    },
    /// Remove tracks by database ID (hex)
    Remove { ids: Vec<String> },
    /// Check that the database survives a write/read round trip
    Validate,
    /// List equalizer presets, or add/replace one
    Eq {
        /// Preset to add or replace
        #[arg(long)]
        set: Option<String>,

        /// Preamp in hundredths of a dB
        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        preamp: i32,

        /// Comma-separated 10-band gains in hundredths of a dB
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        bands: Vec<i32>,
    },
}

#[derive(Serialize)]
struct Info {
    mount: PathBuf,
    version: u32,
    big_endian: bool,
    tracks: usize,
    playlists: usize,
    on_the_go: usize,
    used_bytes: u64,
    available_bytes: u64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    // Expand ~ in paths
    let mount = PathBuf::from(shellexpand::tilde(&args.mount).as_ref());

    let mut config = DeviceConfig::new(mount)
        .with_model(args.model)
        .with_create_fresh(args.create);
    if let Some(capacity) = args.capacity {
        config = config.with_capacity(capacity);
    }
    if args.big_endian {
        config = config.with_big_endian(true);
    }
    if let Some(id) = &args.firewire_id {
        config = config.with_firewire_id(id.clone());
    }

    let device = MountedDevice::new(&config).context("Failed to inspect device")?;

    match args.command {
        Command::Validate => {
            let path = device.layout().database_path();
            let report = validate_database(&path, device.firewire_id())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            log::info!("✅ Validation passed!");
            Ok(())
        }
        Command::Eq { set, preamp, bands } => equalizer(&device, set, preamp, bands),
        command => {
            let mut db = TrackDatabase::open_with(device, config.create_fresh)
                .context("Failed to open database")?;
            run(&mut db, command)
        }
    }
}

fn run(db: &mut TrackDatabase<MountedDevice>, command: Command) -> Result<()> {
    match command {
        Command::Info { json } => {
            let info = Info {
                mount: db.device().mount_path().to_path_buf(),
                version: db.version(),
                big_endian: db.endian() == Endian::Big,
                tracks: db.tracks().len(),
                playlists: db.playlists().len(),
                on_the_go: db.on_the_go().len(),
                used_bytes: db.device().used_space()?,
                available_bytes: db.device().available_space()?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Device:     {:?}", info.mount);
                println!("Version:    {}", info.version);
                println!("Byte order: {}", if info.big_endian { "big" } else { "little" });
                println!("Tracks:     {}", info.tracks);
                println!("Playlists:  {}", info.playlists);
                println!("On-The-Go:  {}", info.on_the_go);
                println!("Used:       {} bytes", info.used_bytes);
                println!("Available:  {} bytes", info.available_bytes);
            }
        }
        Command::Tracks => {
            for track in db.tracks() {
                println!(
                    "{:016x}  {:>5}  {} - {} ({})  {}:{:02}",
                    track.database_id(),
                    track.id(),
                    track.artist(),
                    track.title(),
                    track.album(),
                    track.fields.duration_ms / 60_000,
                    track.fields.duration_ms / 1000 % 60
                );
            }
        }
        Command::Playlists => {
            for playlist in db.playlists() {
                let marker = if playlist.is_library() {
                    " [library]"
                } else if playlist.is_podcast() {
                    " [podcast]"
                } else {
                    ""
                };
                println!("{} ({} tracks){}", playlist.name(), playlist.len(), marker);
            }
            for playlist in db.on_the_go() {
                println!("{} ({} tracks) [on-the-go]", playlist.name(), playlist.len());
            }
        }
        Command::Add {
            files,
            playlist,
            podcast,
        } => {
            let playlist_id = playlist.map(|name| {
                db.playlists()
                    .iter()
                    .find(|p| p.name() == name && !p.is_library())
                    .map(|p| p.playlist_id())
                    .unwrap_or_else(|| {
                        if podcast {
                            db.create_podcast_playlist(&name)
                        } else {
                            db.create_playlist(&name)
                        }
                    })
            });

            for (i, file) in files.iter().enumerate() {
                log::info!("[{}/{}] Importing: {:?}", i + 1, files.len(), file);
                let file = PathBuf::from(shellexpand::tilde(&file.to_string_lossy()).as_ref());
                let database_id = db
                    .import_file(&file)
                    .with_context(|| format!("Failed to import: {:?}", file))?;
                if let Some(playlist_id) = playlist_id {
                    db.add_to_playlist(playlist_id, database_id)?;
                }
            }

            db.save_with_progress(&mut |progress: SaveProgress| {
                log::info!(
                    "Copied {}/{} files ({}%)",
                    progress.copied,
                    progress.total,
                    progress.percent
                );
            })
            .context("Failed to save database")?;
        }
        Command::Remove { ids } => {
            for id in ids {
                let database_id = u64::from_str_radix(id.trim_start_matches("0x"), 16)
                    .with_context(|| format!("Not a hex database ID: {}", id))?;
                db.remove_track(database_id)?;
            }
            db.save().context("Failed to save database")?;
        }
        Command::Validate | Command::Eq { .. } => unreachable!("handled before opening"),
    }
    Ok(())
}

fn equalizer(device: &MountedDevice, set: Option<String>, preamp: i32, bands: Vec<i32>) -> Result<()> {
    let path = device.layout().equalizer_path();
    let endian = if device.is_big_endian() {
        Endian::Big
    } else {
        Endian::Little
    };
    let mut presets = EqualizerPresets::load(&path, endian)?.unwrap_or_default();

    if let Some(name) = set {
        if bands.len() != BAND_COUNT {
            anyhow::bail!("Expected {} band gains, got {}", BAND_COUNT, bands.len());
        }
        let mut gains = [0; BAND_COUNT];
        gains.copy_from_slice(&bands);
        presets.upsert(
            EqualizerPreset::flat(name)
                .with_preamp(preamp)
                .with_bands(gains),
        );
        device.layout().init()?;
        presets.save(&path, endian)?;
    }

    for preset in &presets.presets {
        println!("{:<24} preamp {:>5}  {:?}", preset.name, preset.preamp, preset.bands);
    }
    Ok(())
}
