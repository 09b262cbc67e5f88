//! romtune CLI: list, dump, play and export songs from a ROM image.
//!
//! Usage:
//!   rt-cli game.json rom.gba songs
//!   rt-cli game.json rom.gba dump 3
//!   rt-cli game.json rom.gba play 3
//!   rt-cli game.json rom.gba export 3 --wav song3.wav

use clap::{Parser, Subcommand, ValueEnum};
use rt_master::{Config, Controller, Interpolation, PlaybackConfig, SongState};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// Aborts on any allocation inside the mixer's render loop.
#[cfg(feature = "alloc_check")]
#[global_allocator]
static ALLOC: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

#[derive(Parser)]
#[command(name = "rt-cli")]
#[command(about = "Play and export sequenced music from ROM images")]
struct Cli {
    /// Game configuration (JSON)
    config: PathBuf,

    /// ROM image
    rom: PathBuf,

    /// Output sample rate
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Loops before fading out
    #[arg(long)]
    play_count: Option<u32>,

    /// Fade-out length in milliseconds
    #[arg(long)]
    fade_out_ms: Option<u32>,

    /// Loop forever instead of fading out
    #[arg(long, conflicts_with = "fade_out_ms")]
    no_fade: bool,

    #[arg(long, value_enum)]
    interpolation: Option<InterpolationArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the songs in the song table
    Songs,

    /// Print the decoded events of a song
    Dump { song: usize },

    /// Play a song on the default audio device
    Play { song: usize },

    /// Render a song to a WAV file
    Export {
        song: usize,

        #[arg(long)]
        wav: PathBuf,

        /// Length cap in seconds
        #[arg(long)]
        max_seconds: Option<u32>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InterpolationArg {
    None,
    Linear,
}

impl From<InterpolationArg> for Interpolation {
    fn from(arg: InterpolationArg) -> Self {
        match arg {
            InterpolationArg::None => Interpolation::None,
            InterpolationArg::Linear => Interpolation::Linear,
        }
    }
}

impl Cli {
    fn playback(&self, mut playback: PlaybackConfig) -> PlaybackConfig {
        if let Some(rate) = self.sample_rate {
            playback.sample_rate = rate;
        }
        if let Some(count) = self.play_count {
            playback.play_count = count;
        }
        if let Some(ms) = self.fade_out_ms {
            playback.fade_out_ms = Some(ms);
        }
        if self.no_fade {
            playback.fade_out_ms = None;
        }
        if let Some(interp) = self.interpolation {
            playback.interpolation = interp.into();
        }
        playback
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;
    let rom: Arc<[u8]> = std::fs::read(&cli.rom)?.into();
    let tables = config.game.tables(rom.len())?;
    tracing::debug!(rom = %cli.rom.display(), len = rom.len(), dialect = %tables.dialect, "loaded ROM");
    let playback = cli.playback(config.playback);
    let mut ctrl = Controller::new(rom, tables, playback.options());

    match cli.command {
        Commands::Songs => {
            if let Some(name) = &config.game.name {
                println!("{name} ({})", tables.dialect);
            }
            for index in 0..ctrl.song_count() {
                println!("{index:4}  {}", config.game.song_name(index).unwrap_or("-"));
            }
        }
        Commands::Dump { song } => {
            ctrl.load_song(song)?;
            dump(&ctrl);
        }
        Commands::Play { song } => {
            ctrl.load_song(song)?;
            println!("Playing {}", config.game.song_name(song).unwrap_or("song"));
            play(&mut ctrl);
        }
        Commands::Export { song, wav, max_seconds } => {
            ctrl.load_song(song)?;
            let seconds = max_seconds.unwrap_or(playback.max_record_seconds);
            let max_frames = seconds as u64 * playback.sample_rate as u64;
            let frames = ctrl.record_wav(&wav, max_frames)?;
            println!(
                "Wrote {} ({:.1}s)",
                wav.display(),
                frames as f64 / playback.sample_rate as f64
            );
        }
    }
    Ok(())
}

fn dump(ctrl: &Controller) {
    let Some(song) = ctrl.loaded_song() else { return };
    println!("Length: {} ticks, loop anchor: track {}", song.max_ticks, song.loop_anchor_track);
    for (index, track) in song.tracks.iter().enumerate() {
        let Some(track) = track else { continue };
        println!();
        println!("Track {index} @ {:#x}", track.start);
        for event in &track.events {
            println!("  {:#08x}  {:<12}  {:?}", event.offset, format!("{:?}", event.ticks), event.command);
        }
    }
}

fn play(ctrl: &mut Controller) {
    ctrl.play();
    let mut state = SongState::default();

    while ctrl.is_playing() {
        ctrl.snapshot(&mut state);
        print!("\rTick {:6} | Loop {} | Tempo {:3} | ", state.elapsed_ticks, state.loops, state.tempo);
        for track in &state.tracks {
            let mark = if track.held_keys.is_empty() { '.' } else { '#' };
            print!("{mark}");
        }
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(50));
    }

    ctrl.stop();
    println!("\nDone.");
}
