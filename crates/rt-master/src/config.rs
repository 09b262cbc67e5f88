//! JSON configuration: where a game's tables live and how to play them.
//!
//! ```json
//! {
//!   "game": {
//!     "name": "Example",
//!     "dialect": "mp2k",
//!     "song_table": "0x08A0_1000",
//!     "song_count": 120,
//!     "song_names": ["Title", "Overworld"]
//!   },
//!   "playback": { "sample_rate": 48000, "play_count": 2 }
//! }
//! ```
//!
//! Offsets are JSON numbers or hex strings, and may be file offsets or
//! cartridge bus addresses.

use rt_engine::PlaybackOptions;
use rt_formats::{RomTables, ROM_BASE};
use rt_ir::{Dialect, Interpolation};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};

/// Why a configuration could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{table} table at {offset:#x} is outside the {rom_len:#x}-byte ROM")]
    OffsetOutOfRange { table: &'static str, offset: usize, rom_len: usize },
}

/// A full configuration file.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub game: GameConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }
}

/// Table locations for one game.
#[derive(Clone, Debug, Deserialize)]
pub struct GameConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub dialect: Dialect,
    #[serde(deserialize_with = "offset")]
    pub song_table: usize,
    pub song_count: usize,
    #[serde(default, deserialize_with = "optional_offset")]
    pub voice_table: Option<usize>,
    #[serde(default, deserialize_with = "optional_offset")]
    pub sample_table: Option<usize>,
    #[serde(default)]
    pub song_names: Vec<String>,
}

impl GameConfig {
    /// Check every table against the ROM size and build the decoder's view.
    pub fn tables(&self, rom_len: usize) -> Result<RomTables, ConfigError> {
        let entry_size = match self.dialect {
            Dialect::Mp2k => 8,
            Dialect::AlphaDream => 4,
        };
        let table_end = self.song_table.saturating_add(self.song_count.saturating_mul(entry_size));
        if self.song_table >= rom_len || table_end > rom_len {
            return Err(ConfigError::OffsetOutOfRange { table: "song", offset: self.song_table, rom_len });
        }
        for (table, offset) in [("voice", self.voice_table), ("sample", self.sample_table)] {
            if let Some(offset) = offset.filter(|&o| o >= rom_len) {
                return Err(ConfigError::OffsetOutOfRange { table, offset, rom_len });
            }
        }
        Ok(RomTables {
            dialect: self.dialect,
            song_table: self.song_table,
            song_count: self.song_count,
            voice_table: self.voice_table,
            sample_table: self.sample_table,
        })
    }

    /// Display name of song `index`, if the config lists one.
    pub fn song_name(&self, index: usize) -> Option<&str> {
        self.song_names.get(index).map(String::as_str)
    }
}

/// Playback settings. Every field has a default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub sample_rate: u32,
    pub interpolation: Interpolation,
    /// Loops before the fade-out
    pub play_count: u32,
    /// `null` loops forever
    pub fade_out_ms: Option<u32>,
    pub fade_in_ms: Option<u32>,
    /// Longest export, in seconds
    pub max_record_seconds: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let options = PlaybackOptions::default();
        Self {
            sample_rate: options.sample_rate,
            interpolation: options.interpolation,
            play_count: options.play_count,
            fade_out_ms: options.fade_out_ms,
            fade_in_ms: options.fade_in_ms,
            max_record_seconds: 600,
        }
    }
}

impl PlaybackConfig {
    pub fn options(&self) -> PlaybackOptions {
        PlaybackOptions {
            sample_rate: self.sample_rate.max(1),
            interpolation: self.interpolation,
            play_count: self.play_count,
            fade_out_ms: self.fade_out_ms,
            fade_in_ms: self.fade_in_ms,
        }
    }

    /// Export length cap in frames.
    pub fn max_record_frames(&self) -> u64 {
        self.max_record_seconds as u64 * self.sample_rate as u64
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOffset {
    Number(usize),
    Text(String),
}

impl RawOffset {
    fn resolve<E: serde::de::Error>(self) -> Result<usize, E> {
        let value = match self {
            RawOffset::Number(n) => n,
            RawOffset::Text(s) => {
                let digits = s.trim().trim_start_matches("0x").trim_start_matches("0X").replace('_', "");
                usize::from_str_radix(&digits, 16).map_err(|_| E::custom(format!("invalid hex offset {s:?}")))?
            }
        };
        let base = ROM_BASE as usize;
        Ok(if value >= base { value - base } else { value })
    }
}

fn offset<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    RawOffset::deserialize(d)?.resolve()
}

fn optional_offset<'de, D: Deserializer<'de>>(d: D) -> Result<Option<usize>, D::Error> {
    Option::<RawOffset>::deserialize(d)?.map(RawOffset::resolve).transpose()
}
