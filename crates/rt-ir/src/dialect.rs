//! Sound-driver dialects and their engine constants.

/// A sound-driver dialect: one opcode table plus its envelope and tempo arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Dialect {
    /// Running-status driver with durations folded into note opcodes
    Mp2k,
    /// Compact-note driver with an explicit free-note opcode
    AlphaDream,
}

/// Maximum number of tracks any dialect can address.
pub const MAX_TRACKS: usize = 16;

/// Maximum channel pool size of any dialect.
pub const MAX_CHANNELS: usize = 12;

/// Envelope level ceiling.
pub const ENVELOPE_CEILING: u8 = 0xFF;

impl Dialect {
    /// Number of track slots in a song header.
    pub const fn max_tracks(self) -> usize {
        match self {
            Dialect::Mp2k => 16,
            Dialect::AlphaDream => 12,
        }
    }

    /// Size of the mixer's channel pool.
    pub const fn channel_count(self) -> usize {
        match self {
            Dialect::Mp2k => 12,
            Dialect::AlphaDream => 12,
        }
    }

    /// Tempo stack value consumed per sequencer tick.
    pub const fn tempo_threshold(self) -> u16 {
        match self {
            Dialect::Mp2k => 150,
            Dialect::AlphaDream => 75,
        }
    }

    /// Tempo before the first tempo command.
    pub const fn default_tempo(self) -> u16 {
        match self {
            Dialect::Mp2k => 150,
            Dialect::AlphaDream => 120,
        }
    }

    /// Right shift applied after the decay/release multiply.
    pub const fn envelope_shift(self) -> u32 {
        match self {
            Dialect::Mp2k => 8,
            Dialect::AlphaDream => 7,
        }
    }

    /// Mask applied to decay/release rates so the multiply never grows the level.
    pub const fn rate_mask(self) -> u8 {
        match self {
            Dialect::Mp2k => 0xFF,
            Dialect::AlphaDream => 0x7F,
        }
    }

    /// Track volume after init.
    pub const fn default_volume(self) -> u8 {
        match self {
            Dialect::Mp2k => 100,
            Dialect::AlphaDream => 127,
        }
    }

    /// Short lowercase name (matches the serde representation).
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Mp2k => "mp2k",
            Dialect::AlphaDream => "alphadream",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

impl core::str::FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mp2k" => Ok(Dialect::Mp2k),
            "alphadream" => Ok(Dialect::AlphaDream),
            _ => Err(UnknownDialect),
        }
    }
}

/// Returned when parsing an unrecognized dialect name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownDialect;

impl core::fmt::Display for UnknownDialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("unknown dialect (expected mp2k or alphadream)")
    }
}
