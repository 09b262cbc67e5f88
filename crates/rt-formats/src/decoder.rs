//! Dialect-independent track walker.
//!
//! Each dialect supplies an opcode table through [`DialectFormat`]; the
//! walker follows the byte stream, descends into branch targets and stops at
//! offsets it has already decoded, so musical loops produce finite event lists.

use alloc::vec::Vec;
use std::collections::BTreeSet;

use rt_ir::{Command, Dialect, SongEvent, VoiceEntry};

use crate::alphadream::AlphaDreamFormat;
use crate::mp2k::Mp2kFormat;
use crate::reader::{ReadFault, RomReader};
use crate::{DecodeError, RomTables};

/// Call nesting the walker follows before giving up on a branch.
const MAX_CALL_DEPTH: usize = 8;

/// Running state threaded through consecutive opcodes of a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecoderState {
    /// Last full opcode that running status may repeat
    pub running: Option<u8>,
    /// Key reused by notes that omit their key byte
    pub key: u8,
    /// Velocity reused by notes that omit their velocity byte
    pub velocity: u8,
}

impl Default for DecoderState {
    fn default() -> Self {
        Self {
            running: None,
            key: 60,
            velocity: 127,
        }
    }
}

/// Track start offsets and the voice table a song header points to.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SongLayout {
    /// One entry per track slot; `None` = slot disabled
    pub tracks: Vec<Option<usize>>,
    /// Absolute offset of the voice table used by this song
    pub voice_table: usize,
}

/// Everything that differs between sound-driver dialects on the ROM side.
pub trait DialectFormat: Sync {
    /// Which dialect this table implements.
    fn dialect(&self) -> Dialect;

    /// Resolve song `index` through the song table.
    fn song_layout(&self, rom: &[u8], tables: &RomTables, index: usize) -> Result<SongLayout, DecodeError>;

    /// Decode one command at the reader's position.
    fn decode_command(&self, reader: &mut RomReader<'_>, state: &mut DecoderState) -> Result<Command, ReadFault>;

    /// Look up the instrument that plays `key` on `voice`.
    fn voice_entry(&self, rom: &[u8], tables: &VoiceTables, voice: u8, key: u8) -> Option<VoiceEntry>;
}

/// Table offsets a voice lookup needs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceTables {
    pub voice_table: usize,
    pub sample_table: Option<usize>,
}

/// The opcode table for a dialect.
pub fn format_for(dialect: Dialect) -> &'static dyn DialectFormat {
    match dialect {
        Dialect::Mp2k => &Mp2kFormat,
        Dialect::AlphaDream => &AlphaDreamFormat,
    }
}

/// Decode a single track starting at `start`.
///
/// The returned events are sorted by offset. Branch targets are followed
/// depth-first in playback order so running status carries across them.
pub fn decode_track(rom: &[u8], start: usize, dialect: Dialect, track: usize) -> Result<Vec<SongEvent>, DecodeError> {
    let format = format_for(dialect);
    let mut events: Vec<SongEvent> = Vec::new();
    let mut seen: BTreeSet<usize> = BTreeSet::new();
    let mut returns: Vec<usize> = Vec::new();
    let mut state = DecoderState::default();
    let mut cursor = Some(start);

    while let Some(offset) = cursor.take().or_else(|| returns.pop()) {
        if !seen.insert(offset) {
            continue;
        }

        let mut reader = RomReader::new(rom, offset);
        let command = format
            .decode_command(&mut reader, &mut state)
            .map_err(|fault| DecodeError::from_fault(fault, track, offset))?;
        let size = (reader.pos() - offset) as u8;
        events.push(SongEvent::new(offset, size, command));

        let next = offset + size as usize;
        cursor = match command {
            Command::Jump { target } => Some(target),
            Command::Call { target } => {
                if returns.len() < MAX_CALL_DEPTH {
                    returns.push(next);
                    Some(target)
                } else {
                    Some(next)
                }
            }
            Command::Return | Command::Finish => None,
            _ => Some(next),
        };
    }

    events.sort_by_key(|e| e.offset);
    Ok(events)
}

/// One decoded track. `events` is sorted by offset, so the entry point
/// is kept separately.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedTrack {
    /// Offset playback starts from
    pub start: usize,
    pub events: Vec<SongEvent>,
}

/// Decoded tracks of one song.
#[derive(Clone, Debug, Default)]
pub struct DecodedSong {
    /// Per-track event lists; `None` for disabled track slots
    pub tracks: Vec<Option<DecodedTrack>>,
    /// Voice table the song plays with
    pub voice_table: usize,
}

impl DecodedSong {
    /// Number of tracks that carry events.
    pub fn active_tracks(&self) -> usize {
        self.tracks.iter().filter(|t| t.is_some()).count()
    }
}

/// Resolve song `index` and decode all of its tracks.
pub fn decode_song(rom: &[u8], tables: &RomTables, index: usize) -> Result<DecodedSong, DecodeError> {
    let format = format_for(tables.dialect);
    let layout = format.song_layout(rom, tables, index)?;
    let mut tracks = Vec::with_capacity(layout.tracks.len());
    for (i, start) in layout.tracks.iter().enumerate() {
        tracks.push(match start {
            Some(start) => Some(DecodedTrack {
                start: *start,
                events: decode_track(rom, *start, tables.dialect, i)?,
            }),
            None => None,
        });
    }
    let song = DecodedSong { tracks, voice_table: layout.voice_table };
    tracing::debug!(
        song = index,
        dialect = %tables.dialect,
        tracks = song.active_tracks(),
        "decoded song"
    );
    Ok(song)
}
