//! ROM-side decoding for romtune.
//!
//! Reads song tables, voice tables and sample headers out of a ROM image
//! and turns track byte streams into offset-indexed [`SongEvent`] lists.
//!
//! [`SongEvent`]: rt_ir::SongEvent

extern crate alloc;

mod alphadream;
mod decoder;
mod mp2k;
mod reader;
mod records;

pub use alphadream::AlphaDreamFormat;
pub use decoder::{
    decode_song, decode_track, format_for, DecodedSong, DecodedTrack, DecoderState, DialectFormat, SongLayout, VoiceTables,
};
pub use mp2k::{Mp2kFormat, LENGTHS as MP2K_LENGTHS};
pub use reader::{pointer_to_offset, ReadFault, RomReader, ROM_BASE};
pub use records::{read_sample_header, SAMPLE_HEADER_SIZE};

use rt_ir::Dialect;

/// Table offsets locating songs and instruments inside a ROM.
///
/// Supplied by configuration; offsets are trusted to be in bounds, but every
/// read is still checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RomTables {
    pub dialect: Dialect,
    /// Offset of the song table
    pub song_table: usize,
    /// Number of entries in the song table
    pub song_count: usize,
    /// Voice table for dialects whose song headers do not carry one
    pub voice_table: Option<usize>,
    /// Sample offset table (AlphaDream)
    pub sample_table: Option<usize>,
}

impl RomTables {
    /// Tables for voice lookups while `song` is loaded.
    pub fn voices(&self, song: &DecodedSong) -> VoiceTables {
        VoiceTables {
            voice_table: song.voice_table,
            sample_table: self.sample_table,
        }
    }
}

/// Why a song could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid opcode {opcode:#04x} on track {track} at offset {offset:#x}")]
    InvalidOpcode { track: usize, offset: usize, opcode: u8 },

    #[error("track {track} runs past the end of the ROM at offset {offset:#x}")]
    UnexpectedEof { track: usize, offset: usize },

    #[error("track {track} branches outside the ROM at offset {offset:#x} (pointer {pointer:#010x})")]
    BadPointer { track: usize, offset: usize, pointer: u32 },

    #[error("song {song} has an unreadable header (table entry at {offset:#x})")]
    BadHeader { song: usize, offset: usize },

    #[error("no {table} table configured for this dialect")]
    MissingTable { table: &'static str },
}

impl DecodeError {
    /// Attach track and offset context to a reader fault.
    pub fn from_fault(fault: ReadFault, track: usize, offset: usize) -> Self {
        match fault {
            ReadFault::Eof => Self::UnexpectedEof { track, offset },
            ReadFault::Opcode(opcode) => Self::InvalidOpcode { track, offset, opcode },
            ReadFault::Pointer(pointer) => Self::BadPointer { track, offset, pointer },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_mapping_keeps_context() {
        assert_eq!(
            DecodeError::from_fault(ReadFault::Opcode(0xB7), 2, 0x40),
            DecodeError::InvalidOpcode { track: 2, offset: 0x40, opcode: 0xB7 }
        );
        assert_eq!(
            DecodeError::from_fault(ReadFault::Eof, 0, 9),
            DecodeError::UnexpectedEof { track: 0, offset: 9 }
        );
    }

    #[test]
    fn error_message_names_location() {
        let err = DecodeError::InvalidOpcode { track: 1, offset: 0x1234, opcode: 0xB7 };
        assert_eq!(err.to_string(), "invalid opcode 0xb7 on track 1 at offset 0x1234");
    }
}
