//! AlphaDream opcode table.
//!
//! | Opcode      | Command          | Operands                                |
//! |-------------|------------------|-----------------------------------------|
//! | `0x00-0x5F` | compact note     | key; duration = `op + 1`                |
//! | `0x60-0x7F` | rest             | ticks = `op - 0x5F`                     |
//! | `0x80`      | free note        | key, velocity, duration                 |
//! | `0x81`      | long rest        | ticks                                   |
//! | `0x82`      | voice            | 1                                       |
//! | `0x83`      | volume           | 1                                       |
//! | `0x84`      | pan              | 1 (0x40 = center)                       |
//! | `0x85`      | pitch bend       | 1 (signed)                              |
//! | `0x86`      | pitch bend range | 1                                       |
//! | `0x87`      | tempo            | 1                                       |
//! | `0x88`      | key shift        | 1 (signed)                              |
//! | `0x90`      | jump             | i16 displacement from the next opcode   |
//! | `0x91`      | call             | i16 displacement from the next opcode   |
//! | `0x92`      | return           |                                         |
//! | `0xFF`      | finish           |                                         |
//!
//! There is no running status; every command starts with its own opcode.
//! Compact notes carry no velocity and reuse the track's last one.

use rt_ir::{Adsr, Command, Dialect, VoiceEntry};

use crate::decoder::{DecoderState, DialectFormat, SongLayout, VoiceTables};
use crate::reader::{pointer_to_offset, ReadFault, RomReader};
use crate::records::{read_at, AlphaDreamSongHeader, AlphaDreamVoice, ALPHADREAM_VOICE_END, ALPHADREAM_VOICE_SIZE};
use crate::{DecodeError, RomTables};

/// Samples are recorded at their native rate for this key.
const ROOT_KEY: u8 = 60;

/// Voice flag bit: play at the native sample rate regardless of key.
const FLAG_FIXED: u8 = 0x01;

/// Upper bound on key-range entries scanned per voice.
const MAX_RANGES: usize = 128;

pub struct AlphaDreamFormat;

impl DialectFormat for AlphaDreamFormat {
    fn dialect(&self) -> Dialect {
        Dialect::AlphaDream
    }

    fn song_layout(&self, rom: &[u8], tables: &RomTables, index: usize) -> Result<SongLayout, DecodeError> {
        let voice_table = tables.voice_table.ok_or(DecodeError::MissingTable { table: "voice" })?;
        let entry_offset = tables.song_table + index * 4;
        let header_err = || DecodeError::BadHeader { song: index, offset: entry_offset };

        let pointer = RomReader::new(rom, entry_offset).read_u32_le().map_err(|_| header_err())?;
        let header_offset = pointer_to_offset(pointer, rom.len()).ok_or_else(header_err)?;
        let header: AlphaDreamSongHeader = read_at(rom, header_offset).ok_or_else(header_err)?;

        let max = Dialect::AlphaDream.max_tracks();
        let mut tracks = vec![None; max];
        let mut offsets = header.offsets.iter();
        for (slot, track) in tracks.iter_mut().enumerate() {
            if header.track_bits & (1 << slot) == 0 {
                continue;
            }
            let Some(rel) = offsets.next() else { break };
            let start = header_offset + *rel as usize;
            if start >= rom.len() {
                return Err(header_err());
            }
            *track = Some(start);
        }
        if header.track_bits >> max != 0 {
            tracing::warn!(song = index, bits = header.track_bits, "ignoring track bits beyond the track pool");
        }
        if tracks.iter().all(Option::is_none) {
            tracks.clear();
        }
        Ok(SongLayout { tracks, voice_table })
    }

    fn decode_command(&self, reader: &mut RomReader<'_>, _state: &mut DecoderState) -> Result<Command, ReadFault> {
        let opcode = reader.read_u8()?;
        let command = match opcode {
            0x00..=0x5F => Command::Note {
                key: reader.read_u8()?,
                velocity: None,
                duration: opcode as u16 + 1,
            },
            0x60..=0x7F => Command::Rest { ticks: (opcode - 0x5F) as u16 },
            0x80 => Command::Note {
                key: reader.read_u8()?,
                velocity: Some(reader.read_u8()?),
                duration: reader.read_u8()? as u16,
            },
            0x81 => Command::Rest { ticks: reader.read_u8()? as u16 },
            0x82 => Command::Voice(reader.read_u8()?),
            0x83 => Command::Volume(reader.read_u8()?),
            0x84 => Command::Pan((reader.read_u8()? as i16 - 0x40).clamp(-64, 63) as i8),
            0x85 => Command::PitchBend(reader.read_i8()?),
            0x86 => Command::PitchBendRange(reader.read_u8()?),
            0x87 => Command::Tempo(reader.read_u8()? as u16),
            0x88 => Command::KeyShift(reader.read_i8()?),
            0x90 => Command::Jump { target: relative_target(reader)? },
            0x91 => Command::Call { target: relative_target(reader)? },
            0x92 => Command::Return,
            0xFF => Command::Finish,
            _ => return Err(ReadFault::Opcode(opcode)),
        };
        Ok(command)
    }

    fn voice_entry(&self, rom: &[u8], tables: &VoiceTables, voice: u8, key: u8) -> Option<VoiceEntry> {
        let sample_table = tables.sample_table?;
        let rel = RomReader::new(rom, tables.voice_table + voice as usize * 4).read_u32_le().ok()?;
        let list = tables.voice_table + rel as usize;

        let range = (0..MAX_RANGES)
            .map_while(|i| read_at::<AlphaDreamVoice>(rom, list + i * ALPHADREAM_VOICE_SIZE))
            .take_while(|r| r.min_key != ALPHADREAM_VOICE_END)
            .find(|r| (r.min_key..=r.max_key).contains(&key))?;

        let sample_rel = RomReader::new(rom, sample_table + range.sample_id as usize * 4).read_u32_le().ok()?;
        let sample = sample_table + sample_rel as usize;
        if sample >= rom.len() {
            return None;
        }
        let [attack, decay, sustain, release] = range.adsr;
        Some(VoiceEntry {
            min_key: range.min_key,
            max_key: range.max_key,
            root_key: ROOT_KEY,
            sample,
            fixed_frequency: range.flags & FLAG_FIXED != 0,
            pan: None,
            adsr: Adsr { attack, decay, sustain, release },
        })
    }
}

/// Resolve an i16 displacement relative to the following opcode.
fn relative_target(reader: &mut RomReader<'_>) -> Result<usize, ReadFault> {
    let disp = reader.read_i16_le()?;
    let target = reader.pos() as i64 + disp as i64;
    if target < 0 || target as usize >= reader.len() {
        return Err(ReadFault::Pointer(target as u32));
    }
    Ok(target as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Result<Command, ReadFault> {
        let mut reader = RomReader::new(bytes, 0);
        AlphaDreamFormat.decode_command(&mut reader, &mut DecoderState::default())
    }

    #[test]
    fn compact_note_duration_in_opcode() {
        assert_eq!(
            decode(&[0x0B, 0x3C]),
            Ok(Command::Note { key: 0x3C, velocity: None, duration: 12 })
        );
    }

    #[test]
    fn free_note_has_explicit_operands() {
        assert_eq!(
            decode(&[0x80, 0x40, 0x64, 0xC0]),
            Ok(Command::Note { key: 0x40, velocity: Some(0x64), duration: 0xC0 })
        );
    }

    #[test]
    fn rest_ranges() {
        assert_eq!(decode(&[0x60]), Ok(Command::Rest { ticks: 1 }));
        assert_eq!(decode(&[0x7F]), Ok(Command::Rest { ticks: 32 }));
        assert_eq!(decode(&[0x81, 200]), Ok(Command::Rest { ticks: 200 }));
    }

    #[test]
    fn forward_call_target() {
        let bytes = [0x91, 0x02, 0x00, 0xFF, 0xFF, 0x92];
        assert_eq!(decode(&bytes), Ok(Command::Call { target: 5 }));
    }

    #[test]
    fn jump_before_rom_start_is_pointer_fault() {
        assert!(matches!(decode(&[0x90, 0xF0, 0xFF]), Err(ReadFault::Pointer(_))));
    }

    #[test]
    fn truncated_free_note_is_eof() {
        assert_eq!(decode(&[0x80, 0x40]), Err(ReadFault::Eof));
    }

    #[test]
    fn unassigned_opcode() {
        assert_eq!(decode(&[0xA0]), Err(ReadFault::Opcode(0xA0)));
    }

    fn voice_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x60];
        // voice table at 0x00: voice 0 -> ranges at +0x10
        rom[0..4].copy_from_slice(&0x10u32.to_le_bytes());
        // range 0..=59 sample 0, range 60..=127 sample 1 (fixed), terminator
        rom[0x10..0x18].copy_from_slice(&[0, 59, 0, 0, 0xFF, 0x10, 0x60, 0x08]);
        rom[0x18..0x20].copy_from_slice(&[60, 127, 1, FLAG_FIXED, 0x7F, 0x20, 0x40, 0x10]);
        rom[0x20] = ALPHADREAM_VOICE_END;
        // sample table at 0x30
        rom[0x30..0x34].copy_from_slice(&0x10u32.to_le_bytes());
        rom[0x34..0x38].copy_from_slice(&0x20u32.to_le_bytes());
        rom
    }

    #[test]
    fn voice_entry_picks_key_range() {
        let rom = voice_rom();
        let tables = VoiceTables { voice_table: 0, sample_table: Some(0x30) };

        let low = AlphaDreamFormat.voice_entry(&rom, &tables, 0, 40).unwrap();
        assert_eq!(low.sample, 0x40);
        assert!(!low.fixed_frequency);
        assert_eq!(low.adsr.attack, 0xFF);

        let high = AlphaDreamFormat.voice_entry(&rom, &tables, 0, 72).unwrap();
        assert_eq!(high.sample, 0x50);
        assert!(high.fixed_frequency);
        assert_eq!(high.root_key, 60);
    }

    #[test]
    fn voice_entry_needs_sample_table() {
        let rom = voice_rom();
        let tables = VoiceTables { voice_table: 0, sample_table: None };
        assert!(AlphaDreamFormat.voice_entry(&rom, &tables, 0, 40).is_none());
    }
}
