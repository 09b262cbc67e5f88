//! Mp2k opcode table.
//!
//! | Opcode      | Command           | Operands                                   |
//! |-------------|-------------------|--------------------------------------------|
//! | `0x00-0x7F` | running status    | repeats the last `0xBD-0xFF` opcode; the byte is its first operand |
//! | `0x80-0xB0` | rest              | ticks = `LENGTHS[op - 0x80]`               |
//! | `0xB1`      | finish            |                                            |
//! | `0xB2`      | jump              | u32 pointer                                |
//! | `0xB3`      | call              | u32 pointer                                |
//! | `0xB4`      | return            |                                            |
//! | `0xB9`      | memory access     | op, address, data                          |
//! | `0xBA`      | priority          | 1                                          |
//! | `0xBB`      | tempo             | 1 (stored halved)                          |
//! | `0xBC`      | key shift         | 1 (signed)                                 |
//! | `0xBD`      | voice             | 1                                          |
//! | `0xBE`      | volume            | 1                                          |
//! | `0xBF`      | pan               | 1 (0x40 = center)                          |
//! | `0xC0`      | pitch bend        | 1 (0x40 = center)                          |
//! | `0xC1`      | pitch bend range  | 1                                          |
//! | `0xC2`      | LFO speed         | 1                                          |
//! | `0xC3`      | LFO delay         | 1                                          |
//! | `0xC4`      | mod depth         | 1                                          |
//! | `0xC5`      | mod type          | 1                                          |
//! | `0xC8`      | tune              | 1 (0x40 = center)                          |
//! | `0xCD`      | extended command  | kind, value                                |
//! | `0xCE`      | end of tie        | optional key                               |
//! | `0xCF`      | tie               | optional key, velocity                     |
//! | `0xD0-0xFF` | note              | optional key, velocity, gate extension; duration = `LENGTHS[op - 0xCF]` |
//!
//! Optional operands are present only while the next byte is below 0x80;
//! omitted keys and velocities reuse the previous ones.

use rt_ir::{Adsr, Command, Dialect, ModType, VoiceEntry};

use crate::decoder::{DecoderState, DialectFormat, SongLayout, VoiceTables};
use crate::reader::{pointer_to_offset, ReadFault, RomReader};
use crate::records::{read_at, Mp2kSongEntry, Mp2kSongHeader, Mp2kVoice, MP2K_VOICE_SIZE};
use crate::{DecodeError, RomTables};

/// Tick lengths shared by rests (`0x80 + i`) and notes (`0xCF + i`).
pub const LENGTHS: [u8; 49] = [
    0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 28,
    30, 32, 36, 40, 42, 44, 48, 52, 54, 56, 60, 64, 66, 68, 72, 76, 78, 80, 84, 88, 90, 92, 96,
];

const SONG_ENTRY_SIZE: usize = 8;

// Voice kinds
const VOICE_DIRECT: u8 = 0x00;
const VOICE_DIRECT_FIXED: u8 = 0x08;
const VOICE_KEY_SPLIT: u8 = 0x40;
const VOICE_DRUM: u8 = 0x80;

/// Key at which a sample plays at its native rate.
const MIDDLE_C: u8 = 60;

/// Running-status repeats only apply to opcodes at or above this value.
const RUNNING_STATUS_MIN: u8 = 0xBD;

pub struct Mp2kFormat;

impl DialectFormat for Mp2kFormat {
    fn dialect(&self) -> Dialect {
        Dialect::Mp2k
    }

    fn song_layout(&self, rom: &[u8], tables: &RomTables, index: usize) -> Result<SongLayout, DecodeError> {
        let entry_offset = tables.song_table + index * SONG_ENTRY_SIZE;
        let header_err = || DecodeError::BadHeader { song: index, offset: entry_offset };

        let entry: Mp2kSongEntry = read_at(rom, entry_offset).ok_or_else(header_err)?;
        let header_offset = pointer_to_offset(entry.header, rom.len()).ok_or_else(header_err)?;
        let header: Mp2kSongHeader = read_at(rom, header_offset).ok_or_else(header_err)?;
        if header.tracks.is_empty() {
            return Ok(SongLayout::default());
        }

        let voice_table = pointer_to_offset(header.voice_group, rom.len()).ok_or_else(header_err)?;
        let mut tracks = Vec::with_capacity(header.tracks.len());
        for pointer in header.tracks.iter().take(Dialect::Mp2k.max_tracks()) {
            let start = pointer_to_offset(*pointer, rom.len()).ok_or_else(header_err)?;
            tracks.push(Some(start));
        }
        Ok(SongLayout { tracks, voice_table })
    }

    fn decode_command(&self, reader: &mut RomReader<'_>, state: &mut DecoderState) -> Result<Command, ReadFault> {
        let byte = reader.read_u8()?;
        let (opcode, first) = if byte < 0x80 {
            (state.running.ok_or(ReadFault::Opcode(byte))?, Some(byte))
        } else {
            if byte >= RUNNING_STATUS_MIN {
                state.running = Some(byte);
            }
            (byte, None)
        };

        // First operand comes from the running-status byte when there is one.
        let arg = |reader: &mut RomReader<'_>| match first {
            Some(b) => Ok(b),
            None => reader.read_u8(),
        };

        let command = match opcode {
            0x80..=0xB0 => Command::Rest { ticks: LENGTHS[(opcode - 0x80) as usize] as u16 },
            0xB1 => Command::Finish,
            0xB2 => Command::Jump { target: reader.read_pointer()? },
            0xB3 => Command::Call { target: reader.read_pointer()? },
            0xB4 => Command::Return,
            0xB9 => Command::MemoryAccess {
                op: reader.read_u8()?,
                address: reader.read_u8()?,
                data: reader.read_u8()?,
            },
            0xBA => Command::Priority(reader.read_u8()?),
            0xBB => Command::Tempo(reader.read_u8()? as u16 * 2),
            0xBC => Command::KeyShift(reader.read_i8()?),
            0xBD => Command::Voice(arg(reader)?),
            0xBE => Command::Volume(arg(reader)? & 0x7F),
            0xBF => Command::Pan(centered(arg(reader)?)),
            0xC0 => Command::PitchBend(centered(arg(reader)?)),
            0xC1 => Command::PitchBendRange(arg(reader)?),
            0xC2 => Command::LfoSpeed(arg(reader)?),
            0xC3 => Command::LfoDelay(arg(reader)?),
            0xC4 => Command::ModDepth(arg(reader)?),
            0xC5 => Command::ModType(ModType::from_raw(arg(reader)?)),
            0xC8 => Command::Tune(centered(arg(reader)?)),
            0xCD => Command::ExtendedCommand { kind: arg(reader)?, value: reader.read_u8()? },
            0xCE => {
                let key = first.or_else(|| reader.read_operand());
                if let Some(k) = key {
                    state.key = k;
                }
                Command::EndOfTie { key }
            }
            0xCF => {
                let (key, velocity) = note_operands(reader, first, state);
                Command::Tie { key, velocity }
            }
            0xD0..=0xFF => {
                let (key, velocity) = note_operands(reader, first, state);
                let extra = reader.read_operand().unwrap_or(0) as u16;
                let duration = LENGTHS[(opcode - 0xCF) as usize] as u16 + extra;
                Command::Note { key, velocity: Some(velocity), duration }
            }
            _ => return Err(ReadFault::Opcode(opcode)),
        };
        Ok(command)
    }

    fn voice_entry(&self, rom: &[u8], tables: &VoiceTables, voice: u8, key: u8) -> Option<VoiceEntry> {
        let offset = tables.voice_table + voice as usize * MP2K_VOICE_SIZE;
        let raw: Mp2kVoice = read_at(rom, offset)?;
        match raw.kind {
            VOICE_KEY_SPLIT => {
                let group = pointer_to_offset(raw.pointer, rom.len())?;
                let keymap = pointer_to_offset(u32::from_le_bytes(raw.tail), rom.len())?;
                let sub = *rom.get(keymap + key as usize)?;
                let sub_raw: Mp2kVoice = read_at(rom, group + sub as usize * MP2K_VOICE_SIZE)?;
                direct_sound(&sub_raw, rom.len())
            }
            VOICE_DRUM => {
                let group = pointer_to_offset(raw.pointer, rom.len())?;
                let sub_raw: Mp2kVoice = read_at(rom, group + key as usize * MP2K_VOICE_SIZE)?;
                // Drum hits sound at the sub-voice's key, whatever key triggered them.
                let mut entry = direct_sound(&sub_raw, rom.len())?;
                entry.min_key = key;
                entry.max_key = key;
                entry.root_key = (key as i16 + MIDDLE_C as i16 - sub_raw.key as i16).clamp(0, 255) as u8;
                Some(entry)
            }
            _ => direct_sound(&raw, rom.len()),
        }
    }
}

/// Convert a 0x40-centered operand to a signed value.
fn centered(value: u8) -> i8 {
    (value as i16 - 0x40).clamp(-64, 63) as i8
}

/// Read the optional key and velocity of a note or tie.
fn note_operands(reader: &mut RomReader<'_>, first: Option<u8>, state: &mut DecoderState) -> (u8, u8) {
    if let Some(k) = first.or_else(|| reader.read_operand()) {
        state.key = k;
        if let Some(v) = reader.read_operand() {
            state.velocity = v;
        }
    }
    (state.key, state.velocity)
}

/// Build a sample-playing entry; PSG voices are not synthesized.
fn direct_sound(raw: &Mp2kVoice, rom_len: usize) -> Option<VoiceEntry> {
    if raw.kind != VOICE_DIRECT && raw.kind != VOICE_DIRECT_FIXED {
        tracing::trace!(kind = raw.kind, "skipping non-sample voice");
        return None;
    }
    let sample = pointer_to_offset(raw.pointer, rom_len)?;
    let pan = (raw.pan_sweep & 0x80 != 0).then(|| centered(raw.pan_sweep & 0x7F));
    Some(VoiceEntry {
        min_key: 0,
        max_key: 127,
        root_key: MIDDLE_C,
        sample,
        fixed_frequency: raw.kind == VOICE_DIRECT_FIXED,
        pan,
        adsr: Adsr {
            attack: raw.tail[0],
            decay: raw.tail[1],
            sustain: raw.tail[2],
            release: raw.tail[3],
        },
    })
}
