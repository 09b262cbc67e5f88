//! Fixed-layout ROM records.
//!
//! All records are little-endian. Pointer fields hold mapped ROM addresses
//! (see [`crate::ROM_BASE`]); callers convert them with `pointer_to_offset`.

use alloc::vec::Vec;
use binrw::io::Cursor;
use binrw::BinRead;
use rt_ir::{SampleHeader, SAMPLE_LOOP_FLAG};

/// Size of a sample header in bytes; sample data follows directly.
pub const SAMPLE_HEADER_SIZE: usize = 16;

/// Read a record at `offset`. `None` if it does not fit inside the ROM.
pub(crate) fn read_at<T>(rom: &[u8], offset: usize) -> Option<T>
where
    T: BinRead + binrw::meta::ReadEndian,
    for<'a> T::Args<'a>: Default,
{
    let bytes = rom.get(offset..)?;
    T::read_args(&mut Cursor::new(bytes), Default::default()).ok()
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

#[derive(BinRead, Debug)]
#[br(little)]
struct RawSampleHeader {
    flags: u32,
    pitch: u32,
    loop_start: u32,
    length: u32,
}

/// Read a sample header. The length is clamped to the bytes actually present.
pub fn read_sample_header(rom: &[u8], offset: usize) -> Option<SampleHeader> {
    let raw: RawSampleHeader = read_at(rom, offset)?;
    let data_offset = offset + SAMPLE_HEADER_SIZE;
    let available = rom.len().saturating_sub(data_offset);
    let length = (raw.length as usize).min(available) as u32;
    Some(SampleHeader {
        looped: raw.flags & SAMPLE_LOOP_FLAG != 0,
        loop_start: raw.loop_start,
        length,
        pitch: raw.pitch,
        data_offset,
    })
}

// ---------------------------------------------------------------------------
// Mp2k tables
// ---------------------------------------------------------------------------

#[derive(BinRead, Debug)]
#[br(little)]
pub(crate) struct Mp2kSongEntry {
    pub header: u32,
    #[allow(dead_code)]
    pub music_player: u16,
    #[allow(dead_code)]
    pub unused: u16,
}

#[derive(BinRead, Debug)]
#[br(little)]
pub(crate) struct Mp2kSongHeader {
    pub num_tracks: u8,
    #[allow(dead_code)]
    pub num_blocks: u8,
    #[allow(dead_code)]
    pub priority: u8,
    #[allow(dead_code)]
    pub reverb: u8,
    pub voice_group: u32,
    #[br(count = num_tracks as usize)]
    pub tracks: Vec<u32>,
}

/// One 12-byte voice group entry. The meaning of `pointer` and `tail`
/// depends on `kind` (sample + ADSR, key split, or drum kit).
#[derive(BinRead, Debug)]
#[br(little)]
pub(crate) struct Mp2kVoice {
    pub kind: u8,
    pub key: u8,
    #[allow(dead_code)]
    pub length: u8,
    pub pan_sweep: u8,
    pub pointer: u32,
    pub tail: [u8; 4],
}

pub(crate) const MP2K_VOICE_SIZE: usize = 12;

// ---------------------------------------------------------------------------
// AlphaDream tables
// ---------------------------------------------------------------------------

#[derive(BinRead, Debug)]
#[br(little)]
pub(crate) struct AlphaDreamSongHeader {
    pub track_bits: u16,
    #[br(count = track_bits.count_ones() as usize)]
    pub offsets: Vec<u16>,
}

/// One 8-byte key-range entry of an AlphaDream voice.
#[derive(BinRead, Debug)]
#[br(little)]
pub(crate) struct AlphaDreamVoice {
    pub min_key: u8,
    pub max_key: u8,
    pub sample_id: u8,
    pub flags: u8,
    pub adsr: [u8; 4],
}

pub(crate) const ALPHADREAM_VOICE_SIZE: usize = 8;

/// Key-range list terminator.
pub(crate) const ALPHADREAM_VOICE_END: u8 = 0xFF;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample_bytes(flags: u32, pitch: u32, loop_start: u32, length: u32, data: &[i8]) -> Vec<u8> {
        let mut out = vec![];
        for v in [flags, pitch, loop_start, length] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out.extend(data.iter().map(|&b| b as u8));
        out
    }

    #[test]
    fn sample_header_fields() {
        let rom = sample_bytes(SAMPLE_LOOP_FLAG, 8000 << 10, 2, 4, &[1, 2, 3, 4]);
        let header = read_sample_header(&rom, 0).unwrap();
        assert!(header.looped);
        assert_eq!(header.loop_start, 2);
        assert_eq!(header.length, 4);
        assert_eq!(header.data_offset, SAMPLE_HEADER_SIZE);
        assert_eq!(header.rate_hz(), 8000.0);
    }

    #[test]
    fn sample_length_clamped_to_rom() {
        let rom = sample_bytes(0, 8000 << 10, 0, 1000, &[1, 2, 3]);
        let header = read_sample_header(&rom, 0).unwrap();
        assert_eq!(header.length, 3);
        assert!(!header.looped);
    }

    #[test]
    fn truncated_header_is_none() {
        let rom = [0u8; 10];
        assert!(read_sample_header(&rom, 0).is_none());
        assert!(read_sample_header(&rom, 100).is_none());
    }

    #[test]
    fn mp2k_song_header_reads_track_pointers() {
        let mut rom = vec![2, 0, 0, 0];
        rom.extend_from_slice(&0x0800_0100u32.to_le_bytes());
        rom.extend_from_slice(&0x0800_0200u32.to_le_bytes());
        rom.extend_from_slice(&0x0800_0300u32.to_le_bytes());
        let header: Mp2kSongHeader = read_at(&rom, 0).unwrap();
        assert_eq!(header.voice_group, 0x0800_0100);
        assert_eq!(header.tracks, vec![0x0800_0200, 0x0800_0300]);
    }

    #[test]
    fn alphadream_header_counts_set_bits() {
        let rom = [0b101, 0, 0x10, 0, 0x20, 0];
        let header: AlphaDreamSongHeader = read_at(&rom, 0).unwrap();
        assert_eq!(header.offsets, vec![0x10, 0x20]);
    }
}
