//! Allocation-free render path tests.
//!
//! Once a song is loaded and playing, `Player::tick` must not touch the
//! heap: every buffer is sized up front and the channel pool is fixed.
//!
//! Runs under plain `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use rt_engine::{Frame, PlaybackOptions, Player, SongState};
use rt_formats::{RomTables, ROM_BASE};
use rt_ir::Dialect;
use std::sync::Arc;

fn ptr(offset: usize) -> [u8; 4] {
    (ROM_BASE + offset as u32).to_le_bytes()
}

/// Looping Mp2k song: a four-note chord under vibrato, tempo change, jump back.
fn looping_rom() -> Arc<[u8]> {
    let mut rom = vec![0u8; 0x800];
    rom[0x100..0x104].copy_from_slice(&ptr(0x200));
    rom[0x200] = 1;
    rom[0x204..0x208].copy_from_slice(&ptr(0x300));
    rom[0x208..0x20C].copy_from_slice(&ptr(0x600));

    let voice = 0x300 + 5 * 12;
    rom[voice..voice + 4].copy_from_slice(&[0x00, 60, 0, 0]);
    rom[voice + 4..voice + 8].copy_from_slice(&ptr(0x400));
    rom[voice + 8..voice + 12].copy_from_slice(&[0x20, 0xF0, 0x80, 0xC0]);

    rom[0x400..0x404].copy_from_slice(&0x4000_0000u32.to_le_bytes());
    rom[0x404..0x408].copy_from_slice(&(13379u32 << 10).to_le_bytes());
    rom[0x40C..0x410].copy_from_slice(&64u32.to_le_bytes());
    for i in 0..64 {
        rom[0x410 + i] = (i as u8).wrapping_mul(4);
    }

    let body = [
        0xBD, 0x05, 0xBE, 0x7F, 0xBB, 0x60, 0xC4, 0x20, 0xC2, 0x04, // voice, volume, tempo, mod depth, LFO speed
        0xE0, 0x3C, 0x7F, 0xE0, 0x40, 0xE0, 0x43, 0xE0, 0x48, 0x98, // chord, rest
        0xB2,
    ];
    rom[0x600..0x600 + body.len()].copy_from_slice(&body);
    rom[0x600 + body.len()..0x600 + body.len() + 4].copy_from_slice(&ptr(0x604));
    rom.into()
}

fn playing_player() -> Player {
    let tables = RomTables { dialect: Dialect::Mp2k, song_table: 0x100, song_count: 1, voice_table: None, sample_table: None };
    let options = PlaybackOptions { fade_out_ms: None, ..PlaybackOptions::default() };
    let mut player = Player::new(looping_rom(), tables, options);
    player.load_song(0).unwrap();
    player.play();
    player
}

#[test]
fn tick_is_alloc_free() {
    let mut player = playing_player();
    let mut out: Vec<Frame> = Vec::with_capacity(player.mixer().block_frames());

    // Warm-up through the first loop: first-use initialization (log callsites) may allocate.
    while player.loops() == 0 {
        out.clear();
        player.tick(Some(&mut out), None);
    }

    assert_no_alloc(|| {
        for _ in 0..600 {
            out.clear();
            player.tick(Some(&mut out), None);
        }
    });
    assert!(player.loops() > 1);
}

#[test]
fn snapshot_is_alloc_free() {
    let mut player = playing_player();
    let mut state = SongState::default();
    while player.loops() == 0 {
        player.tick(None, None);
    }

    assert_no_alloc(|| {
        for _ in 0..60 {
            player.tick(None, None);
            player.update_song_state(&mut state);
        }
    });
    assert_eq!(state.tracks.len(), 1);
}
