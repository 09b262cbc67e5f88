//! Integration test: synthetic ROM -> load -> tick -> verify rendered output.

use rt_engine::{Frame, PlaybackOptions, Player, PlayerState, SongState};
use rt_formats::{RomTables, ROM_BASE};
use rt_ir::{Dialect, Interpolation};
use std::sync::Arc;

const SONG_TABLE: usize = 0x100;
const HEADER: usize = 0x200;
const VOICE_GROUP: usize = 0x300;
const SAMPLE: usize = 0x400;
const TRACK: usize = 0x600;
/// Spacing between track bodies
const TRACK_STRIDE: usize = 0x100;

fn ptr(offset: usize) -> [u8; 4] {
    (ROM_BASE + offset as u32).to_le_bytes()
}

/// One-song Mp2k image. Voice 5 plays a looped square wave with an
/// instant attack, full sustain and an immediate release.
fn mp2k_rom(tracks: &[&[u8]]) -> Arc<[u8]> {
    let mut rom = vec![0u8; TRACK + TRACK_STRIDE * tracks.len().max(1)];
    rom[SONG_TABLE..SONG_TABLE + 4].copy_from_slice(&ptr(HEADER));

    rom[HEADER] = tracks.len() as u8;
    rom[HEADER + 4..HEADER + 8].copy_from_slice(&ptr(VOICE_GROUP));
    for (i, body) in tracks.iter().enumerate() {
        let start = TRACK + i * TRACK_STRIDE;
        rom[HEADER + 8 + i * 4..HEADER + 12 + i * 4].copy_from_slice(&ptr(start));
        rom[start..start + body.len()].copy_from_slice(body);
    }

    let voice = VOICE_GROUP + 5 * 12;
    rom[voice..voice + 4].copy_from_slice(&[0x00, 60, 0, 0]);
    rom[voice + 4..voice + 8].copy_from_slice(&ptr(SAMPLE));
    rom[voice + 8..voice + 12].copy_from_slice(&[0xFF, 0x00, 0xFF, 0x00]);

    rom[SAMPLE..SAMPLE + 4].copy_from_slice(&0x4000_0000u32.to_le_bytes());
    rom[SAMPLE + 4..SAMPLE + 8].copy_from_slice(&(13379u32 << 10).to_le_bytes());
    rom[SAMPLE + 12..SAMPLE + 16].copy_from_slice(&64u32.to_le_bytes());
    for i in 0..64 {
        rom[SAMPLE + 16 + i] = if i < 32 { 0x40 } else { 0xC0 };
    }
    rom.into()
}

fn tables() -> RomTables {
    RomTables { dialect: Dialect::Mp2k, song_table: SONG_TABLE, song_count: 1, voice_table: None, sample_table: None }
}

fn player(tracks: &[&[u8]], options: PlaybackOptions) -> Player {
    let mut player = Player::new(mp2k_rom(tracks), tables(), options);
    player.load_song(0).unwrap();
    player.play();
    player
}

fn has_nonsilent_frames(frames: &[Frame]) -> bool {
    frames.iter().any(|f| f.left != 0 || f.right != 0)
}

/// voice 5, volume 127, note C4 for 10 ticks, rest 10, finish
const ONE_NOTE: [u8; 9] = [0xBD, 0x05, 0xBE, 0x7F, 0xD9, 0x3C, 0x7F, 0x8A, 0xB1];

/// The same note looping forever through a jump back to it.
fn looping_note() -> Vec<u8> {
    let mut body = vec![0xBD, 0x05, 0xBE, 0x7F, 0xD9, 0x3C, 0x7F, 0x8A, 0xB2];
    body.extend_from_slice(&ptr(TRACK + 4));
    body
}

// === Single note ===

#[test]
fn one_note_song_length() {
    let p = player(&[&ONE_NOTE], PlaybackOptions::default());
    let song = p.song().unwrap();
    assert_eq!(song.max_ticks, 10);
    assert_eq!(song.loop_anchor_track, 0);
    assert_eq!(p.state(), PlayerState::Playing);
}

#[test]
fn note_sounds_on_first_block() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    let mut out: Vec<Frame> = Vec::new();
    assert!(!p.tick(Some(&mut out), None));
    assert_eq!(out.len(), 738);
    assert!(has_nonsilent_frames(&out));

    let ch = &p.mixer().channels()[0];
    assert!(ch.is_active());
    assert_eq!(ch.key(), 0x3C);
    assert_eq!(ch.owner(), Some(0));
}

#[test]
fn one_note_song_finishes() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    let mut out: Vec<Frame> = Vec::new();
    let mut blocks = 0;
    while !p.tick(Some(&mut out), None) {
        blocks += 1;
        assert!(blocks < 40, "song never finished");
    }
    assert!(blocks >= 10, "finished after {} blocks", blocks);
    assert_eq!(p.mixer().active_channels(), 0);
    assert!(p.tracks()[0].is_stopped());
}

#[test]
fn muted_track_renders_silence() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    p.set_track_muted(0, true);
    let mut out: Vec<Frame> = Vec::new();
    for _ in 0..5 {
        p.tick(Some(&mut out), None);
    }
    assert!(!has_nonsilent_frames(&out));
    assert_eq!(p.mixer().active_channels(), 1);
}

#[test]
fn output_and_recording_match() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    let mut out: Vec<Frame> = Vec::new();
    let mut rec: Vec<Frame> = Vec::new();
    for _ in 0..3 {
        p.tick(Some(&mut out), Some(&mut rec));
    }
    assert_eq!(out, rec);
}

#[test]
fn paused_player_does_not_advance() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    p.tick(None, None);
    p.pause();
    assert_eq!(p.state(), PlayerState::Paused);
    let ticks = p.elapsed_ticks();
    let mut out: Vec<Frame> = Vec::new();
    p.tick(Some(&mut out), None);
    assert!(out.is_empty());
    assert_eq!(p.elapsed_ticks(), ticks);
    p.pause();
    assert_eq!(p.state(), PlayerState::Playing);
}

#[test]
fn interpolation_modes_both_render() {
    for interpolation in [Interpolation::None, Interpolation::Linear] {
        let options = PlaybackOptions { interpolation, ..PlaybackOptions::default() };
        let mut p = player(&[&ONE_NOTE], options);
        let mut out: Vec<Frame> = Vec::new();
        p.tick(Some(&mut out), None);
        assert!(has_nonsilent_frames(&out));
    }
}

// === Looping and fades ===

#[test]
fn looping_song_fades_out_after_play_count() {
    let body = looping_note();
    let options = PlaybackOptions { play_count: 1, fade_out_ms: Some(100), ..PlaybackOptions::default() };
    let mut p = player(&[&body], options);
    assert_eq!(p.song().unwrap().max_ticks, 10);

    let mut blocks = 0;
    while !p.tick(None, None) {
        blocks += 1;
        assert!(blocks < 60, "fade never finished");
    }
    assert_eq!(p.loops(), 2);
    assert!(p.mixer().is_fade_done());
    assert!(!p.tracks()[0].is_stopped());
}

#[test]
fn looping_song_without_fade_runs_forever() {
    let body = looping_note();
    let options = PlaybackOptions { fade_out_ms: None, ..PlaybackOptions::default() };
    let mut p = player(&[&body], options);
    for _ in 0..200 {
        assert!(!p.tick(None, None));
    }
    assert!(p.loops() >= 10);
    assert!(p.elapsed_ticks() <= 10);
}

/// An intro call into a pattern that the loop body calls again:
/// `call P; loop: call P; rest 4; jump loop` with `P = rest 2; return`.
fn shared_pattern_loop() -> Vec<u8> {
    let pattern = TRACK + 0x40;
    let mut body = vec![0xB3];
    body.extend_from_slice(&ptr(pattern));
    body.push(0xB3);
    body.extend_from_slice(&ptr(pattern));
    body.push(0x84);
    body.push(0xB2);
    body.extend_from_slice(&ptr(TRACK + 5));
    body.resize(0x40, 0);
    body.extend_from_slice(&[0x82, 0xB4]);
    body
}

#[test]
fn loop_through_shared_pattern_keeps_period() {
    let body = shared_pattern_loop();
    let options = PlaybackOptions { fade_out_ms: None, ..PlaybackOptions::default() };
    let mut p = player(&[&body], options);
    let song = p.song().unwrap();
    assert_eq!(song.max_ticks, 8);
    assert_eq!(song.loop_start_tick, Some(2));

    // Loops fire while ticks 8, 14, 20 and 26 execute.
    for (position, loops, elapsed) in [(8, 0, 8), (9, 1, 3), (15, 2, 3), (26, 3, 8), (27, 4, 3)] {
        p.set_song_position(position);
        assert_eq!((p.loops(), p.elapsed_ticks()), (loops, elapsed), "at position {}", position);
    }
}

#[test]
fn fade_in_starts_quiet() {
    let options = PlaybackOptions { fade_in_ms: Some(1000), ..PlaybackOptions::default() };
    let mut quiet = player(&[&ONE_NOTE], options);
    let mut loud = player(&[&ONE_NOTE], PlaybackOptions::default());
    let (mut a, mut b): (Vec<Frame>, Vec<Frame>) = (Vec::new(), Vec::new());
    quiet.tick(Some(&mut a), None);
    loud.tick(Some(&mut b), None);
    let peak = |frames: &[Frame]| frames.iter().map(|f| f.left.unsigned_abs()).max().unwrap_or(0);
    assert!(peak(&a) < peak(&b));
}

// === Seeking and snapshots ===

#[test]
fn seek_rebuilds_state() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    p.set_song_position(4);
    assert_eq!(p.elapsed_ticks(), 4);
    assert_eq!(p.state(), PlayerState::Playing);
    assert_eq!(p.tracks()[0].rest(), 7);

    let mut state = SongState::default();
    p.update_song_state(&mut state);
    assert_eq!(state.elapsed_ticks, 4);
    assert_eq!(state.tracks.len(), 1);
    let track = &state.tracks[0];
    assert_eq!(track.voice, 5);
    assert_eq!(track.volume, 127);
    assert_eq!(track.position, TRACK + 8);
    assert_eq!(track.held_keys.as_slice(), &[0x3C]);
}

#[test]
fn seek_before_play_resumes_there() {
    let mut p = Player::new(mp2k_rom(&[&ONE_NOTE]), tables(), PlaybackOptions::default());
    p.load_song(0).unwrap();
    p.set_song_position(4);
    assert_eq!(p.state(), PlayerState::Paused);

    p.set_sample_rate(22050);
    assert_eq!(p.mixer().active_channels(), 1);

    p.play();
    assert_eq!(p.state(), PlayerState::Playing);
    assert_eq!(p.elapsed_ticks(), 4);
    assert_eq!(p.tracks()[0].rest(), 7);

    let mut out: Vec<Frame> = Vec::new();
    p.tick(Some(&mut out), None);
    assert_eq!(out.len(), 369);
    assert!(has_nonsilent_frames(&out));
    assert_eq!(p.elapsed_ticks(), 5);
}

#[test]
fn snapshot_lists_enabled_tracks_only() {
    let p = player(&[&ONE_NOTE, &ONE_NOTE], PlaybackOptions::default());
    let mut state = SongState::default();
    p.update_song_state(&mut state);
    assert_eq!(state.tracks.len(), 2);
    assert_eq!(state.tempo, 150);
    assert!(state.tracks.iter().all(|t| !t.muted && !t.stopped));
}

// === Channel pool ===

#[test]
fn saturated_pool_steals_first_channel() {
    // 13 simultaneous notes on a 12-channel pool
    let mut body = vec![0xBD, 0x05, 0xBE, 0x7F];
    for key in 0..13u8 {
        body.extend_from_slice(&[0xD9, 0x30 + key, 0x7F]);
    }
    body.extend_from_slice(&[0x8A, 0xB1]);
    let mut p = player(&[&body], PlaybackOptions::default());
    p.tick(None, None);

    let channels = p.mixer().channels();
    assert_eq!(p.mixer().active_channels(), 12);
    assert_eq!(channels[0].key(), 0x30 + 12);
    assert!(channels.iter().all(|c| c.key() != 0x30));
    assert_eq!(channels[11].key(), 0x30 + 11);
}

#[test]
fn two_tracks_share_the_pool() {
    let mut p = player(&[&ONE_NOTE, &ONE_NOTE], PlaybackOptions::default());
    p.tick(None, None);
    let owners: Vec<Option<usize>> = p.mixer().channels().iter().take(2).map(|c| c.owner()).collect();
    assert_eq!(owners, vec![Some(0), Some(1)]);
}

// === Loading ===

#[test]
fn out_of_range_song_keeps_previous() {
    let mut p = player(&[&ONE_NOTE], PlaybackOptions::default());
    let err = p.load_song(1).unwrap_err();
    assert_eq!(err, rt_engine::LoadError::SongIndexOutOfRange { index: 1, count: 1 });
    assert_eq!(p.song_index(), Some(0));
    assert_eq!(p.song().unwrap().max_ticks, 10);
}
