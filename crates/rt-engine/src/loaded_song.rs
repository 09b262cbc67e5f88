//! Tick resolution for a decoded song.
//!
//! Every track is run through the live execution path with a silent output,
//! recording the elapsed tick each time an offset is reached. A track's run
//! ends when it finishes or, outside of called patterns, reaches an offset
//! it has already visited. The longest track becomes the loop anchor.

use alloc::vec::Vec;
use rt_formats::{DecodedSong, DecodedTrack, VoiceTables};
use rt_ir::{find_event, Dialect, SongEvent};

use crate::track::{Silent, Track, MAX_COMMANDS_PER_TICK};

/// Upper bound on ticks simulated per track.
pub const MAX_RESOLVE_TICKS: u32 = 1 << 22;

/// A decoded song with tick numbers assigned to every event occurrence.
#[derive(Clone, Debug, Default)]
pub struct LoadedSong {
    /// Per-track events; `None` for disabled slots
    pub tracks: Vec<Option<DecodedTrack>>,
    /// Length of the anchor track's path before it loops or finishes
    pub max_ticks: u32,
    /// Track whose loop defines the song's loop
    pub loop_anchor_track: usize,
    /// Tick the anchor first reached the offset it loops back to; `None`
    /// if the anchor finishes instead of looping
    pub loop_start_tick: Option<u32>,
    /// Tables for note-on voice lookups
    pub voices: VoiceTables,
}

impl LoadedSong {
    /// Assign ticks to `song` by dry-running each track.
    pub fn resolve(song: DecodedSong, dialect: Dialect, voices: VoiceTables) -> Self {
        let mut tracks = song.tracks;
        let mut max_ticks = 0;
        let mut loop_anchor_track = 0;
        let mut loop_start_tick = None;

        for (i, slot) in tracks.iter_mut().enumerate() {
            let Some(track) = slot else { continue };
            let (ticks, loop_start) = resolve_track(i, track, dialect);
            if ticks > max_ticks {
                max_ticks = ticks;
                loop_anchor_track = i;
                loop_start_tick = loop_start;
            }
        }

        tracing::debug!(max_ticks, loop_anchor_track, ?loop_start_tick, "resolved song ticks");
        Self { tracks, max_ticks, loop_anchor_track, loop_start_tick, voices }
    }

    /// An empty song: no tracks, zero length.
    pub fn is_empty(&self) -> bool {
        self.tracks.iter().all(Option::is_none)
    }

    /// Events of track `index`, if that slot is in use.
    pub fn events(&self, index: usize) -> Option<&[SongEvent]> {
        self.tracks.get(index)?.as_ref().map(|t| t.events.as_slice())
    }

    /// Start offset of track `index`, if that slot is in use.
    pub fn start(&self, index: usize) -> Option<usize> {
        self.tracks.get(index)?.as_ref().map(|t| t.start)
    }
}

/// Dry-run one track. Returns the tick at which it loops or ends, and for a
/// loop, the tick at which the loop target was first reached.
fn resolve_track(index: usize, track: &mut DecodedTrack, dialect: Dialect) -> (u32, Option<u32>) {
    let mut runner = Track::new(index, dialect);
    runner.init(Some(track.start));
    let events = &mut track.events;
    let mut elapsed = 0u32;
    let mut loop_start = None;

    'ticks: loop {
        let mut count = 0;
        while runner.rest() == 0 && !runner.is_stopped() {
            // Same cap as `Track::drain`, so playback stops at the same command.
            if count == MAX_COMMANDS_PER_TICK {
                tracing::warn!(track = index, tick = elapsed, "track never rests");
                break 'ticks;
            }
            let Some(i) = find_event(events, runner.cursor()) else {
                break 'ticks;
            };
            if runner.call_depth() == 0 {
                if let Some(&first) = events[i].ticks.first() {
                    loop_start = Some(first);
                    break 'ticks;
                }
            }
            events[i].ticks.push(elapsed);
            runner.execute_next(events, &mut Silent);
            count += 1;
        }
        if runner.is_stopped() {
            break;
        }
        if elapsed >= MAX_RESOLVE_TICKS {
            tracing::warn!(track = index, "track did not loop within the tick limit");
            break;
        }
        runner.tick(&mut Silent);
        elapsed += 1;
    }
    (elapsed, loop_start)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rt_ir::Command;

    fn track(start: usize, commands: &[(usize, u8, Command)]) -> Option<DecodedTrack> {
        let events = commands.iter().map(|&(o, s, c)| SongEvent::new(o, s, c)).collect();
        Some(DecodedTrack { start, events })
    }

    fn resolve(tracks: Vec<Option<DecodedTrack>>) -> LoadedSong {
        let song = DecodedSong { tracks, voice_table: 0 };
        LoadedSong::resolve(song, Dialect::Mp2k, VoiceTables::default())
    }

    #[test]
    fn finishing_track_length_is_rest_sum() {
        let song = resolve(vec![track(
            0,
            &[
                (0, 2, Command::Voice(5)),
                (2, 2, Command::Volume(127)),
                (4, 3, Command::Note { key: 0x3C, velocity: Some(127), duration: 10 }),
                (7, 1, Command::Rest { ticks: 10 }),
                (8, 1, Command::Finish),
            ],
        )]);
        assert_eq!(song.max_ticks, 10);
        assert_eq!(song.loop_anchor_track, 0);
        let events = song.events(0).unwrap();
        assert_eq!(events[2].ticks, vec![0]);
        assert_eq!(events[4].ticks, vec![10]);
    }

    #[test]
    fn loop_stops_at_revisit() {
        let song = resolve(vec![track(
            0,
            &[
                (0, 1, Command::Rest { ticks: 6 }),
                (1, 1, Command::Rest { ticks: 2 }),
                (2, 5, Command::Jump { target: 0 }),
            ],
        )]);
        assert_eq!(song.max_ticks, 8);
        assert_eq!(song.loop_start_tick, Some(0));
        let events = song.events(0).unwrap();
        assert_eq!(events[0].ticks, vec![0]);
        assert_eq!(events[2].ticks, vec![8]);
    }

    #[test]
    fn loop_through_shared_pattern_starts_at_second_call() {
        // call P; loop: call P; rest 4; jump loop. P = rest 2; return
        let song = resolve(vec![track(
            0,
            &[
                (0, 5, Command::Call { target: 20 }),
                (5, 5, Command::Call { target: 20 }),
                (10, 1, Command::Rest { ticks: 4 }),
                (11, 5, Command::Jump { target: 5 }),
                (20, 1, Command::Rest { ticks: 2 }),
                (21, 1, Command::Return),
            ],
        )]);
        assert_eq!(song.max_ticks, 8);
        assert_eq!(song.loop_start_tick, Some(2));
        let events = song.events(0).unwrap();
        assert_eq!(events[4].ticks, vec![0, 2]);
    }

    #[test]
    fn finishing_song_has_no_loop_start() {
        let song = resolve(vec![track(0, &[(0, 1, Command::Rest { ticks: 3 }), (1, 1, Command::Finish)])]);
        assert_eq!(song.loop_start_tick, None);
    }

    #[test]
    fn runaway_track_stops_where_playback_does() {
        let mut commands: Vec<(usize, u8, Command)> =
            (0..MAX_COMMANDS_PER_TICK + 10).map(|i| (i * 2, 2, Command::Volume(100))).collect();
        let end = commands.len() * 2;
        commands.push((end, 1, Command::Rest { ticks: 1 }));
        let song = resolve(vec![track(0, &commands)]);
        let events = song.events(0).unwrap();
        let visited = events.iter().filter(|e| !e.ticks.is_empty()).count();
        assert_eq!(visited, MAX_COMMANDS_PER_TICK);

        let mut live = Track::new(0, Dialect::Mp2k);
        live.init(Some(0));
        live.drain(events, &mut Silent);
        assert!(live.is_stopped());
        assert_eq!(live.cursor(), MAX_COMMANDS_PER_TICK * 2);
    }

    #[test]
    fn called_pattern_records_every_visit() {
        let song = resolve(vec![track(
            0,
            &[
                (0, 5, Command::Call { target: 20 }),
                (5, 5, Command::Call { target: 20 }),
                (10, 1, Command::Finish),
                (20, 1, Command::Rest { ticks: 3 }),
                (21, 1, Command::Return),
            ],
        )]);
        assert_eq!(song.max_ticks, 6);
        let events = song.events(0).unwrap();
        assert_eq!(events[3].ticks, vec![0, 3]);
    }

    #[test]
    fn longest_track_is_anchor() {
        let song = resolve(vec![
            track(0, &[(0, 1, Command::Rest { ticks: 4 }), (1, 1, Command::Finish)]),
            None,
            track(100, &[(100, 1, Command::Rest { ticks: 9 }), (101, 1, Command::Finish)]),
        ]);
        assert_eq!(song.max_ticks, 9);
        assert_eq!(song.loop_anchor_track, 2);
        assert!(song.events(1).is_none());
    }

    #[test]
    fn empty_song_has_no_length() {
        let song = resolve(Vec::new());
        assert!(song.is_empty());
        assert_eq!(song.max_ticks, 0);
    }

    #[test]
    fn zero_time_loop_terminates() {
        let song = resolve(vec![track(0, &[(0, 5, Command::Jump { target: 0 })])]);
        assert_eq!(song.max_ticks, 0);
    }
}
