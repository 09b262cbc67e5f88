//! Read-only playback snapshot for display collaborators.

use arrayvec::ArrayVec;
use rt_ir::{CommandKind, MAX_CHANNELS, MAX_TRACKS};

/// Display fields of one track.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackState {
    pub index: usize,
    /// Offset of the next command
    pub position: usize,
    pub rest: u16,
    pub voice: u8,
    pub volume: u8,
    pub pan: i8,
    pub pitch_bend: i8,
    /// Keys of this track's sounding channels
    pub held_keys: heapless::Vec<u8, MAX_CHANNELS>,
    /// Loudest left gain among this track's channels
    pub left_gain: f32,
    /// Loudest right gain among this track's channels
    pub right_gain: f32,
    pub muted: bool,
    pub stopped: bool,
    pub previous_command: Option<CommandKind>,
}

/// Snapshot of the whole song, filled by `Player::update_song_state`.
///
/// Reuse one instance across updates; filling it does not allocate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SongState {
    /// Enabled tracks only
    pub tracks: ArrayVec<TrackState, MAX_TRACKS>,
    pub tempo: u16,
    pub elapsed_ticks: u32,
    pub loops: u32,
}
