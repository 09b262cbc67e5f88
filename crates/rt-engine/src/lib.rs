//! Playback engine for romtune.
//!
//! Runs decoded tracks through a tick-accurate sequencer, drives the
//! channel pool's envelopes and sample playback, and renders blocks of
//! stereo PCM to a [`FrameSink`].

extern crate alloc;

mod channel;
mod envelope;
mod frame;
mod frequency;
mod loaded_song;
mod mixer;
mod player;
mod state;
mod track;

pub use channel::{Channel, MixParams, NoteStart};
pub use envelope::{Envelope, EnvelopePhase};
pub use frame::{Frame, FrameSink};
pub use frequency::{key_to_increment, native_increment, MAX_INCREMENT, PITCH_STEPS};
pub use loaded_song::{LoadedSong, MAX_RESOLVE_TICKS};
pub use mixer::{block_frames, fade_micro_frames, Mixer, FRAME_RATE};
pub use player::{LoadError, PlaybackOptions, Player, PlayerState, TempoClock, MAX_TICKS_PER_BLOCK};
pub use state::{SongState, TrackState};
pub use track::{NoteOn, NoteOutput, Silent, Track, CALL_STACK_DEPTH, MAX_COMMANDS_PER_TICK};
