//! Core IR types for romtune.
//!
//! This crate defines the decoded command model and the instrument records
//! read from ROM tables. Format decoders emit it, and the playback engine
//! consumes it.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod command;
mod dialect;
mod event;
mod instrument;
mod sample;

pub use command::{Command, CommandKind, ModType};
pub use dialect::{Dialect, UnknownDialect, ENVELOPE_CEILING, MAX_CHANNELS, MAX_TRACKS};
pub use event::{find_event, SongEvent};
pub use instrument::{Adsr, VoiceEntry};
pub use sample::{Interpolation, SampleHeader, SAMPLE_LOOP_FLAG};
