//! Per-track sequencer cursor and performance parameters.

use arrayvec::ArrayVec;
use rt_ir::{find_event, Command, CommandKind, Dialect, ModType, SongEvent};

use crate::channel::MixParams;

/// Nesting depth of pattern calls.
pub const CALL_STACK_DEPTH: usize = 3;

/// Commands one track may execute within a single tick before it is
/// considered stuck in a zero-time loop.
pub const MAX_COMMANDS_PER_TICK: usize = 1024;

/// Default pitch bend range in semitones.
const DEFAULT_BEND_RANGE: u8 = 2;

/// A note the sequencer wants to sound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteOn {
    pub track: usize,
    pub voice: u8,
    /// Key after key shift
    pub key: u8,
    pub velocity: u8,
    /// Ticks until release; `None` = tie
    pub duration: Option<u16>,
    /// Track priority; lower-priority notes are stolen first
    pub priority: u8,
}

/// Where command execution sends notes and tempo changes.
///
/// The mixer implements this for live playback; [`Silent`] discards
/// everything so song analysis runs the exact same execution path.
pub trait NoteOutput {
    fn note_on(&mut self, note: NoteOn);

    /// Extend a sounding, non-releasing `key` of `track`. Returns false if there is none.
    fn extend_note(&mut self, track: usize, key: u8, duration: Option<u16>) -> bool;

    /// Release a tied `key` of `track`.
    fn end_tie(&mut self, track: usize, key: u8);

    /// Count one tick off the durations of notes owned by `track`.
    fn advance_notes(&mut self, track: usize);

    fn set_tempo(&mut self, _tempo: u16) {}
}

/// Output that drops every note.
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl NoteOutput for Silent {
    fn note_on(&mut self, _note: NoteOn) {}

    fn extend_note(&mut self, _track: usize, _key: u8, _duration: Option<u16>) -> bool {
        false
    }

    fn end_tie(&mut self, _track: usize, _key: u8) {}

    fn advance_notes(&mut self, _track: usize) {}
}

/// Sequencer state of one track slot.
#[derive(Clone, Debug)]
pub struct Track {
    index: usize,
    dialect: Dialect,
    enabled: bool,
    stopped: bool,
    muted: bool,

    cursor: usize,
    calls: ArrayVec<usize, CALL_STACK_DEPTH>,
    rest: u16,
    previous: Option<CommandKind>,

    voice: u8,
    volume: u8,
    pan: i8,
    bend: i8,
    bend_range: u8,
    key_shift: i8,
    tune: i8,
    priority: u8,
    last_key: u8,
    last_velocity: u8,

    lfo_speed: u8,
    lfo_delay: u8,
    mod_depth: u8,
    mod_type: ModType,
    lfo_phase: u8,
    lfo_wait: u8,
    /// Current LFO output, -64..=64 scaled by depth
    lfo_value: i32,
}

impl Track {
    /// Create an empty, disabled track slot.
    pub fn new(index: usize, dialect: Dialect) -> Self {
        Self {
            index,
            dialect,
            enabled: false,
            stopped: true,
            muted: false,
            cursor: 0,
            calls: ArrayVec::new(),
            rest: 0,
            previous: None,
            voice: 0,
            volume: dialect.default_volume(),
            pan: 0,
            bend: 0,
            bend_range: DEFAULT_BEND_RANGE,
            key_shift: 0,
            tune: 0,
            priority: 0,
            last_key: 60,
            last_velocity: 127,
            lfo_speed: 0,
            lfo_delay: 0,
            mod_depth: 0,
            mod_type: ModType::Pitch,
            lfo_phase: 0,
            lfo_wait: 0,
            lfo_value: 0,
        }
    }

    /// Reset to the song start. `start` is `None` for a slot the song does not use.
    pub fn init(&mut self, start: Option<usize>) {
        let muted = self.muted;
        *self = Self::new(self.index, self.dialect);
        self.muted = muted;
        if let Some(start) = start {
            self.enabled = true;
            self.stopped = false;
            self.cursor = start;
        }
    }

    // --- Accessors ---

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Offset of the next command to execute.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn rest(&self) -> u16 {
        self.rest
    }

    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    pub fn previous_command(&self) -> Option<CommandKind> {
        self.previous
    }

    pub fn voice(&self) -> u8 {
        self.voice
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn pan(&self) -> i8 {
        self.pan
    }

    pub fn pitch_bend(&self) -> i8 {
        self.bend
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Pitch offset in 1/64 semitones: bend, tune and vibrato.
    pub fn pitch(&self) -> i32 {
        let lfo = if self.mod_type == ModType::Pitch { self.lfo_value } else { 0 };
        self.bend as i32 * self.bend_range as i32 + self.tune as i32 + lfo
    }

    /// What the mixer applies to this track's channels this block.
    pub fn mix_params(&self) -> MixParams {
        let (volume, pan) = match self.mod_type {
            ModType::Volume => {
                // Tremolo only attenuates.
                let cut = self.lfo_value.unsigned_abs().min(127) as i32;
                ((self.volume as i32 * (128 - cut) >> 7) as u8, self.pan)
            }
            ModType::Pan => (self.volume, (self.pan as i32 + self.lfo_value).clamp(-64, 63) as i8),
            ModType::Pitch => (self.volume, self.pan),
        };
        MixParams { volume, pan, pitch: self.pitch() }
    }

    // --- Sequencing ---

    /// Advance one sequencer tick: rest, note durations and the LFO.
    pub fn tick(&mut self, out: &mut impl NoteOutput) {
        if !self.enabled {
            return;
        }
        self.rest = self.rest.saturating_sub(1);
        out.advance_notes(self.index);
        self.tick_lfo();
    }

    fn tick_lfo(&mut self) {
        if self.mod_depth == 0 || self.lfo_speed == 0 {
            self.lfo_value = 0;
            return;
        }
        if self.lfo_wait > 0 {
            self.lfo_wait -= 1;
            return;
        }
        self.lfo_phase = self.lfo_phase.wrapping_add(self.lfo_speed);
        let p = self.lfo_phase as i32;
        let triangle = if p < 64 {
            p
        } else if p < 192 {
            128 - p
        } else {
            p - 256
        };
        self.lfo_value = (triangle * self.mod_depth as i32) >> 4;
    }

    /// Execute commands until the track rests or stops.
    ///
    /// Stops the track with a warning if it executes more than
    /// [`MAX_COMMANDS_PER_TICK`] commands without resting.
    pub fn drain(&mut self, events: &[SongEvent], out: &mut impl NoteOutput) {
        let mut count = 0;
        while self.rest == 0 && !self.stopped {
            if count == MAX_COMMANDS_PER_TICK {
                tracing::warn!(track = self.index, offset = self.cursor, "track never rests, stopping it");
                self.stopped = true;
                return;
            }
            self.execute_next(events, out);
            count += 1;
        }
    }

    /// Execute the command at the cursor and move past it.
    pub fn execute_next(&mut self, events: &[SongEvent], out: &mut impl NoteOutput) {
        if self.stopped {
            return;
        }
        let Some(i) = find_event(events, self.cursor) else {
            tracing::warn!(track = self.index, offset = self.cursor, "cursor left the decoded track");
            self.stopped = true;
            return;
        };
        let event = &events[i];
        let mut next = event.next_offset();

        match event.command {
            Command::Note { key, velocity, duration } => {
                let velocity = velocity.unwrap_or(self.last_velocity);
                // Compact-note dialects extend a still-sounding key instead of retriggering.
                let extend = self.dialect == Dialect::AlphaDream;
                self.play(key, velocity, Some(duration), extend, out);
            }
            Command::Tie { key, velocity } => self.play(key, velocity, None, true, out),
            Command::EndOfTie { key } => {
                let key = key.map_or(self.last_key, |k| self.shift(k));
                out.end_tie(self.index, key);
            }
            Command::Rest { ticks } => self.rest = ticks,
            Command::Voice(v) => self.voice = v,
            Command::Volume(v) => self.volume = v.min(127),
            Command::Pan(p) => self.pan = p,
            Command::PitchBend(b) => self.bend = b,
            Command::PitchBendRange(r) => self.bend_range = r,
            Command::Tempo(t) => out.set_tempo(t),
            Command::KeyShift(k) => self.key_shift = k,
            Command::Tune(t) => self.tune = t,
            Command::LfoSpeed(s) => self.lfo_speed = s,
            Command::LfoDelay(d) => self.lfo_delay = d,
            Command::ModDepth(d) => self.mod_depth = d,
            Command::ModType(t) => self.mod_type = t,
            Command::Priority(p) => self.priority = p,
            Command::MemoryAccess { .. } | Command::ExtendedCommand { .. } => {}
            Command::Jump { target } => next = target,
            Command::Call { target } => {
                if self.calls.try_push(next).is_ok() {
                    next = target;
                } else {
                    tracing::warn!(track = self.index, offset = event.offset, "call stack full, skipping call");
                }
            }
            Command::Return => match self.calls.pop() {
                Some(ret) => next = ret,
                None => self.stopped = true,
            },
            Command::Finish => self.stopped = true,
        }

        self.previous = Some(event.command.kind());
        self.cursor = next;
    }

    fn shift(&self, key: u8) -> u8 {
        (key as i16 + self.key_shift as i16).clamp(0, 127) as u8
    }

    fn play(&mut self, key: u8, velocity: u8, duration: Option<u16>, extend: bool, out: &mut impl NoteOutput) {
        let key = self.shift(key);
        self.last_key = key;
        self.last_velocity = velocity;
        if extend && out.extend_note(self.index, key, duration) {
            return;
        }
        self.lfo_wait = self.lfo_delay;
        self.lfo_phase = 0;
        self.lfo_value = 0;
        out.note_on(NoteOn {
            track: self.index,
            voice: self.voice,
            key,
            velocity,
            duration,
            priority: self.priority,
        });
    }
}
