//! One voice of the mixer's channel pool.

use rt_ir::{Dialect, Interpolation, SampleHeader, VoiceEntry};

use crate::envelope::{Envelope, EnvelopePhase};
use crate::frequency::{key_to_increment, native_increment, MAX_INCREMENT};

/// Parameters a note starts with.
#[derive(Clone, Copy, Debug)]
pub struct NoteStart {
    pub owner: usize,
    pub key: u8,
    pub velocity: u8,
    /// Ticks until release; `None` holds until an end-of-tie.
    pub duration: Option<u16>,
    pub priority: u8,
}

/// Per-block mix parameters taken from the owning track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MixParams {
    /// Track volume (0-127)
    pub volume: u8,
    /// Track panning (-64 to +63)
    pub pan: i8,
    /// Pitch offset in 1/64 semitones
    pub pitch: i32,
}

/// Mixing state for a single channel.
#[derive(Clone, Debug, Default)]
pub struct Channel {
    /// Track the note belongs to
    pub(crate) owner: Option<usize>,
    pub(crate) key: u8,
    velocity: u8,
    priority: u8,
    /// Ticks left before release; `None` = held
    pub(crate) remaining: Option<u16>,
    envelope: Envelope,

    sample: SampleHeader,
    root_key: u8,
    fixed_frequency: bool,
    voice_pan: Option<i8>,

    /// Integer frame position in the sample
    position: u32,
    /// Fractional position (low 16 bits)
    fraction: u32,
    /// Playback increment (16.16 fixed-point), at most [`MAX_INCREMENT`]
    increment: u32,

    left_gain: f32,
    right_gain: f32,
}

impl Channel {
    /// Start `note` on `voice` with `sample`, replacing whatever was playing.
    pub fn trigger(&mut self, note: NoteStart, voice: &VoiceEntry, sample: SampleHeader, dialect: Dialect) {
        self.owner = Some(note.owner);
        self.key = note.key;
        self.velocity = note.velocity.min(127);
        self.priority = note.priority;
        self.remaining = note.duration;
        self.envelope = Envelope::start(voice.adsr, dialect);
        self.sample = sample;
        self.root_key = voice.root_key;
        self.fixed_frequency = voice.fixed_frequency;
        self.voice_pan = voice.pan;
        self.position = 0;
        self.fraction = 0;
        self.increment = 0;
        self.left_gain = 0.0;
        self.right_gain = 0.0;
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.envelope.phase()
    }

    pub fn is_active(&self) -> bool {
        !self.envelope.is_stopped()
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    /// Whether this channel holds a sounding `key` of `track`.
    pub fn holds(&self, track: usize, key: u8) -> bool {
        self.owner == Some(track) && self.key == key && !self.is_releasing()
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn owner(&self) -> Option<usize> {
        self.owner
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn envelope_level(&self) -> u8 {
        self.envelope.level()
    }

    pub fn left_gain(&self) -> f32 {
        self.left_gain
    }

    pub fn right_gain(&self) -> f32 {
        self.right_gain
    }

    /// Loudest side; used to rank steal candidates.
    pub fn gain(&self) -> f32 {
        self.left_gain.max(self.right_gain)
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    pub fn stop(&mut self) {
        self.envelope.stop();
        self.owner = None;
        self.left_gain = 0.0;
        self.right_gain = 0.0;
    }

    /// Count one sequencer tick off the note duration, releasing at zero.
    pub fn tick_duration(&mut self) {
        if self.is_releasing() {
            return;
        }
        if let Some(left) = self.remaining {
            let left = left.saturating_sub(1);
            self.remaining = Some(left);
            if left == 0 {
                self.release();
            }
        }
    }

    /// Advance the envelope one step and recompute gains and increment.
    pub fn update(&mut self, params: MixParams, sample_rate: u32) {
        self.envelope.step();
        if self.envelope.is_stopped() {
            self.stop();
            return;
        }

        let vol = (params.volume.min(127) as i32 * self.velocity as i32) >> 7;
        let pan = self.voice_pan.unwrap_or(params.pan) as i32;
        let pan_right = (pan + 64).clamp(0, 128);
        let left_vol = ((128 - pan_right) * vol) >> 7;
        let right_vol = (pan_right * vol) >> 7;
        let env = self.envelope.level() as f32 / 255.0;
        self.left_gain = left_vol as f32 / 127.0 * env;
        self.right_gain = right_vol as f32 / 127.0 * env;

        self.increment = if self.fixed_frequency {
            native_increment(self.sample.pitch, sample_rate)
        } else {
            key_to_increment(self.key, self.root_key, params.pitch, self.sample.pitch, sample_rate)
        }
        .min(MAX_INCREMENT);
    }

    /// Render into an interleaved stereo buffer, adding to what is there.
    pub fn process(&mut self, rom: &[u8], out: &mut [f32], interpolation: Interpolation) {
        if !self.is_active() {
            return;
        }
        let start = self.sample.data_offset;
        let Some(data) = rom.get(start..start + self.sample.length as usize) else {
            self.stop();
            return;
        };
        if data.is_empty() {
            self.stop();
            return;
        }

        for frame in out.chunks_exact_mut(2) {
            let value = self.read(data, interpolation);
            frame[0] += value * self.left_gain;
            frame[1] += value * self.right_gain;

            self.fraction += self.increment;
            self.position += self.fraction >> 16;
            self.fraction &= 0xFFFF;
            if !self.wrap(data.len() as u32) {
                self.stop();
                return;
            }
        }
    }

    /// Read the current frame as -1.0..1.0.
    fn read(&self, data: &[u8], interpolation: Interpolation) -> f32 {
        let pos = self.position as usize;
        let s0 = data[pos] as i8 as f32;
        let value = match interpolation {
            Interpolation::None => s0,
            Interpolation::Linear => {
                let next = if pos + 1 < data.len() {
                    Some(pos + 1)
                } else if self.sample.has_loop() {
                    Some(self.sample.loop_start as usize)
                } else {
                    None
                };
                let s1 = next.map_or(0.0, |i| data[i] as i8 as f32);
                s0 + (s1 - s0) * (self.fraction as f32 / 65536.0)
            }
        };
        value / 128.0
    }

    /// Apply loop/end-of-sample logic. Returns false when playback ends.
    fn wrap(&mut self, len: u32) -> bool {
        if self.position < len {
            return true;
        }
        if !self.sample.has_loop() {
            return false;
        }
        let loop_len = len - self.sample.loop_start;
        self.position = self.sample.loop_start + (self.position - len) % loop_len;
        true
    }
}
