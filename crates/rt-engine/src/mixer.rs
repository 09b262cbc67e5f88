//! Channel pool, fades and block rendering.

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayVec;
use rt_formats::{format_for, read_sample_header, DialectFormat, VoiceTables};
use rt_ir::{Dialect, Interpolation, MAX_CHANNELS};

use crate::channel::{Channel, NoteStart};
use crate::frame::{Frame, FrameSink};
use crate::track::{NoteOn, NoteOutput, Track};

/// Rate at which the drivers run their sequencer frame.
pub const FRAME_RATE: f64 = 59.7275;

/// Exponent of the fade curve.
const FADE_CURVE: f32 = 10.0 / 6.0;

/// Frames in one mixer block at `sample_rate`.
pub fn block_frames(sample_rate: u32) -> usize {
    ((sample_rate as f64 / FRAME_RATE) as usize).max(1)
}

/// Number of blocks a fade of `ms` milliseconds spans.
pub fn fade_micro_frames(ms: u32) -> u32 {
    ((ms as f64 * FRAME_RATE / 1000.0) as u32).max(1)
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Fade {
    /// Position on the curve, 0.0 to 1.0
    pos: f32,
    /// Change per block
    step: f32,
    frames_left: u32,
    out: bool,
}

/// Fixed channel pool plus master fade and render buffers.
pub struct Mixer {
    rom: Arc<[u8]>,
    dialect: Dialect,
    format: &'static dyn DialectFormat,
    voices: VoiceTables,
    channels: ArrayVec<Channel, MAX_CHANNELS>,
    sample_rate: u32,
    interpolation: Interpolation,
    fade: Option<Fade>,
    /// Interleaved stereo scratch, `2 * block_frames` long
    scratch: Vec<f32>,
    /// Converted output block
    block: Vec<Frame>,
}

impl Mixer {
    pub fn new(rom: Arc<[u8]>, dialect: Dialect, sample_rate: u32, interpolation: Interpolation) -> Self {
        let frames = block_frames(sample_rate);
        let mut channels = ArrayVec::new();
        for _ in 0..dialect.channel_count() {
            channels.push(Channel::default());
        }
        Self {
            rom,
            dialect,
            format: format_for(dialect),
            voices: VoiceTables::default(),
            channels,
            sample_rate,
            interpolation,
            fade: None,
            scratch: vec![0.0; frames * 2],
            block: vec![Frame::silence(); frames],
        }
    }

    /// Voice and sample tables used for note-on lookups.
    pub fn set_voices(&mut self, voices: VoiceTables) {
        self.voices = voices;
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Resize the render buffers for a new output rate. Sounding channels
    /// pick up the new rate on their next update.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        if sample_rate == self.sample_rate {
            return;
        }
        let frames = block_frames(sample_rate);
        self.sample_rate = sample_rate;
        self.scratch = vec![0.0; frames * 2];
        self.block = vec![Frame::silence(); frames];
    }

    pub fn block_frames(&self) -> usize {
        self.block.len()
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channels whose envelope has not stopped.
    pub fn active_channels(&self) -> usize {
        self.channels.iter().filter(|c| c.is_active()).count()
    }

    /// Silence every channel and clear the fade.
    pub fn reset(&mut self) {
        for ch in &mut self.channels {
            ch.stop();
        }
        self.fade = None;
    }

    // --- Allocation ---

    /// Pick a channel for a new note.
    ///
    /// Prefers stopped channels, then releasing ones, and otherwise steals
    /// from the lowest-priority track, quietest note first. Ties go to the
    /// lowest index.
    pub fn allocate(&mut self) -> usize {
        let rank = |c: &Channel| {
            if !c.is_active() {
                0
            } else if c.is_releasing() {
                1
            } else {
                2
            }
        };
        self.channels
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                rank(a)
                    .cmp(&rank(b))
                    .then(a.priority().cmp(&b.priority()))
                    .then(a.gain().total_cmp(&b.gain()))
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Look up the voice for `note` and start it on a free or stolen channel.
    /// Returns the channel index, or `None` if the voice plays no sample.
    pub fn start_note(&mut self, note: NoteOn) -> Option<usize> {
        let Some(entry) = self.format.voice_entry(&self.rom, &self.voices, note.voice, note.key) else {
            tracing::warn!(voice = note.voice, key = note.key, track = note.track, "no playable voice");
            return None;
        };
        let sample = read_sample_header(&self.rom, entry.sample).filter(|s| !s.is_empty())?;
        let index = self.allocate();
        let start = NoteStart {
            owner: note.track,
            key: note.key,
            velocity: note.velocity,
            duration: note.duration,
            priority: note.priority,
        };
        self.channels[index].trigger(start, &entry, sample, self.dialect);
        Some(index)
    }

    // --- Fades ---

    /// Fade from silence to full level over `ms` milliseconds.
    pub fn begin_fade_in(&mut self, ms: u32) {
        let frames = fade_micro_frames(ms);
        self.fade = Some(Fade { pos: 0.0, step: 1.0 / frames as f32, frames_left: frames, out: false });
    }

    /// Fade from the current level to silence over `ms` milliseconds.
    pub fn begin_fade_out(&mut self, ms: u32) {
        let frames = fade_micro_frames(ms);
        self.fade = Some(Fade { pos: 1.0, step: -1.0 / frames as f32, frames_left: frames, out: true });
    }

    pub fn is_fading_out(&self) -> bool {
        self.fade.is_some_and(|f| f.out)
    }

    /// A fade-out has run all of its micro-frames.
    pub fn is_fade_done(&self) -> bool {
        self.fade.is_some_and(|f| f.out && f.frames_left == 0)
    }

    /// Current master level after the fade curve.
    pub fn fade_level(&self) -> f32 {
        match self.fade {
            Some(f) => curve(f.pos),
            None => 1.0,
        }
    }

    /// Move the fade one micro-frame; returns the level before and after.
    fn step_fade(&mut self) -> (f32, f32) {
        let from = self.fade_level();
        if let Some(fade) = &mut self.fade {
            if fade.frames_left > 0 {
                fade.frames_left -= 1;
                fade.pos = if fade.frames_left == 0 {
                    if fade.out { 0.0 } else { 1.0 }
                } else {
                    (fade.pos + fade.step).clamp(0.0, 1.0)
                };
            }
            if !fade.out && fade.frames_left == 0 {
                self.fade = None;
            }
        }
        (from, self.fade_level())
    }

    // --- Rendering ---

    /// Render one block and hand it to the output and/or recording sink.
    pub fn process(&mut self, tracks: &[Track], output: Option<&mut dyn FrameSink>, recording: Option<&mut dyn FrameSink>) {
        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render(tracks));
        #[cfg(not(feature = "alloc_check"))]
        self.render(tracks);

        if let Some(sink) = output {
            sink.push_frames(&self.block);
        }
        if let Some(sink) = recording {
            sink.push_frames(&self.block);
        }
    }

    /// Mix every channel into the block buffer and apply the fade.
    fn render(&mut self, tracks: &[Track]) {
        self.scratch.fill(0.0);

        for ch in &mut self.channels {
            let Some(owner) = ch.owner() else { continue };
            let Some(track) = tracks.get(owner) else {
                ch.stop();
                continue;
            };
            ch.update(track.mix_params(), self.sample_rate);
            if track.is_muted() {
                continue;
            }
            ch.process(&self.rom, &mut self.scratch, self.interpolation);
        }

        let (from, to) = self.step_fade();
        let n = self.block.len() as f32;
        for (i, (frame, pair)) in self.block.iter_mut().zip(self.scratch.chunks_exact(2)).enumerate() {
            let level = from + (to - from) * (i as f32 / n);
            *frame = Frame::from_f32(pair[0] * level, pair[1] * level);
        }
    }
}

fn curve(pos: f32) -> f32 {
    libm::powf(pos.max(0.0), FADE_CURVE)
}

impl NoteOutput for Mixer {
    fn note_on(&mut self, note: NoteOn) {
        self.start_note(note);
    }

    fn extend_note(&mut self, track: usize, key: u8, duration: Option<u16>) -> bool {
        match self.channels.iter_mut().find(|c| c.holds(track, key)) {
            Some(ch) => {
                ch.remaining = duration;
                true
            }
            None => false,
        }
    }

    fn end_tie(&mut self, track: usize, key: u8) {
        for ch in self.channels.iter_mut().filter(|c| c.holds(track, key) && c.remaining.is_none()) {
            ch.release();
        }
    }

    fn advance_notes(&mut self, track: usize) {
        for ch in self.channels.iter_mut().filter(|c| c.owner() == Some(track)) {
            ch.tick_duration();
        }
    }
}
