//! Audio frame type and block sinks.

use alloc::vec::Vec;

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Convert a mixed float pair (nominal range -1.0..1.0) to a clamped frame.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: (left * 32767.0).clamp(-32768.0, 32767.0) as i16,
            right: (right * 32767.0).clamp(-32768.0, 32767.0) as i16,
        }
    }
}

/// Receives rendered audio blocks.
///
/// Implemented by the live audio output, the WAV recorder and plain
/// buffers. Called from the render thread, so implementations used during
/// live playback must not block for long.
pub trait FrameSink {
    fn push_frames(&mut self, frames: &[Frame]);
}

/// Appends frames. Reserve capacity up front to keep the render path allocation-free.
impl FrameSink for Vec<Frame> {
    fn push_frames(&mut self, frames: &[Frame]) {
        self.extend_from_slice(frames);
    }
}
