//! Sample header record.

/// Bit in the header flags word that marks a looping sample.
pub const SAMPLE_LOOP_FLAG: u32 = 0x4000_0000;

/// How sample frames are read between integer positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Interpolation {
    /// Nearest lower frame
    None,
    /// Linear blend with the following frame
    #[default]
    Linear,
}

/// Signed 8-bit PCM sample as laid out in the ROM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SampleHeader {
    /// Wrap to `loop_start` instead of stopping at the end
    pub looped: bool,
    /// Loop point (in sample frames)
    pub loop_start: u32,
    /// Length (in sample frames)
    pub length: u32,
    /// Native playback rate in Hz, 22.10 fixed-point
    pub pitch: u32,
    /// Absolute ROM offset of the first sample byte
    pub data_offset: usize,
}

impl SampleHeader {
    /// Native playback rate in Hz.
    pub fn rate_hz(&self) -> f32 {
        self.pitch as f32 / 1024.0
    }

    /// Returns true if the sample has no frames.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns true if the loop region is usable.
    pub fn has_loop(&self) -> bool {
        self.looped && self.loop_start < self.length
    }
}
