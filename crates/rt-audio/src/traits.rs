//! Audio output trait and error types.

use rt_engine::FrameSink;

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("device init error: {0}")]
    DeviceInit(String),

    #[error("stream create error: {0}")]
    StreamCreate(String),

    #[error("playback error: {0}")]
    Playback(String),

    #[error("no audio device available")]
    NoDevice,
}

/// A live output device. Rendered blocks arrive through [`FrameSink`],
/// which blocks until the device has room for them.
pub trait AudioOutput: FrameSink {
    /// Device sample rate; the player renders at this rate.
    fn sample_rate(&self) -> u32;

    /// Frames accepted but not yet played.
    fn queued(&self) -> usize {
        0
    }

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback. Pending frames are discarded.
    fn stop(&mut self) -> Result<(), AudioError>;
}
