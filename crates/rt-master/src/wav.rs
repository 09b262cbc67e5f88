//! WAV recording for 16-bit stereo PCM.

use rt_engine::{Frame, FrameSink};
use std::io::{Cursor, Seek, Write};
use std::path::Path;

/// Why a recording failed.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("cannot record while live playback is running")]
    PlaybackActive,

    #[error("no song loaded")]
    NoSong,

    #[error("wav write failed: {0}")]
    Wav(#[from] hound::Error),
}

fn wav_spec(sample_rate: u32) -> hound::WavSpec {
    hound::WavSpec { channels: 2, sample_rate, bits_per_sample: 16, sample_format: hound::SampleFormat::Int }
}

/// A [`FrameSink`] that writes every block it receives to a WAV stream.
///
/// Writes stop after `max_frames`. The first write error is kept and
/// returned by [`WavRecorder::finish`]; later blocks are dropped.
pub struct WavRecorder<W: Write + Seek> {
    writer: hound::WavWriter<W>,
    frames: u64,
    max_frames: u64,
    error: Option<hound::Error>,
}

impl WavRecorder<std::io::BufWriter<std::fs::File>> {
    pub fn create(path: impl AsRef<Path>, sample_rate: u32, max_frames: u64) -> Result<Self, RecordError> {
        let writer = hound::WavWriter::create(path, wav_spec(sample_rate))?;
        Ok(Self::with_writer(writer, max_frames))
    }
}

impl<W: Write + Seek> WavRecorder<W> {
    pub fn new(inner: W, sample_rate: u32, max_frames: u64) -> Result<Self, RecordError> {
        let writer = hound::WavWriter::new(inner, wav_spec(sample_rate))?;
        Ok(Self::with_writer(writer, max_frames))
    }

    fn with_writer(writer: hound::WavWriter<W>, max_frames: u64) -> Self {
        Self { writer, frames: 0, max_frames, error: None }
    }

    /// Frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The length cap has been reached or a write failed.
    pub fn is_full(&self) -> bool {
        self.frames >= self.max_frames || self.error.is_some()
    }

    /// Patch the header and flush. Returns the number of frames written.
    pub fn finish(self) -> Result<u64, RecordError> {
        if let Some(err) = self.error {
            return Err(err.into());
        }
        self.writer.finalize()?;
        Ok(self.frames)
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), hound::Error> {
        let room = (self.max_frames - self.frames).min(frames.len() as u64) as usize;
        for frame in &frames[..room] {
            self.writer.write_sample(frame.left)?;
            self.writer.write_sample(frame.right)?;
        }
        self.frames += room as u64;
        Ok(())
    }
}

impl<W: Write + Seek> FrameSink for WavRecorder<W> {
    fn push_frames(&mut self, frames: &[Frame]) {
        if self.is_full() {
            return;
        }
        if let Err(err) = self.write(frames) {
            tracing::warn!(%err, "wav write failed");
            self.error = Some(err);
        }
    }
}

/// Encode `frames` as an in-memory WAV file.
pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Result<Vec<u8>, RecordError> {
    let mut buf = Cursor::new(Vec::new());
    let mut recorder = WavRecorder::new(&mut buf, sample_rate, frames.len() as u64)?;
    recorder.push_frames(frames);
    recorder.finish()?;
    Ok(buf.into_inner())
}
