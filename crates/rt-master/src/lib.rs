//! Headless controller for romtune.
//!
//! Owns a [`Player`] and provides the transport, snapshot and export API the
//! CLI uses. Live playback renders on a dedicated thread; every other call
//! takes the same lock between blocks.

mod config;
mod wav;

use parking_lot::Mutex;
use rt_audio::CpalOutput;
use rt_engine::Player;
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

// Re-export common types so callers don't need the engine crates directly.
pub use config::{Config, ConfigError, GameConfig, PlaybackConfig};
pub use rt_audio::{AudioError, AudioOutput};
pub use rt_engine::{Frame, FrameSink, LoadError, LoadedSong, PlaybackOptions, PlayerState, SongState, TrackState};
pub use rt_formats::{DecodeError, RomTables};
pub use rt_ir::{Command, Dialect, Interpolation, SongEvent};
pub use wav::{frames_to_wav, RecordError, WavRecorder};

/// How long the playback thread idles while paused.
const IDLE: Duration = Duration::from_millis(5);

/// Headless controller: owns the player and manages playback.
pub struct Controller {
    player: Arc<Mutex<Player>>,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(rom: Arc<[u8]>, tables: RomTables, options: PlaybackOptions) -> Self {
        Self { player: Arc::new(Mutex::new(Player::new(rom, tables, options))), playback: None }
    }

    // --- Song management ---

    pub fn song_count(&self) -> usize {
        self.player.lock().song_count()
    }

    pub fn song_index(&self) -> Option<usize> {
        self.player.lock().song_index()
    }

    /// Copy of the loaded song's resolved events.
    pub fn loaded_song(&self) -> Option<LoadedSong> {
        self.player.lock().song().cloned()
    }

    /// Stop playback and load song `index`.
    pub fn load_song(&mut self, index: usize) -> Result<(), LoadError> {
        self.stop();
        self.player.lock().load_song(index)
    }

    // --- Real-time playback ---

    /// Start live playback on the default device, or resume it if paused.
    ///
    /// Starts from the beginning unless a seek left the player paused at a
    /// position.
    pub fn play(&mut self) {
        self.spawn(open_device);
    }

    /// Like [`Controller::play`], on a caller-provided output.
    pub fn play_on<O>(&mut self, output: O)
    where
        O: AudioOutput + Send + 'static,
    {
        self.spawn(move || Ok(output));
    }

    fn spawn<O, F>(&mut self, open: F)
    where
        O: AudioOutput,
        F: FnOnce() -> Result<O, AudioError> + Send + 'static,
    {
        if self.is_playing() {
            self.player.lock().play();
            tracing::info!("playback resumed");
            return;
        }
        self.join_playback();
        {
            let mut player = self.player.lock();
            if player.state() != PlayerState::Paused {
                player.stop();
            }
        }

        let stop_signal = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let player = self.player.clone();
        let stop = stop_signal.clone();
        let done = finished.clone();
        let thread = std::thread::spawn(move || {
            match open() {
                Ok(mut output) => audio_thread(&player, &mut output, &stop),
                Err(err) => tracing::warn!(%err, "audio output unavailable"),
            }
            done.store(true, Ordering::Relaxed);
        });

        tracing::info!("playback started");
        self.playback = Some(PlaybackHandle { stop_signal, finished, thread: Some(thread) });
    }

    /// Toggle pause.
    pub fn pause(&self) {
        let mut player = self.player.lock();
        player.pause();
        tracing::info!(state = ?player.state(), "pause toggled");
    }

    /// Stop playback and join the playback thread. Idempotent.
    pub fn stop(&mut self) {
        self.join_playback();
        self.player.lock().stop();
    }

    /// Signal the playback thread and wait for it, leaving the player as is.
    fn join_playback(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                if handle.join().is_err() {
                    tracing::warn!("playback thread panicked");
                }
            }
            tracing::info!("playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    pub fn is_finished(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| p.finished.load(Ordering::Relaxed))
    }

    pub fn state(&self) -> PlayerState {
        self.player.lock().state()
    }

    /// Jump to sequencer tick `ticks`. When stopped, the player is left
    /// paused there and the next [`Controller::play`] resumes from it.
    pub fn seek(&self, ticks: u32) {
        self.player.lock().set_song_position(ticks);
        tracing::info!(ticks, "seeked");
    }

    pub fn set_track_muted(&self, track: usize, muted: bool) {
        self.player.lock().set_track_muted(track, muted);
    }

    /// Fill `state` with the current playback snapshot.
    pub fn snapshot(&self, state: &mut SongState) {
        self.player.lock().update_song_state(state);
    }

    // --- Offline rendering ---

    /// Render the loaded song into `sink` from the start, unpaced, until it
    /// finishes or `max_frames` have been produced.
    pub fn render(&mut self, sink: &mut dyn FrameSink, max_frames: u64) -> Result<u64, RecordError> {
        if self.is_playing() {
            return Err(RecordError::PlaybackActive);
        }
        self.stop();

        let mut player = self.player.lock();
        if player.song().is_none() {
            return Err(RecordError::NoSong);
        }
        let block = player.mixer().block_frames() as u64;
        player.begin_recording();
        let mut frames = 0;
        while frames < max_frames {
            let done = player.tick(None, Some(&mut *sink));
            frames += block;
            if done {
                break;
            }
        }
        player.stop();
        tracing::info!(frames, "render finished");
        Ok(frames.min(max_frames))
    }

    /// Record the loaded song into a WAV stream at the player's sample rate.
    pub fn record<W: Write + Seek>(&mut self, inner: W, max_frames: u64) -> Result<u64, RecordError> {
        let sample_rate = self.player.lock().options().sample_rate;
        let mut recorder = WavRecorder::new(inner, sample_rate, max_frames)?;
        self.render(&mut recorder, max_frames)?;
        recorder.finish()
    }

    /// Record the loaded song to a WAV file.
    pub fn record_wav(&mut self, path: impl AsRef<Path>, max_frames: u64) -> Result<u64, RecordError> {
        let sample_rate = self.player.lock().options().sample_rate;
        let mut recorder = WavRecorder::create(path, sample_rate, max_frames)?;
        self.render(&mut recorder, max_frames)?;
        recorder.finish()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_device() -> Result<CpalOutput, AudioError> {
    let (mut output, consumer) = CpalOutput::new()?;
    output.build_stream(consumer)?;
    Ok(output)
}

fn audio_thread(player: &Mutex<Player>, output: &mut impl AudioOutput, stop_signal: &AtomicBool) {
    if let Err(err) = output.start() {
        tracing::warn!(%err, "audio stream failed to start");
        return;
    }

    let frames = {
        let mut player = player.lock();
        player.set_sample_rate(output.sample_rate());
        player.play();
        player.mixer().block_frames()
    };
    let mut block: Vec<Frame> = Vec::with_capacity(frames);

    while !stop_signal.load(Ordering::Relaxed) {
        block.clear();
        // Render under the lock, push outside it; the push blocks on the device.
        let done = player.lock().tick(Some(&mut block), None);
        if block.is_empty() {
            std::thread::sleep(IDLE);
        } else {
            output.push_frames(&block);
        }
        if done {
            break;
        }
    }

    while output.queued() > 0 && !stop_signal.load(Ordering::Relaxed) {
        std::thread::sleep(IDLE);
    }
    if let Err(err) = output.stop() {
        tracing::warn!(%err, "audio stream failed to stop");
    }
}
