//! Top-level scheduler: tempo accumulation, looping, fades and seeking.

use alloc::sync::Arc;
use arrayvec::ArrayVec;
use rt_formats::{decode_song, DecodeError, RomTables};
use rt_ir::{Dialect, Interpolation, MAX_TRACKS};

use crate::frame::FrameSink;
use crate::loaded_song::LoadedSong;
use crate::mixer::Mixer;
use crate::state::{SongState, TrackState};
use crate::track::{NoteOn, NoteOutput, Track};

/// Sequencer ticks one [`Player::tick`] may advance.
pub const MAX_TICKS_PER_BLOCK: u32 = 1024;

/// Why a song could not be loaded. The previously loaded song stays in place.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("song {index} is out of range (table has {count} songs)")]
    SongIndexOutOfRange { index: usize, count: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Playback settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackOptions {
    pub sample_rate: u32,
    pub interpolation: Interpolation,
    /// Loops played before the fade-out starts
    pub play_count: u32,
    /// Fade-out length; `None` loops forever
    pub fade_out_ms: Option<u32>,
    /// Fade-in applied when playback starts
    pub fade_in_ms: Option<u32>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            interpolation: Interpolation::Linear,
            play_count: 1,
            fade_out_ms: Some(10_000),
            fade_in_ms: None,
        }
    }
}

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Offline export; not paced by an audio device
    Recording,
}

/// Converts per-block tempo into whole sequencer ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TempoClock {
    stack: u32,
    threshold: u32,
}

impl TempoClock {
    pub fn new(threshold: u16) -> Self {
        Self { stack: 0, threshold: threshold.max(1) as u32 }
    }

    /// Add one block's tempo and return how many ticks are due.
    /// At most [`MAX_TICKS_PER_BLOCK`] are returned; the rest stays stacked.
    pub fn advance(&mut self, tempo: u16) -> u32 {
        self.stack += tempo as u32;
        let due = (self.stack / self.threshold).min(MAX_TICKS_PER_BLOCK);
        self.stack -= due * self.threshold;
        due
    }

    pub fn reset(&mut self) {
        self.stack = 0;
    }
}

/// Routes track output to the mixer and tempo changes to the player.
struct Live<'a> {
    mixer: &'a mut Mixer,
    tempo: &'a mut u16,
}

impl NoteOutput for Live<'_> {
    fn note_on(&mut self, note: NoteOn) {
        self.mixer.note_on(note);
    }

    fn extend_note(&mut self, track: usize, key: u8, duration: Option<u16>) -> bool {
        self.mixer.extend_note(track, key, duration)
    }

    fn end_tie(&mut self, track: usize, key: u8) {
        self.mixer.end_tie(track, key);
    }

    fn advance_notes(&mut self, track: usize) {
        self.mixer.advance_notes(track);
    }

    fn set_tempo(&mut self, tempo: u16) {
        *self.tempo = tempo;
    }
}

/// Plays songs from one ROM.
pub struct Player {
    rom: Arc<[u8]>,
    tables: RomTables,
    options: PlaybackOptions,
    song: Option<LoadedSong>,
    song_index: Option<usize>,
    tracks: ArrayVec<Track, MAX_TRACKS>,
    mixer: Mixer,
    clock: TempoClock,
    tempo: u16,
    elapsed_ticks: u32,
    loops: u32,
    state: PlayerState,
}

impl Player {
    pub fn new(rom: Arc<[u8]>, tables: RomTables, options: PlaybackOptions) -> Self {
        let dialect = tables.dialect;
        let mut tracks = ArrayVec::new();
        for i in 0..dialect.max_tracks() {
            tracks.push(Track::new(i, dialect));
        }
        let mixer = Mixer::new(rom.clone(), dialect, options.sample_rate, options.interpolation);
        Self {
            rom,
            tables,
            options,
            song: None,
            song_index: None,
            tracks,
            mixer,
            clock: TempoClock::new(dialect.tempo_threshold()),
            tempo: dialect.default_tempo(),
            elapsed_ticks: 0,
            loops: 0,
            state: PlayerState::Stopped,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.tables.dialect
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn song(&self) -> Option<&LoadedSong> {
        self.song.as_ref()
    }

    pub fn song_index(&self) -> Option<usize> {
        self.song_index
    }

    pub fn song_count(&self) -> usize {
        self.tables.song_count
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn elapsed_ticks(&self) -> u32 {
        self.elapsed_ticks
    }

    pub fn loops(&self) -> u32 {
        self.loops
    }

    pub fn set_track_muted(&mut self, track: usize, muted: bool) {
        if let Some(t) = self.tracks.get_mut(track) {
            t.set_muted(muted);
        }
    }

    /// Switch the output rate. Position and sounding notes are kept.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.options.sample_rate = sample_rate;
        self.mixer.set_sample_rate(sample_rate);
    }

    // --- Loading ---

    /// Decode song `index` and resolve its ticks. Stops playback first.
    pub fn load_song(&mut self, index: usize) -> Result<(), LoadError> {
        if index >= self.tables.song_count {
            return Err(LoadError::SongIndexOutOfRange { index, count: self.tables.song_count });
        }
        let decoded = decode_song(&self.rom, &self.tables, index)?;
        let voices = self.tables.voices(&decoded);
        let song = LoadedSong::resolve(decoded, self.tables.dialect, voices);

        self.state = PlayerState::Stopped;
        self.mixer.set_voices(voices);
        self.song = Some(song);
        self.song_index = Some(index);
        self.init();
        tracing::debug!(song = index, "loaded song");
        Ok(())
    }

    /// Reset tempo, loop counters, every track and the mixer.
    pub fn init(&mut self) {
        self.tempo = self.tables.dialect.default_tempo();
        self.clock.reset();
        self.elapsed_ticks = 0;
        self.loops = 0;
        self.mixer.reset();
        for (i, track) in self.tracks.iter_mut().enumerate() {
            track.init(self.song.as_ref().and_then(|s| s.start(i)));
        }
    }

    // --- Transport ---

    /// Start from the beginning, or resume if paused.
    pub fn play(&mut self) {
        match self.state {
            PlayerState::Paused => self.state = PlayerState::Playing,
            PlayerState::Playing => {}
            PlayerState::Stopped | PlayerState::Recording => {
                self.init();
                if let Some(ms) = self.options.fade_in_ms {
                    self.mixer.begin_fade_in(ms);
                }
                self.state = PlayerState::Playing;
            }
        }
    }

    /// Toggle between playing and paused.
    pub fn pause(&mut self) {
        self.state = match self.state {
            PlayerState::Playing => PlayerState::Paused,
            PlayerState::Paused => PlayerState::Playing,
            other => other,
        };
    }

    /// Stop playback. Idempotent.
    pub fn stop(&mut self) {
        self.state = PlayerState::Stopped;
        self.mixer.reset();
    }

    /// Start an offline export from the beginning of the song.
    pub fn begin_recording(&mut self) {
        self.init();
        self.state = PlayerState::Recording;
    }

    // --- Ticking ---

    /// Advance the sequencer by the due ticks and render one block.
    ///
    /// Returns true once the song has finished: its fade-out completed, or
    /// every track stopped and no channel is still sounding.
    pub fn tick(&mut self, output: Option<&mut dyn FrameSink>, recording: Option<&mut dyn FrameSink>) -> bool {
        if !matches!(self.state, PlayerState::Playing | PlayerState::Recording) {
            return self.is_finished();
        }
        let due = self.clock.advance(self.tempo);
        for _ in 0..due {
            self.step();
        }
        self.mixer.process(&self.tracks, output, recording);
        self.is_finished()
    }

    /// Advance every track one sequencer tick, then handle the song loop.
    fn step(&mut self) {
        let Some(song) = &self.song else { return };
        let mut out = Live { mixer: &mut self.mixer, tempo: &mut self.tempo };
        for (i, track) in self.tracks.iter_mut().enumerate() {
            let Some(events) = song.events(i) else { continue };
            track.tick(&mut out);
            track.drain(events, &mut out);
        }

        // The anchor has just re-executed its loop target.
        if let Some(loop_start) = song.loop_start_tick {
            let looping = self.tracks.get(song.loop_anchor_track).is_some_and(|t| !t.is_stopped());
            if song.max_ticks > 0 && self.elapsed_ticks == song.max_ticks && looping {
                self.elapsed_ticks = loop_start;
                self.loops += 1;
                self.on_loop();
            }
        }
        self.elapsed_ticks += 1;
    }

    fn on_loop(&mut self) {
        tracing::debug!(loops = self.loops, "song looped");
        if self.loops > self.options.play_count && !self.mixer.is_fading_out() {
            if let Some(ms) = self.options.fade_out_ms {
                self.mixer.begin_fade_out(ms);
            }
        }
    }

    /// Whether playback has nothing left to produce.
    pub fn is_finished(&self) -> bool {
        if self.mixer.is_fade_done() {
            return true;
        }
        self.tracks.iter().all(|t| t.is_stopped()) && self.mixer.active_channels() == 0
    }

    /// Rebuild the state at `ticks` by replaying from the start without rendering.
    ///
    /// A stopped player becomes paused at the new position, so a following
    /// [`Player::play`] resumes from there.
    pub fn set_song_position(&mut self, ticks: u32) {
        let state = self.state;
        self.init();
        for _ in 0..ticks {
            self.step();
        }
        self.state = match state {
            PlayerState::Stopped => PlayerState::Paused,
            other => other,
        };
    }

    // --- Snapshot ---

    /// Copy display state into a caller-owned snapshot.
    pub fn update_song_state(&self, state: &mut SongState) {
        state.tempo = self.tempo;
        state.elapsed_ticks = self.elapsed_ticks;
        state.loops = self.loops;
        state.tracks.clear();
        for track in self.tracks.iter().filter(|t| t.is_enabled()) {
            let mut ts = TrackState {
                index: track.index(),
                position: track.cursor(),
                rest: track.rest(),
                voice: track.voice(),
                volume: track.volume(),
                pan: track.pan(),
                pitch_bend: track.pitch_bend(),
                muted: track.is_muted(),
                stopped: track.is_stopped(),
                previous_command: track.previous_command(),
                ..TrackState::default()
            };
            for ch in self.mixer.channels().iter().filter(|c| c.is_active() && c.owner() == Some(track.index())) {
                let _ = ts.held_keys.push(ch.key());
                ts.left_gain = ts.left_gain.max(ch.left_gain());
                ts.right_gain = ts.right_gain.max(ch.right_gain());
            }
            state.tracks.push(ts);
        }
    }
}
