//! Decoded sequencer commands.

/// What the LFO of a track modulates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModType {
    /// Vibrato
    #[default]
    Pitch,
    /// Tremolo
    Volume,
    /// Auto-pan
    Pan,
}

impl ModType {
    /// Map a raw driver value to a modulation target. Unknown values fall back to pitch.
    pub fn from_raw(value: u8) -> Self {
        match value {
            1 => ModType::Volume,
            2 => ModType::Pan,
            _ => ModType::Pitch,
        }
    }
}

/// A single sequencer command. Each variant carries only its operands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    // === Notes and time ===
    /// Start a note that releases after `duration` ticks.
    /// `velocity` is `None` for encodings that carry no velocity byte.
    Note { key: u8, velocity: Option<u8>, duration: u16 },
    /// Start a note that is held until a matching `EndOfTie`.
    Tie { key: u8, velocity: u8 },
    /// Release a tied note (`None` = the most recently tied key).
    EndOfTie { key: Option<u8> },
    /// Wait before reading the next command.
    Rest { ticks: u16 },

    // === Performance parameters ===
    /// Select an instrument from the voice table
    Voice(u8),
    /// Track volume (0-127)
    Volume(u8),
    /// Track panning (-64 to +63)
    Pan(i8),
    /// Pitch bend (-64 to +63)
    PitchBend(i8),
    /// Semitones covered by a full pitch bend
    PitchBendRange(u8),
    /// Tempo in driver units (already scaled for the dialect's tempo stack)
    Tempo(u16),
    /// Transpose all following notes (semitones)
    KeyShift(i8),
    /// Fine tuning (1/64 semitone)
    Tune(i8),

    // === Modulation ===
    LfoSpeed(u8),
    LfoDelay(u8),
    ModDepth(u8),
    ModType(ModType),

    // === Driver extras (decoded, no audible effect) ===
    Priority(u8),
    MemoryAccess { op: u8, address: u8, data: u8 },
    ExtendedCommand { kind: u8, value: u8 },

    // === Flow control ===
    /// Continue reading at an absolute ROM offset
    Jump { target: usize },
    /// Push the return offset and continue at `target`
    Call { target: usize },
    /// Pop the call stack
    Return,
    /// End of track
    Finish,
}

/// Fieldless discriminant of a [`Command`], used as the previous-command marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandKind {
    Note,
    Tie,
    EndOfTie,
    Rest,
    Voice,
    Volume,
    Pan,
    PitchBend,
    PitchBendRange,
    Tempo,
    KeyShift,
    Tune,
    LfoSpeed,
    LfoDelay,
    ModDepth,
    ModType,
    Priority,
    MemoryAccess,
    ExtendedCommand,
    Jump,
    Call,
    Return,
    Finish,
}

impl Command {
    /// The kind of this command.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Note { .. } => CommandKind::Note,
            Command::Tie { .. } => CommandKind::Tie,
            Command::EndOfTie { .. } => CommandKind::EndOfTie,
            Command::Rest { .. } => CommandKind::Rest,
            Command::Voice(_) => CommandKind::Voice,
            Command::Volume(_) => CommandKind::Volume,
            Command::Pan(_) => CommandKind::Pan,
            Command::PitchBend(_) => CommandKind::PitchBend,
            Command::PitchBendRange(_) => CommandKind::PitchBendRange,
            Command::Tempo(_) => CommandKind::Tempo,
            Command::KeyShift(_) => CommandKind::KeyShift,
            Command::Tune(_) => CommandKind::Tune,
            Command::LfoSpeed(_) => CommandKind::LfoSpeed,
            Command::LfoDelay(_) => CommandKind::LfoDelay,
            Command::ModDepth(_) => CommandKind::ModDepth,
            Command::ModType(_) => CommandKind::ModType,
            Command::Priority(_) => CommandKind::Priority,
            Command::MemoryAccess { .. } => CommandKind::MemoryAccess,
            Command::ExtendedCommand { .. } => CommandKind::ExtendedCommand,
            Command::Jump { .. } => CommandKind::Jump,
            Command::Call { .. } => CommandKind::Call,
            Command::Return => CommandKind::Return,
            Command::Finish => CommandKind::Finish,
        }
    }

    /// Branch target of a jump or call.
    pub fn branch_target(&self) -> Option<usize> {
        match self {
            Command::Jump { target } | Command::Call { target } => Some(*target),
            _ => None,
        }
    }

    /// True if the command that follows in ROM order is never reached
    /// from this one by falling through.
    pub fn ends_flow(&self) -> bool {
        matches!(self, Command::Jump { .. } | Command::Return | Command::Finish)
    }
}
