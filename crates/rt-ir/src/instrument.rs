//! Voice table records.

/// Envelope rates of a voice, as stored in the ROM.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Adsr {
    /// Added to the envelope level every envelope step
    pub attack: u8,
    /// Multiplier applied every step until the sustain level is reached
    pub decay: u8,
    /// Level held while the note is on (0-255)
    pub sustain: u8,
    /// Multiplier applied every step after note-off
    pub release: u8,
}

/// One playable instrument resolved from a voice table for a given key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoiceEntry {
    /// Lowest key this entry answers to
    pub min_key: u8,
    /// Highest key this entry answers to
    pub max_key: u8,
    /// Key at which the sample plays at its native rate
    pub root_key: u8,
    /// Absolute ROM offset of the sample header
    pub sample: usize,
    /// Ignore the key and play at the sample's native rate
    pub fixed_frequency: bool,
    /// Instrument panning override (-64 to +63)
    pub pan: Option<i8>,
    /// Envelope rates
    pub adsr: Adsr,
}

impl VoiceEntry {
    /// Whether `key` falls inside this entry's key range.
    pub fn covers(&self, key: u8) -> bool {
        (self.min_key..=self.max_key).contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_range_is_inclusive() {
        let entry = VoiceEntry {
            min_key: 36,
            max_key: 48,
            root_key: 60,
            sample: 0,
            fixed_frequency: false,
            pan: None,
            adsr: Adsr::default(),
        };
        assert!(entry.covers(36));
        assert!(entry.covers(48));
        assert!(!entry.covers(49));
        assert!(!entry.covers(35));
    }
}
