//! ADSR envelope with the drivers' integer arithmetic.
//!
//! The level is an 8-bit value stepped once per mixer block. Attack adds,
//! decay and release multiply by the rate and shift right by a
//! dialect-specific amount, truncating exactly like the hardware drivers.

use rt_ir::{Adsr, Dialect, ENVELOPE_CEILING};

/// Envelope phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    Release,
    /// Silent; the channel is free.
    #[default]
    Stopped,
}

/// Runtime state of one channel's envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct Envelope {
    phase: EnvelopePhase,
    level: u8,
    rates: Adsr,
    shift: u32,
    mask: u8,
}

impl Envelope {
    /// Start a new note at level 0 in the attack phase.
    pub fn start(rates: Adsr, dialect: Dialect) -> Self {
        Self {
            phase: EnvelopePhase::Attack,
            level: 0,
            rates,
            shift: dialect.envelope_shift(),
            mask: dialect.rate_mask(),
        }
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    /// Current level (0 to [`ENVELOPE_CEILING`]).
    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == EnvelopePhase::Stopped
    }

    pub fn is_releasing(&self) -> bool {
        matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Stopped)
    }

    /// Note-off: enter the release phase from wherever the level is.
    pub fn release(&mut self) {
        if !self.is_releasing() {
            self.phase = EnvelopePhase::Release;
        }
    }

    /// Silence immediately.
    pub fn stop(&mut self) {
        self.phase = EnvelopePhase::Stopped;
        self.level = 0;
    }

    /// Advance one envelope step.
    pub fn step(&mut self) {
        match self.phase {
            EnvelopePhase::Attack => {
                // Attack 0 reaches the ceiling in one step.
                let rate = if self.rates.attack == 0 { ENVELOPE_CEILING } else { self.rates.attack };
                let next = self.level as u16 + rate as u16;
                if next >= ENVELOPE_CEILING as u16 {
                    self.level = ENVELOPE_CEILING;
                    self.phase = EnvelopePhase::Decay;
                } else {
                    self.level = next as u8;
                }
            }
            EnvelopePhase::Decay => {
                let next = self.scale(self.rates.decay);
                if next <= self.rates.sustain {
                    self.level = self.rates.sustain;
                    self.phase = EnvelopePhase::Sustain;
                } else {
                    self.level = next;
                }
            }
            EnvelopePhase::Sustain => {}
            EnvelopePhase::Release => {
                self.level = self.scale(self.rates.release);
                if self.level == 0 {
                    self.phase = EnvelopePhase::Stopped;
                }
            }
            EnvelopePhase::Stopped => {}
        }
    }

    /// `(level * (rate & mask)) >> shift`
    fn scale(&self, rate: u8) -> u8 {
        ((self.level as u32 * (rate & self.mask) as u32) >> self.shift) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adsr(attack: u8, decay: u8, sustain: u8, release: u8) -> Adsr {
        Adsr { attack, decay, sustain, release }
    }

    #[test]
    fn attack_rises_strictly_to_ceiling_then_decays() {
        let mut env = Envelope::start(adsr(40, 200, 100, 200), Dialect::Mp2k);
        let mut prev = env.level();
        let mut steps = 0;
        while env.phase() == EnvelopePhase::Attack {
            env.step();
            steps += 1;
            if env.phase() == EnvelopePhase::Attack {
                assert!(env.level() > prev);
            }
            prev = env.level();
            assert!(steps < 300);
        }
        assert_eq!(env.level(), ENVELOPE_CEILING);
        assert_eq!(env.phase(), EnvelopePhase::Decay);
    }

    #[test]
    fn zero_attack_is_instant() {
        let mut env = Envelope::start(adsr(0, 0, 0, 0), Dialect::Mp2k);
        env.step();
        assert_eq!(env.level(), ENVELOPE_CEILING);
        assert_eq!(env.phase(), EnvelopePhase::Decay);
    }

    #[test]
    fn decay_never_undershoots_sustain() {
        for dialect in [Dialect::Mp2k, Dialect::AlphaDream] {
            let mut env = Envelope::start(adsr(0xFF, 0xF0, 90, 0x80), dialect);
            env.step();
            let mut prev = env.level();
            while env.phase() == EnvelopePhase::Decay {
                env.step();
                assert!(env.level() <= prev);
                assert!(env.level() >= 90);
                prev = env.level();
            }
            assert_eq!(env.phase(), EnvelopePhase::Sustain);
            assert_eq!(env.level(), 90);
        }
    }

    #[test]
    fn decay_uses_exact_truncation() {
        // 255 * 200 >> 8 = 199
        let mut env = Envelope::start(adsr(0xFF, 200, 0, 0), Dialect::Mp2k);
        env.step();
        env.step();
        assert_eq!(env.level(), 199);

        // AlphaDream masks to 7 bits: 200 & 0x7F = 72, 255 * 72 >> 7 = 143
        let mut env = Envelope::start(adsr(0xFF, 200, 0, 0), Dialect::AlphaDream);
        env.step();
        env.step();
        assert_eq!(env.level(), 143);
    }

    #[test]
    fn sustain_holds() {
        let mut env = Envelope::start(adsr(0xFF, 0, 128, 0), Dialect::Mp2k);
        env.step();
        env.step();
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        for _ in 0..10 {
            env.step();
            assert_eq!(env.level(), 128);
        }
    }

    #[test]
    fn release_falls_to_stopped() {
        for dialect in [Dialect::Mp2k, Dialect::AlphaDream] {
            let mut env = Envelope::start(adsr(0xFF, 0xFF, 0xFF, 0xF0), dialect);
            env.step();
            env.release();
            assert_eq!(env.phase(), EnvelopePhase::Release);
            let mut prev = env.level();
            let mut steps = 0;
            while !env.is_stopped() {
                env.step();
                assert!(env.level() <= prev);
                prev = env.level();
                steps += 1;
                assert!(steps < 1000);
            }
            assert_eq!(env.level(), 0);
        }
    }

    #[test]
    fn release_from_attack() {
        let mut env = Envelope::start(adsr(10, 0xFF, 0xFF, 0), Dialect::Mp2k);
        env.step();
        env.release();
        env.step();
        assert!(env.is_stopped());
    }

    #[test]
    fn default_is_stopped() {
        let env = Envelope::default();
        assert!(env.is_stopped());
        assert!(env.is_releasing());
    }
}
