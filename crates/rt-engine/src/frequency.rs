//! Key-to-frequency conversion for sample playback.
//!
//! Converts a key, the sample's root key and native rate, and a pitch
//! offset in 1/64 semitones into a 16.16 fixed-point increment for stepping
//! through sample data.

/// Pitch units per semitone.
pub const PITCH_STEPS: i32 = 64;

/// Whole octaves a note may move away from its root key.
const MAX_OCTAVES: i32 = 16;

/// Largest increment a channel can add to a 16-bit fraction without overflow.
pub const MAX_INCREMENT: u32 = u32::MAX - 0xFFFF;

/// Multipliers for 0-11 semitones, scaled by 65536 (16.16 fixed-point).
/// `SEMITONE_MUL[n] = round(2^(n/12) * 65536)`
const SEMITONE_MUL: [u32; 12] = [
    65536,  // 0:  1.0
    69433,  // 1:  2^(1/12)
    73562,  // 2:  2^(2/12)
    77936,  // 3:  2^(3/12)
    82570,  // 4:  2^(4/12)
    87480,  // 5:  2^(5/12)
    92682,  // 6:  2^(6/12)
    98193,  // 7:  2^(7/12)
    104032, // 8:  2^(8/12)
    110218, // 9:  2^(9/12)
    116772, // 10: 2^(10/12)
    123715, // 11: 2^(11/12)
];

/// Compute the 16.16 increment for `key` played on a sample recorded at `root_key`.
///
/// - `pitch`: extra offset in 1/64 semitones (bend, tune, vibrato)
/// - `rate`: the sample's native rate, Hz in 22.10 fixed-point
/// - `sample_rate`: output rate in Hz
pub fn key_to_increment(key: u8, root_key: u8, pitch: i32, rate: u32, sample_rate: u32) -> u32 {
    let fine = (key as i32 - root_key as i32) * PITCH_STEPS + pitch;
    rate_to_increment(shift_rate(rate, fine), sample_rate)
}

/// Increment that plays a sample at its native rate.
pub fn native_increment(rate: u32, sample_rate: u32) -> u32 {
    rate_to_increment(rate as u64, sample_rate)
}

/// increment = rate / 1024 * 65536 / sample_rate
fn rate_to_increment(rate: u64, sample_rate: u32) -> u32 {
    if sample_rate == 0 {
        return 0;
    }
    ((rate << 6) / sample_rate as u64).min(MAX_INCREMENT as u64) as u32
}

/// Shift a 22.10 rate by `fine` 1/64-semitone steps using 12-TET.
fn shift_rate(rate: u32, fine: i32) -> u64 {
    let semitones = fine.div_euclid(PITCH_STEPS);
    let steps = fine.rem_euclid(PITCH_STEPS);
    let octaves = semitones.div_euclid(12).clamp(-MAX_OCTAVES, MAX_OCTAVES);
    let remainder = semitones.rem_euclid(12) as usize;

    let mut scaled = (rate as u64 * SEMITONE_MUL[remainder] as u64) >> 16;
    if steps != 0 {
        let mul = libm::exp2f(steps as f32 / (12 * PITCH_STEPS) as f32);
        scaled = (scaled as f32 * mul) as u64;
    }

    if octaves >= 0 {
        scaled << octaves as u32
    } else {
        scaled >> (-octaves) as u32
    }
}
