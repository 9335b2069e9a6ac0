//! Block loudness estimation.
//!
//! Intensity is `20 * log10(10 * ||x||)` where `||x||` is the Euclidean norm
//! of the block. It is a relative level, not a calibrated SPL reading: a
//! 4410-sample block of full-scale noise lands around 75-80 dB, speech at
//! arm's length somewhere in the 30-60 dB band.

use crate::audio::AudioBlock;

/// Fixed gain applied to the norm before the log
pub const NORM_SCALE: f64 = 10.0;

/// Loudness of one block in decibels
pub fn estimate_intensity(block: &AudioBlock) -> f64 {
    intensity_of(block.samples())
}

/// Loudness of a raw sample slice in decibels.
///
/// Returns `0.0` for silence (or an empty slice) instead of `-inf`.
/// Non-finite samples are treated as silence.
pub fn intensity_of(samples: &[f32]) -> f64 {
    let sum_squares: f64 = samples
        .iter()
        .filter(|s| s.is_finite())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let scaled_norm = sum_squares.sqrt() * NORM_SCALE;

    if scaled_norm > 0.0 && scaled_norm.is_finite() {
        20.0 * scaled_norm.log10()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_is_zero() {
        assert_eq!(intensity_of(&[0.0; 4410]), 0.0);
        assert_eq!(intensity_of(&[]), 0.0);
    }

    #[test]
    fn test_known_norm() {
        // norm = 1.0 -> scaled 10 -> 20 dB
        assert!((intensity_of(&[1.0]) - 20.0).abs() < 1e-9);
        // norm = 5 (3-4-5 triangle) -> scaled 50 -> 20*log10(50)
        let expected = 20.0 * 50f64.log10();
        assert!((intensity_of(&[0.3 * 10.0, 0.4 * 10.0]) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_quiet_input_can_be_negative() {
        // norm = 0.01 -> scaled 0.1 -> -20 dB
        assert!((intensity_of(&[0.01]) + 20.0).abs() < 1e-6);
    }

    #[test]
    fn test_louder_block_is_more_intense() {
        let quiet = vec![0.01_f32; 4410];
        let loud = vec![0.5_f32; 4410];
        assert!(intensity_of(&loud) > intensity_of(&quiet));
    }

    #[test]
    fn test_non_finite_samples_ignored() {
        assert_eq!(intensity_of(&[f32::NAN, 0.0, f32::INFINITY]), 0.0);
        assert!((intensity_of(&[f32::NAN, 1.0]) - 20.0).abs() < 1e-9);
    }
}
