//! Intensity to volume mapping.
//!
//! Policy, in order:
//! 1. degenerate calibration (`max <= min`) maps to 0
//! 2. anything at or below the noise floor maps to 0
//! 3. normalise into `[min, max]`, clamp to `[0, 1]`
//! 4. raise to `curve_exponent` (cubic by default, so quiet input near the
//!    floor barely moves the volume while loud input drives it up quickly)
//! 5. scale by sensitivity and cap at 1

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationOutcome;

pub const MIN_SENSITIVITY: f64 = 0.1;
pub const MAX_SENSITIVITY: f64 = 2.0;

/// Thresholds and response shape used by [`map_volume`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Intensity (dB) mapped to volume 0 before the curve
    pub min_intensity: f64,
    /// Intensity (dB) mapped to full scale before sensitivity
    pub max_intensity: f64,
    /// Intensities at or below this are treated as background noise
    pub noise_floor: f64,
    /// Output multiplier, clamped to [0.1, 2.0]
    pub sensitivity: f64,
    /// Exponent of the response curve
    pub curve_exponent: f64,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            min_intensity: 0.0,
            max_intensity: 100.0,
            noise_floor: 0.0,
            sensitivity: 1.0,
            curve_exponent: 3.0,
        }
    }
}

impl MappingConfig {
    /// Copy with sensitivity replaced (clamped into range)
    pub fn with_sensitivity(mut self, sensitivity: f64) -> Self {
        self.sensitivity = clamp_sensitivity(sensitivity);
        self
    }

    /// Copy with the calibrated thresholds applied
    pub fn with_thresholds(mut self, outcome: &CalibrationOutcome) -> Self {
        self.noise_floor = outcome.noise_floor;
        self.min_intensity = outcome.min_intensity;
        self.max_intensity = outcome.max_intensity;
        self
    }

    /// True when the thresholds cannot produce any volume
    pub fn is_degenerate(&self) -> bool {
        !(self.max_intensity > self.min_intensity)
    }
}

/// Clamp a sensitivity value into `[MIN_SENSITIVITY, MAX_SENSITIVITY]`.
/// NaN falls back to 1.0.
pub fn clamp_sensitivity(sensitivity: f64) -> f64 {
    if sensitivity.is_nan() {
        return 1.0;
    }
    sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
}

/// Map an intensity (dB) to a volume level in `[0, 1]`.
///
/// Never fails; every degenerate input is clamped.
pub fn map_volume(intensity: f64, config: &MappingConfig) -> f64 {
    if config.is_degenerate() || !intensity.is_finite() {
        return 0.0;
    }
    if intensity <= config.noise_floor {
        return 0.0;
    }

    let span = config.max_intensity - config.min_intensity;
    let normalized = ((intensity - config.min_intensity) / span).clamp(0.0, 1.0);
    let exponent = if config.curve_exponent.is_finite() && config.curve_exponent > 0.0 {
        config.curve_exponent
    } else {
        1.0
    };
    let mapped = normalized.powf(exponent);

    (mapped * clamp_sensitivity(config.sensitivity)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calibrated() -> MappingConfig {
        MappingConfig {
            min_intensity: 20.0,
            max_intensity: 80.0,
            noise_floor: 10.0,
            sensitivity: 1.0,
            curve_exponent: 3.0,
        }
    }

    #[test]
    fn test_midpoint_maps_through_cubic_curve() {
        let volume = map_volume(50.0, &calibrated());
        assert!((volume - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_noise_gate() {
        assert_eq!(map_volume(5.0, &calibrated()), 0.0);
        assert_eq!(map_volume(10.0, &calibrated()), 0.0);
    }

    #[test]
    fn test_degenerate_calibration_is_silent() {
        let config = MappingConfig {
            min_intensity: 40.0,
            max_intensity: 40.0,
            ..calibrated()
        };
        assert_eq!(map_volume(70.0, &config), 0.0);

        let inverted = MappingConfig {
            min_intensity: 60.0,
            max_intensity: 30.0,
            ..calibrated()
        };
        assert_eq!(map_volume(70.0, &inverted), 0.0);
    }

    #[test]
    fn test_above_max_saturates_and_sensitivity_caps_at_one() {
        assert_eq!(map_volume(120.0, &calibrated()), 1.0);
        let loud = calibrated().with_sensitivity(2.0);
        assert_eq!(map_volume(75.0, &loud), 1.0);
    }

    #[test]
    fn test_between_floor_and_min_is_zero_after_clamp() {
        // Above the gate but below min_intensity -> normalized clamps to 0
        assert_eq!(map_volume(15.0, &calibrated()), 0.0);
    }

    #[test]
    fn test_sensitivity_is_clamped() {
        assert_eq!(calibrated().with_sensitivity(0.0).sensitivity, MIN_SENSITIVITY);
        assert_eq!(calibrated().with_sensitivity(7.5).sensitivity, MAX_SENSITIVITY);
        assert_eq!(clamp_sensitivity(f64::NAN), 1.0);

        let raw = MappingConfig {
            sensitivity: 50.0,
            ..calibrated()
        };
        // mapper clamps even when the config bypassed with_sensitivity
        assert!((map_volume(50.0, &raw) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_intensity() {
        assert_eq!(map_volume(f64::NAN, &calibrated()), 0.0);
        assert_eq!(map_volume(f64::INFINITY, &calibrated()), 0.0);
    }

    proptest! {
        #[test]
        fn prop_monotonic_over_calibrated_range(
            a in 20.0f64..80.0,
            b in 20.0f64..80.0,
            sensitivity in 0.1f64..2.0,
        ) {
            let config = calibrated().with_sensitivity(sensitivity);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(map_volume(lo, &config) <= map_volume(hi, &config));
        }

        #[test]
        fn prop_output_in_unit_range(
            intensity in -200.0f64..200.0,
            min in -50.0f64..100.0,
            max in -50.0f64..150.0,
            floor in -60.0f64..100.0,
            sensitivity in -1.0f64..5.0,
        ) {
            let config = MappingConfig {
                min_intensity: min,
                max_intensity: max,
                noise_floor: floor,
                sensitivity,
                curve_exponent: 3.0,
            };
            let volume = map_volume(intensity, &config);
            prop_assert!((0.0..=1.0).contains(&volume));
        }

        #[test]
        fn prop_gate_and_degenerate_are_silent(
            intensity in -100.0f64..100.0,
            sensitivity in 0.1f64..2.0,
        ) {
            let gated = MappingConfig {
                noise_floor: intensity,
                ..calibrated().with_sensitivity(sensitivity)
            };
            prop_assert_eq!(map_volume(intensity, &gated), 0.0);

            let degenerate = MappingConfig {
                min_intensity: 50.0,
                max_intensity: 50.0,
                noise_floor: -1000.0,
                ..calibrated().with_sensitivity(sensitivity)
            };
            prop_assert_eq!(map_volume(intensity, &degenerate), 0.0);
        }
    }
}
