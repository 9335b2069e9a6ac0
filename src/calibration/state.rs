// Calibration session status and results

use serde::{Deserialize, Serialize};

/// Lifecycle of a calibration session
///
/// `Idle → Running → {Completed, Failed}`; `start()` re-enters `Running`
/// from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CalibrationStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Thresholds produced by a successful `finish()`
///
/// Always satisfies `noise_floor <= min_intensity <= max_intensity`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationOutcome {
    /// 10th percentile of the kept samples
    pub noise_floor: f64,
    /// 20th percentile of the kept samples
    pub min_intensity: f64,
    /// 90th percentile of the kept samples
    pub max_intensity: f64,
    /// Samples that survived IQR filtering
    pub samples_used: usize,
    pub outliers_rejected: usize,
}
