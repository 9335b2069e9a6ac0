// CalibrationManager: time-bounded sample collection and threshold fitting
//
// Owned by the capture thread; nothing here locks. The clock is injected so
// progress and expiry are testable without sleeping.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::calibration::stats::{percentile_sorted, IqrFilter};
use crate::calibration::{CalibrationOutcome, CalibrationStatus};
use crate::config::CalibrationConfig;
use crate::error::{log_calibration_error, CalibrationError};
use crate::time::{SystemTimeSource, TimeSource};

pub const DEFAULT_REQUIRED_SAMPLES: usize = 50;
pub const DEFAULT_DURATION: Duration = Duration::from_secs(5);

const NOISE_FLOOR_PERCENTILE: f64 = 10.0;
const MIN_INTENSITY_PERCENTILE: f64 = 20.0;
const MAX_INTENSITY_PERCENTILE: f64 = 90.0;

/// Stateful calibration session
pub struct CalibrationManager {
    samples: Vec<f64>,
    status: CalibrationStatus,
    start_time: Option<Instant>,
    duration: Duration,
    required_samples: usize,
    outcome: Option<CalibrationOutcome>,
    time_source: Arc<dyn TimeSource>,
}

impl CalibrationManager {
    pub fn new(duration: Duration, required_samples: usize) -> Self {
        Self::with_time_source(duration, required_samples, Arc::new(SystemTimeSource::default()))
    }

    pub fn with_time_source(
        duration: Duration,
        required_samples: usize,
        time_source: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            samples: Vec::with_capacity(required_samples),
            status: CalibrationStatus::Idle,
            start_time: None,
            duration,
            required_samples: required_samples.max(1),
            outcome: None,
            time_source,
        }
    }

    pub fn from_config(config: &CalibrationConfig, time_source: Arc<dyn TimeSource>) -> Self {
        let duration = Duration::try_from_secs_f64(config.duration_secs).unwrap_or(DEFAULT_DURATION);
        Self::with_time_source(duration, config.required_samples, time_source)
    }

    /// Begin a new session, discarding any previous samples
    pub fn start(&mut self) {
        self.samples.clear();
        self.start_time = Some(self.time_source.now());
        self.status = CalibrationStatus::Running;
        tracing::info!(
            "[CalibrationManager] Started ({:.1}s, {} samples required)",
            self.duration.as_secs_f64(),
            self.required_samples
        );
    }

    /// Record one intensity; ignored unless running or when not finite
    pub fn add_sample(&mut self, intensity: f64) {
        if self.status != CalibrationStatus::Running || !intensity.is_finite() {
            return;
        }
        self.samples.push(intensity);
    }

    /// Percentage of the session duration elapsed, 100 when not running
    pub fn progress(&self) -> f64 {
        match (self.status, self.start_time) {
            (CalibrationStatus::Running, Some(start)) => {
                if self.duration.is_zero() {
                    return 100.0;
                }
                let elapsed = self.time_source.now().saturating_duration_since(start);
                (elapsed.as_secs_f64() / self.duration.as_secs_f64() * 100.0).min(100.0)
            }
            _ => 100.0,
        }
    }

    /// True once a running session has used up its duration
    pub fn is_expired(&self) -> bool {
        self.is_running() && self.progress() >= 100.0
    }

    /// Fit thresholds from the collected samples
    ///
    /// On failure the status becomes `Failed` and no thresholds change.
    pub fn finish(&mut self) -> Result<CalibrationOutcome, CalibrationError> {
        if self.status != CalibrationStatus::Running {
            return Err(CalibrationError::NotRunning);
        }

        match self.compute() {
            Ok(outcome) => {
                self.status = CalibrationStatus::Completed;
                self.outcome = Some(outcome);
                tracing::info!(
                    "[CalibrationManager] Completed: noise_floor={:.2} min={:.2} max={:.2} ({} kept, {} outliers)",
                    outcome.noise_floor,
                    outcome.min_intensity,
                    outcome.max_intensity,
                    outcome.samples_used,
                    outcome.outliers_rejected
                );
                Ok(outcome)
            }
            Err(err) => {
                self.status = CalibrationStatus::Failed;
                log_calibration_error(&err, "CalibrationManager::finish");
                Err(err)
            }
        }
    }

    fn compute(&self) -> Result<CalibrationOutcome, CalibrationError> {
        let collected = self.samples.len();
        if collected < self.required_samples {
            return Err(CalibrationError::InsufficientSamples {
                required: self.required_samples,
                collected,
            });
        }

        let filter = IqrFilter::apply(&self.samples).ok_or(CalibrationError::InsufficientSamples {
            required: self.required_samples,
            collected,
        })?;

        let kept = filter.kept.len();
        if (kept as f64) < self.required_samples as f64 / 2.0 {
            return Err(CalibrationError::TooManyOutliers {
                kept,
                minimum: self.required_samples.div_ceil(2),
            });
        }

        let pick = |p: f64| percentile_sorted(&filter.kept, p).unwrap_or_default();
        Ok(CalibrationOutcome {
            noise_floor: pick(NOISE_FLOOR_PERCENTILE),
            min_intensity: pick(MIN_INTENSITY_PERCENTILE),
            max_intensity: pick(MAX_INTENSITY_PERCENTILE),
            samples_used: kept,
            outliers_rejected: filter.rejected,
        })
    }

    /// Drop a running session without fitting thresholds
    ///
    /// Used when capture ends mid-session: its samples and start time no
    /// longer describe one continuous recording. Returns the error to report,
    /// or `None` when nothing was running.
    pub fn abandon(&mut self) -> Option<CalibrationError> {
        if !self.is_running() {
            return None;
        }
        let err = CalibrationError::Interrupted {
            collected: self.samples.len(),
        };
        self.samples.clear();
        self.start_time = None;
        self.status = CalibrationStatus::Failed;
        log_calibration_error(&err, "CalibrationManager::abandon");
        Some(err)
    }

    pub fn status(&self) -> CalibrationStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == CalibrationStatus::Running
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    /// Thresholds of the last completed session
    pub fn outcome(&self) -> Option<CalibrationOutcome> {
        self.outcome
    }

    pub fn noise_floor(&self) -> Option<f64> {
        self.outcome.map(|o| o.noise_floor)
    }
}

impl Default for CalibrationManager {
    fn default() -> Self {
        Self::new(DEFAULT_DURATION, DEFAULT_REQUIRED_SAMPLES)
    }
}

impl std::fmt::Debug for CalibrationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CalibrationManager")
            .field("status", &self.status)
            .field("samples", &self.samples.len())
            .field("required_samples", &self.required_samples)
            .field("duration", &self.duration)
            .field("outcome", &self.outcome)
            .finish()
    }
}
