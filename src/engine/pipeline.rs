// Per-block processing chain owned by the capture thread
//
//   estimate_intensity → CalibrationManager::add_sample          (calibrating)
//   estimate_intensity → map_volume → smooth → set_volume         (otherwise)
//
// Every block yields exactly one LevelSample on the channel, in capture
// order, whatever happens to the controller call.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::analysis::{clamp_sensitivity, estimate_intensity, map_volume, MappingConfig, SmoothingFilter};
use crate::audio::AudioBlock;
use crate::calibration::CalibrationManager;
use crate::channel::{LevelSample, LevelSender};
use crate::config::AppConfig;
use crate::engine::events::{CalibrationResult, ControlCommand, SupervisorEvent};
use crate::error::VolumeControlError;
use crate::time::TimeSource;
use crate::volume::VolumeController;

/// Mutable pipeline state; lives on exactly one thread at a time
pub struct Pipeline {
    calibration: CalibrationManager,
    mapping: MappingConfig,
    smoothing: SmoothingFilter,
    controller: Box<dyn VolumeController>,
    sender: LevelSender,
    current_volume: f64,
    events: broadcast::Sender<SupervisorEvent>,
    config: AppConfig,
}

impl Pipeline {
    pub fn new(
        config: &AppConfig,
        controller: Box<dyn VolumeController>,
        sender: LevelSender,
        time_source: Arc<dyn TimeSource>,
        events: broadcast::Sender<SupervisorEvent>,
    ) -> Self {
        Self {
            calibration: CalibrationManager::from_config(&config.calibration, time_source),
            mapping: config.mapping.with_sensitivity(config.mapping.sensitivity),
            smoothing: SmoothingFilter::new(config.smoothing.window_size),
            controller,
            sender,
            current_volume: 0.0,
            events,
            config: config.clone(),
        }
    }

    /// Run one block through the chain and queue the resulting sample
    ///
    /// A controller failure is returned after the sample has been queued.
    pub fn process_block(&mut self, block: &AudioBlock) -> Result<LevelSample, VolumeControlError> {
        if let Some(status) = block.status() {
            tracing::warn!("[Pipeline] Capture status: {:?}", status);
        }

        let intensity = estimate_intensity(block);

        if self.calibration.is_running() {
            self.calibration.add_sample(intensity);
            let sample = LevelSample::new(intensity, self.current_volume);
            self.sender.push(sample);
            let _ = self.events.send(SupervisorEvent::CalibrationProgress {
                percent: self.calibration.progress(),
                samples: self.calibration.sample_count(),
            });
            self.poll_calibration();
            return Ok(sample);
        }

        let target = map_volume(intensity, &self.mapping);
        let smoothed = self.smoothing.smooth(target);
        let result = self.controller.set_volume(smoothed);
        if result.is_ok() {
            self.current_volume = smoothed;
        }

        let sample = LevelSample::new(intensity, smoothed);
        self.sender.push(sample);
        result.map(|()| sample)
    }

    /// Housekeeping for a poll that produced no block
    pub fn on_idle(&mut self) {
        self.sender.flush();
        self.poll_calibration();
    }

    /// Finish a calibration whose duration has run out
    pub fn poll_calibration(&mut self) {
        if self.calibration.is_expired() {
            tracing::info!(
                "[Pipeline] Calibration window elapsed with {} samples",
                self.calibration.sample_count()
            );
            self.finish_calibration();
        }
    }

    pub(crate) fn apply(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::StartCalibration => self.start_calibration(),
            ControlCommand::FinishCalibration(reply) => {
                let result = self.finish_calibration();
                // The caller may have stopped waiting
                let _ = reply.send(result);
            }
            ControlCommand::SetSensitivity(sensitivity) => {
                self.mapping = self.mapping.with_sensitivity(sensitivity);
                tracing::info!("[Pipeline] Sensitivity set to {:.2}", self.mapping.sensitivity);
            }
            ControlCommand::ApplyMapping(mapping) => {
                self.mapping = MappingConfig {
                    sensitivity: clamp_sensitivity(mapping.sensitivity),
                    ..mapping
                };
                tracing::info!("[Pipeline] Mapping replaced: {:?}", self.mapping);
            }
        }
    }

    pub fn start_calibration(&mut self) {
        self.calibration.start();
        let _ = self.events.send(SupervisorEvent::CalibrationStarted);
    }

    /// Fit thresholds now; on success they take effect immediately
    pub fn finish_calibration(&mut self) -> CalibrationResult {
        let result = self.calibration.finish();
        if let Ok(outcome) = &result {
            self.mapping = self.mapping.with_thresholds(outcome);
        }
        let _ = self.events.send(SupervisorEvent::CalibrationFinished(result.clone()));
        result
    }

    /// Give up on a running session because capture is ending
    ///
    /// Thresholds stay as they were and subscribers see a failed finish.
    pub fn abandon_calibration(&mut self) {
        if let Some(err) = self.calibration.abandon() {
            let _ = self.events.send(SupervisorEvent::CalibrationFinished(Err(err)));
        }
    }

    /// Push out a sample still held back by a full channel
    pub fn flush_levels(&mut self) -> bool {
        self.sender.flush()
    }

    /// Adopt the controller's current level as the starting volume
    pub fn seed_volume(&mut self) {
        match self.controller.get_volume() {
            Ok(level) if level.is_finite() => self.current_volume = level.clamp(0.0, 1.0),
            Ok(_) => {}
            Err(err) => tracing::warn!(
                "[Pipeline] Could not read initial volume from {}: {}",
                self.controller.name(),
                err
            ),
        }
    }

    pub fn reinitialize_controller(&mut self) -> Result<(), VolumeControlError> {
        tracing::info!("[Pipeline] Reinitializing volume controller {}", self.controller.name());
        self.controller.reinitialize()
    }

    /// Swap the clock used by calibration; discards any running session
    pub fn set_time_source(&mut self, time_source: Arc<dyn TimeSource>) {
        self.calibration = CalibrationManager::from_config(&self.config.calibration, time_source);
    }

    pub fn mapping(&self) -> &MappingConfig {
        &self.mapping
    }

    pub fn calibration(&self) -> &CalibrationManager {
        &self.calibration
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn controller_name(&self) -> &str {
        self.controller.name()
    }
}
