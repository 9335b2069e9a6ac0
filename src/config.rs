//! Configuration management for the volume controller
//!
//! This module provides runtime configuration loading from JSON files so
//! thresholds, sensitivity and timing can be tuned without recompilation.
//! It is also the persistence point for calibrated thresholds: a completed
//! calibration is folded in with [`AppConfig::apply_calibration`] and written
//! back with [`AppConfig::save_to_file`]. The processing core never touches
//! storage itself.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::analysis::mapper::{clamp_sensitivity, MappingConfig};
use crate::calibration::CalibrationOutcome;
use crate::engine::recovery::RecoveryPolicy;
use crate::error::ConfigError;
use crate::logging::LogConfig;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mapping: MappingConfig,
    pub smoothing: SmoothingConfig,
    pub audio: AudioConfig,
    pub calibration: CalibrationConfig,
    pub recovery: RecoveryPolicy,
    pub channel: ChannelConfig,
    pub logging: LogConfig,
}

/// Moving-average window parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Number of recent volume values averaged together
    pub window_size: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window_size: 5 }
    }
}

/// Capture stream parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Requested input channels (only the first is analysed)
    pub channels: u16,
    /// Duration of one analysis block in milliseconds
    pub block_duration_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 1,
            block_duration_ms: 100,
        }
    }
}

impl AudioConfig {
    /// Number of samples per block at the configured rate
    pub fn block_size(&self) -> usize {
        ((self.sample_rate as u64 * self.block_duration_ms) / 1000).max(1) as usize
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_millis(self.block_duration_ms)
    }
}

/// Calibration session parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Length of the collection window in seconds
    pub duration_secs: f64,
    /// Minimum samples required before thresholds are computed
    pub required_samples: usize,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            duration_secs: 5.0,
            required_samples: 50,
        }
    }
}

/// Producer/consumer channel parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Maximum queued (intensity, volume) samples before new ones are dropped
    pub capacity: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing or malformed files are not fatal: a warning is logged and the
    /// defaults are returned.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match Self::try_load(&path) {
            Ok(config) => {
                tracing::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                config
            }
            Err(err) => {
                tracing::warn!("[Config] {}. Using defaults.", err);
                Self::default()
            }
        }
    }

    /// Load configuration from JSON file, surfacing I/O and parse failures
    pub fn try_load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config.sanitized())
    }

    /// Write configuration as pretty JSON, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)
            .map_err(|source| ConfigError::Serialize { source })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("[Config] Saved configuration to {:?}", path);
        Ok(())
    }

    /// Clamp every field into its usable range
    pub fn sanitized(mut self) -> Self {
        self.mapping.sensitivity = clamp_sensitivity(self.mapping.sensitivity);
        if !self.mapping.curve_exponent.is_finite() || self.mapping.curve_exponent <= 0.0 {
            self.mapping.curve_exponent = MappingConfig::default().curve_exponent;
        }
        self.smoothing.window_size = self.smoothing.window_size.max(1);
        self.audio.sample_rate = self.audio.sample_rate.max(1);
        self.audio.channels = self.audio.channels.max(1);
        self.audio.block_duration_ms = self.audio.block_duration_ms.max(10);
        self.calibration.required_samples = self.calibration.required_samples.max(1);
        if !self.calibration.duration_secs.is_finite() || self.calibration.duration_secs <= 0.0 {
            self.calibration.duration_secs = CalibrationConfig::default().duration_secs;
        }
        self.channel.capacity = self.channel.capacity.max(1);
        self
    }

    /// Fold the thresholds of a completed calibration into the mapping
    pub fn apply_calibration(&mut self, outcome: &CalibrationOutcome) {
        self.mapping = self.mapping.with_thresholds(outcome);
    }
}
