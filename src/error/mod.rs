// Error types for the voice volume controller
//
// This module defines custom error types for capture, volume control,
// calibration, supervision and configuration, each carrying a numeric code
// so callers (CLI, UI shells) can branch on failures without string matching.

mod audio;
mod calibration;
mod config;
mod supervisor;
mod volume;

pub use audio::{log_audio_error, AudioCaptureError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};
pub use supervisor::{log_supervisor_error, SupervisorError, SupervisorErrorCodes};
pub use volume::{log_volume_error, VolumeControlError, VolumeErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and its front ends.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
