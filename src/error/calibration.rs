// Calibration error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2004
pub struct CalibrationErrorCodes;

impl CalibrationErrorCodes {
    /// Fewer samples collected than the session requires
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// IQR filtering left too few samples
    pub const TOO_MANY_OUTLIERS: i32 = 2002;

    /// finish() called without a running session
    pub const NOT_RUNNING: i32 = 2003;

    /// Monitoring stopped while a session was collecting
    pub const INTERRUPTED: i32 = 2004;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    tracing::error!(
        code = err.code(),
        component = "CalibrationManager",
        context,
        "Calibration error in {}: {}",
        context,
        err.message()
    );
}

/// Calibration-related errors
///
/// Always surfaced to the caller of `finish()`; no thresholds are committed
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Insufficient samples collected for calibration
    InsufficientSamples { required: usize, collected: usize },

    /// Too many samples fell outside the IQR fences
    TooManyOutliers { kept: usize, minimum: usize },

    /// No calibration session is running
    NotRunning,

    /// Capture ended before the session finished
    Interrupted { collected: usize },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::TooManyOutliers { .. } => CalibrationErrorCodes::TOO_MANY_OUTLIERS,
            CalibrationError::NotRunning => CalibrationErrorCodes::NOT_RUNNING,
            CalibrationError::Interrupted { .. } => CalibrationErrorCodes::INTERRUPTED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            CalibrationError::TooManyOutliers { kept, minimum } => {
                format!(
                    "Too many outliers: {} samples kept, at least {} needed",
                    kept, minimum
                )
            }
            CalibrationError::NotRunning => "Calibration is not running".to_string(),
            CalibrationError::Interrupted { collected } => {
                format!("Calibration interrupted after {} samples", collected)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CalibrationError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for CalibrationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_error_codes() {
        assert_eq!(
            CalibrationError::InsufficientSamples {
                required: 50,
                collected: 3
            }
            .code(),
            CalibrationErrorCodes::INSUFFICIENT_SAMPLES
        );
        assert_eq!(
            CalibrationError::TooManyOutliers {
                kept: 10,
                minimum: 25
            }
            .code(),
            2002
        );
        assert_eq!(CalibrationError::NotRunning.code(), 2003);
        assert_eq!(CalibrationError::Interrupted { collected: 4 }.code(), 2004);
    }

    #[test]
    fn test_calibration_error_messages() {
        let err = CalibrationError::InsufficientSamples {
            required: 50,
            collected: 3,
        };
        assert_eq!(err.message(), "Insufficient samples: need 50, got 3");

        let err = CalibrationError::TooManyOutliers {
            kept: 10,
            minimum: 25,
        };
        assert!(err.message().contains("10 samples kept"));
        assert!(err.message().contains("at least 25"));
    }

    #[test]
    fn test_calibration_error_display() {
        let err = CalibrationError::NotRunning;
        let display = format!("{}", err);
        assert!(display.contains("CalibrationError"));
        assert!(display.contains("2003"));
    }
}
