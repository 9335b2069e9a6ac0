// Volume control error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Volume control error code constants
///
/// Error code range: 3001-3004
pub struct VolumeErrorCodes;

impl VolumeErrorCodes {
    /// The mixer or endpoint could not be reached
    pub const UNAVAILABLE: i32 = 3001;

    /// The mixer command ran but reported failure
    pub const COMMAND_FAILED: i32 = 3002;

    /// The mixer output could not be parsed
    pub const PARSE_FAILED: i32 = 3003;

    /// No volume strategy exists for this platform
    pub const UNSUPPORTED_PLATFORM: i32 = 3004;
}

/// Log a volume control error with structured context
pub fn log_volume_error(err: &VolumeControlError, context: &str) {
    tracing::error!(
        code = err.code(),
        component = "VolumeController",
        context,
        "Volume control error in {}: {}",
        context,
        err.message()
    );
}

/// Errors raised by a `VolumeController` implementation
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeControlError {
    /// Controller backend unreachable
    Unavailable { reason: String },

    /// Backend command failed
    CommandFailed { command: String, reason: String },

    /// Backend output could not be parsed
    ParseFailed { output: String },

    /// No controller for this platform
    UnsupportedPlatform { platform: String },
}

impl ErrorCode for VolumeControlError {
    fn code(&self) -> i32 {
        match self {
            VolumeControlError::Unavailable { .. } => VolumeErrorCodes::UNAVAILABLE,
            VolumeControlError::CommandFailed { .. } => VolumeErrorCodes::COMMAND_FAILED,
            VolumeControlError::ParseFailed { .. } => VolumeErrorCodes::PARSE_FAILED,
            VolumeControlError::UnsupportedPlatform { .. } => {
                VolumeErrorCodes::UNSUPPORTED_PLATFORM
            }
        }
    }

    fn message(&self) -> String {
        match self {
            VolumeControlError::Unavailable { reason } => {
                format!("Volume control unavailable: {}", reason)
            }
            VolumeControlError::CommandFailed { command, reason } => {
                format!("Volume command '{}' failed: {}", command, reason)
            }
            VolumeControlError::ParseFailed { output } => {
                format!("Could not parse mixer output: {}", output.trim())
            }
            VolumeControlError::UnsupportedPlatform { platform } => {
                format!("No volume controller for platform '{}'", platform)
            }
        }
    }
}

impl fmt::Display for VolumeControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VolumeControlError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for VolumeControlError {}

impl From<std::io::Error> for VolumeControlError {
    fn from(err: std::io::Error) -> Self {
        VolumeControlError::Unavailable {
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_error_codes() {
        assert_eq!(
            VolumeControlError::Unavailable {
                reason: "x".to_string()
            }
            .code(),
            3001
        );
        assert_eq!(
            VolumeControlError::ParseFailed {
                output: "garbage".to_string()
            }
            .code(),
            VolumeErrorCodes::PARSE_FAILED
        );
    }

    #[test]
    fn test_command_failed_message() {
        let err = VolumeControlError::CommandFailed {
            command: "osascript".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert_eq!(err.message(), "Volume command 'osascript' failed: exit status 1");
    }
}
