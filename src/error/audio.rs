// Audio capture error types and constants

use crate::error::ErrorCode;
use std::fmt;

/// Audio capture error code constants
///
/// Error code range: 1001-1006
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    /// No usable input device
    pub const DEVICE_UNAVAILABLE: i32 = 1001;

    /// Failed to open or start the input stream
    pub const STREAM_OPEN_FAILED: i32 = 1002;

    /// The running stream reported a fault
    pub const STREAM_FAILURE: i32 = 1003;

    /// No audio block arrived within the stall timeout
    pub const STALLED: i32 = 1004;

    /// Device sample format cannot be captured
    pub const UNSUPPORTED_FORMAT: i32 = 1005;

    /// Capture backend not compiled into this build
    pub const UNSUPPORTED: i32 = 1006;
}

/// Log an audio capture error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioCaptureError, context: &str) {
    tracing::error!(
        code = err.code(),
        component = "AudioCapture",
        context,
        "Audio capture error in {}: {}",
        context,
        err.message()
    );
}

/// Audio capture errors
///
/// Any of these raised while the supervisor is running sends it into the
/// recovery loop (stop, back off, reopen the source).
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCaptureError {
    /// No input device could be found
    DeviceUnavailable { reason: String },

    /// Failed to open or start the stream
    StreamOpenFailed { reason: String },

    /// Stream reported an error while running
    StreamFailure { reason: String },

    /// No block arrived within `waited_ms`
    Stalled { waited_ms: u64 },

    /// Device sample format is not supported
    UnsupportedFormat { format: String },

    /// Backend not available in this build
    Unsupported { backend: String },
}

impl ErrorCode for AudioCaptureError {
    fn code(&self) -> i32 {
        match self {
            AudioCaptureError::DeviceUnavailable { .. } => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioCaptureError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioCaptureError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioCaptureError::Stalled { .. } => AudioErrorCodes::STALLED,
            AudioCaptureError::UnsupportedFormat { .. } => AudioErrorCodes::UNSUPPORTED_FORMAT,
            AudioCaptureError::Unsupported { .. } => AudioErrorCodes::UNSUPPORTED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioCaptureError::DeviceUnavailable { reason } => {
                format!("No input device available: {}", reason)
            }
            AudioCaptureError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioCaptureError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioCaptureError::Stalled { waited_ms } => {
                format!("No audio received for {} ms", waited_ms)
            }
            AudioCaptureError::UnsupportedFormat { format } => {
                format!("Unsupported sample format: {}", format)
            }
            AudioCaptureError::Unsupported { backend } => {
                format!("Capture backend '{}' is not available in this build", backend)
            }
        }
    }
}

impl fmt::Display for AudioCaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioCaptureError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for AudioCaptureError {}

impl From<std::io::Error> for AudioCaptureError {
    fn from(err: std::io::Error) -> Self {
        AudioCaptureError::StreamOpenFailed {
            reason: err.to_string(),
        }
    }
}
