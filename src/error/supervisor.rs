// Stream supervisor error types and constants

use crate::error::{AudioCaptureError, ErrorCode};
use std::fmt;

/// Supervisor error code constants
///
/// Error code range: 4001-4005
pub struct SupervisorErrorCodes;

impl SupervisorErrorCodes {
    pub const ALREADY_RUNNING: i32 = 4001;
    pub const NOT_RUNNING: i32 = 4002;
    pub const START_FAILED: i32 = 4003;
    pub const WORKER_PANICKED: i32 = 4004;
    pub const DISCONNECTED: i32 = 4005;
}

/// Log a supervisor error with structured context
pub fn log_supervisor_error(err: &SupervisorError, context: &str) {
    tracing::error!(
        code = err.code(),
        component = "StreamSupervisor",
        context,
        "Supervisor error in {}: {}",
        context,
        err.message()
    );
}

/// Lifecycle errors returned by `StreamSupervisor`
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorError {
    /// start() while the capture thread is alive
    AlreadyRunning,

    /// Command sent while monitoring is stopped
    NotRunning,

    /// The source could not be opened on start
    StartFailed(AudioCaptureError),

    /// The capture thread panicked; its pipeline state is lost
    WorkerPanicked,

    /// The capture thread went away before answering
    Disconnected,
}

impl ErrorCode for SupervisorError {
    fn code(&self) -> i32 {
        match self {
            SupervisorError::AlreadyRunning => SupervisorErrorCodes::ALREADY_RUNNING,
            SupervisorError::NotRunning => SupervisorErrorCodes::NOT_RUNNING,
            SupervisorError::StartFailed(_) => SupervisorErrorCodes::START_FAILED,
            SupervisorError::WorkerPanicked => SupervisorErrorCodes::WORKER_PANICKED,
            SupervisorError::Disconnected => SupervisorErrorCodes::DISCONNECTED,
        }
    }

    fn message(&self) -> String {
        match self {
            SupervisorError::AlreadyRunning => {
                "Monitoring already running. Call stop() first.".to_string()
            }
            SupervisorError::NotRunning => {
                "Monitoring not running. Call start() first.".to_string()
            }
            SupervisorError::StartFailed(cause) => {
                format!("Failed to start monitoring: {}", cause.message())
            }
            SupervisorError::WorkerPanicked => "Capture thread panicked".to_string(),
            SupervisorError::Disconnected => "Capture thread disconnected".to_string(),
        }
    }
}

impl fmt::Display for SupervisorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SupervisorError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for SupervisorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupervisorError::StartFailed(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<AudioCaptureError> for SupervisorError {
    fn from(err: AudioCaptureError) -> Self {
        SupervisorError::StartFailed(err)
    }
}
