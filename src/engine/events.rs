// Supervisor notifications and capture-thread commands

use tokio::sync::oneshot;

use crate::analysis::MappingConfig;
use crate::calibration::CalibrationOutcome;
use crate::engine::state::StreamState;
use crate::error::CalibrationError;

pub type CalibrationResult = Result<CalibrationOutcome, CalibrationError>;

/// Broadcast to every `StreamSupervisor::subscribe` receiver
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    StateChanged {
        from: StreamState,
        to: StreamState,
    },
    /// A retry will run after `delay_ms`
    RecoveryScheduled {
        attempt: u32,
        delay_ms: u64,
        cause: String,
    },
    CalibrationStarted,
    /// One per block while a session collects; `percent` follows the clock
    CalibrationProgress {
        percent: f64,
        samples: usize,
    },
    /// Emitted for explicit and timed-out finishes alike; a success is the
    /// cue to persist the new thresholds
    CalibrationFinished(CalibrationResult),
    /// Terminal; monitoring has stopped processing
    Failed {
        reason: String,
    },
}

/// Applied by the capture thread at the next block boundary
#[derive(Debug)]
pub(crate) enum ControlCommand {
    StartCalibration,
    FinishCalibration(oneshot::Sender<CalibrationResult>),
    SetSensitivity(f64),
    ApplyMapping(MappingConfig),
}
