//! Engine module: the capture supervisor and the per-block pipeline.
//!
//! `StreamSupervisor` is the entry point; `Pipeline` is exposed for callers
//! that drive blocks themselves.

pub mod events;
pub mod pipeline;
pub mod recovery;
pub mod state;
pub mod supervisor;
mod worker;

pub use events::{CalibrationResult, SupervisorEvent};
pub use pipeline::Pipeline;
pub use recovery::{RecoveryPolicy, RecoveryTracker};
pub use state::StreamState;
pub use supervisor::StreamSupervisor;
