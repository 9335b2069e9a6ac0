//! Voice-driven output volume.
//!
//! Microphone blocks are turned into a loudness estimate, mapped through a
//! calibrated cubic curve, smoothed, and applied to the system volume. The
//! capture thread publishes every `(intensity, volume)` pair on a bounded
//! lock-free channel that a consumer drains on its own tick.
//!
//! The entry point is [`engine::StreamSupervisor`].

pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod time;
pub mod volume;

pub use config::AppConfig;
pub use engine::{StreamState, StreamSupervisor, SupervisorEvent};
