// Capture source abstraction
//
// Sources are pull-based: the supervisor's capture thread blocks inside
// `next_block` and runs the per-block pipeline synchronously afterwards.

use std::time::Duration;

use crate::audio::{AudioBlock, StreamSpec};
use crate::error::AudioCaptureError;

/// External audio input the supervisor drives
///
/// Sources are created and used on the capture thread only, so they need
/// not be `Send` (cpal streams are not).
pub trait AudioCaptureSource {
    /// Acquire the device or file for `spec`
    fn open(&mut self, spec: &StreamSpec) -> Result<(), AudioCaptureError>;

    fn start(&mut self) -> Result<(), AudioCaptureError>;

    /// Release the stream; must be safe to call more than once
    fn stop(&mut self) -> Result<(), AudioCaptureError>;

    /// Wait up to `timeout` for the next full block
    ///
    /// `Ok(None)` means nothing arrived in time. An `Err` is a source fault
    /// and sends the supervisor into recovery.
    fn next_block(&mut self, timeout: Duration) -> Result<Option<AudioBlock>, AudioCaptureError>;

    fn name(&self) -> &str {
        "capture"
    }
}

/// Creates a fresh source on the capture thread, once per (re)start
pub trait CaptureSourceFactory: Send {
    fn create(&mut self) -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError>;
}

impl<F> CaptureSourceFactory for F
where
    F: FnMut() -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> + Send,
{
    fn create(&mut self) -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
        self()
    }
}
