// Audio module - capture sources and realtime buffering

pub mod block;
pub mod buffer_pool;
#[cfg(feature = "microphone")]
pub mod cpal_source;
pub mod scripted;
pub mod source;
pub mod synthetic;
pub mod wav_source;

pub use block::{AudioBlock, CaptureStatus, StreamSpec};
pub use buffer_pool::{AudioBuffer, BufferPool, BufferPoolChannels};
#[cfg(feature = "microphone")]
pub use cpal_source::CpalSource;
pub use scripted::{ScriptStep, ScriptedSource};
pub use source::{AudioCaptureSource, CaptureSourceFactory};
pub use synthetic::{SignalPattern, SyntheticSource};
pub use wav_source::WavSource;

use crate::error::AudioCaptureError;

/// Factory for the default input device
#[cfg(feature = "microphone")]
pub fn microphone_factory() -> impl CaptureSourceFactory + 'static {
    || -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> { Ok(Box::new(CpalSource::new())) }
}

/// Without the `microphone` feature every attempt reports `Unsupported`
#[cfg(not(feature = "microphone"))]
pub fn microphone_factory() -> impl CaptureSourceFactory + 'static {
    || -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
        Err(AudioCaptureError::Unsupported {
            backend: "microphone (built without the `microphone` feature)".to_string(),
        })
    }
}
