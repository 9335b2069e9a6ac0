// Audio block and stream parameter types

use std::time::Duration;

use crate::config::AudioConfig;

/// Non-fatal condition reported alongside a block
///
/// Logged by the pipeline; never triggers recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Input arrived faster than it was consumed and samples were lost
    InputOverflow { lost_frames: u64 },
    /// The device delivered less audio than requested
    InputUnderflow,
}

/// One captured block of mono samples, immutable once built
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Vec<f32>,
    sample_rate: u32,
    duration: Duration,
    status: Option<CaptureStatus>,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let duration = Duration::from_secs_f64(samples.len() as f64 / sample_rate as f64);
        Self {
            samples,
            sample_rate,
            duration,
            status: None,
        }
    }

    /// Block of `len` zero samples
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    pub fn with_status(mut self, status: CaptureStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn status(&self) -> Option<CaptureStatus> {
        self.status
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Parameters a capture source is opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per delivered block
    pub block_size: usize,
}

impl StreamSpec {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate.max(1),
            channels: config.channels.max(1),
            block_size: config.block_size(),
        }
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs_f64(self.block_size as f64 / self.sample_rate.max(1) as f64)
    }

    /// Block size that covers the same duration at another sample rate
    pub fn block_size_at(&self, sample_rate: u32) -> usize {
        ((self.block_size as u64 * sample_rate as u64) / self.sample_rate.max(1) as u64).max(1)
            as usize
    }
}

impl Default for StreamSpec {
    fn default() -> Self {
        Self::from_config(&AudioConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_duration_from_length() {
        let block = AudioBlock::silence(4410, 44_100);
        assert_eq!(block.duration(), Duration::from_millis(100));
        assert!(block.status().is_none());
    }

    #[test]
    fn test_stream_spec_defaults() {
        let spec = StreamSpec::default();
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.block_size, 4410);
        assert_eq!(spec.block_duration(), Duration::from_millis(100));
        assert_eq!(spec.block_size_at(48_000), 4800);
    }
}
