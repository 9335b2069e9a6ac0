// Deterministic signal generator for running the pipeline without hardware

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::audio::{AudioBlock, AudioCaptureSource, StreamSpec};
use crate::error::AudioCaptureError;

pub const DEFAULT_SEED: u64 = 0x5eed_a0d10;

/// What the synthetic source plays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    Silence,
    /// Sine tone at a fixed amplitude
    Tone { frequency: f32, amplitude: f32 },
    /// Sine tone plus uniform noise
    NoisyTone {
        frequency: f32,
        amplitude: f32,
        noise: f32,
    },
    /// Tone whose amplitude ramps linearly from `from` to `to` over
    /// `period`, then repeats
    Ramp {
        frequency: f32,
        from: f32,
        to: f32,
        period: Duration,
    },
}

impl SignalPattern {
    fn amplitude_at(&self, t: f32) -> f32 {
        match *self {
            SignalPattern::Silence => 0.0,
            SignalPattern::Tone { amplitude, .. } | SignalPattern::NoisyTone { amplitude, .. } => {
                amplitude
            }
            SignalPattern::Ramp {
                from, to, period, ..
            } => {
                let period = period.as_secs_f32().max(f32::EPSILON);
                let phase = (t % period) / period;
                from + (to - from) * phase
            }
        }
    }

    fn frequency(&self) -> f32 {
        match *self {
            SignalPattern::Silence => 0.0,
            SignalPattern::Tone { frequency, .. }
            | SignalPattern::NoisyTone { frequency, .. }
            | SignalPattern::Ramp { frequency, .. } => frequency,
        }
    }

    fn noise(&self) -> f32 {
        match *self {
            SignalPattern::NoisyTone { noise, .. } => noise,
            _ => 0.0,
        }
    }
}

/// Generates blocks from a [`SignalPattern`]
///
/// With `realtime` set, blocks are paced to wall-clock time like a device
/// would deliver them; otherwise every `next_block` returns immediately.
pub struct SyntheticSource {
    pattern: SignalPattern,
    realtime: bool,
    rng: StdRng,
    spec: Option<StreamSpec>,
    position: u64,
    started_at: Option<Instant>,
    blocks_emitted: u64,
}

impl SyntheticSource {
    pub fn new(pattern: SignalPattern) -> Self {
        Self::with_seed(pattern, DEFAULT_SEED)
    }

    pub fn with_seed(pattern: SignalPattern, seed: u64) -> Self {
        Self {
            pattern,
            realtime: false,
            rng: StdRng::seed_from_u64(seed),
            spec: None,
            position: 0,
            started_at: None,
            blocks_emitted: 0,
        }
    }

    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    fn generate(&mut self, spec: &StreamSpec) -> Vec<f32> {
        let rate = spec.sample_rate as f32;
        let frequency = self.pattern.frequency();
        let noise = self.pattern.noise();
        let mut samples = Vec::with_capacity(spec.block_size);

        for _ in 0..spec.block_size {
            let t = self.position as f32 / rate;
            let amplitude = self.pattern.amplitude_at(t);
            let mut value = amplitude * (TAU * frequency * t).sin();
            if noise > 0.0 {
                value += self.rng.gen_range(-noise..=noise);
            }
            samples.push(value.clamp(-1.0, 1.0));
            self.position += 1;
        }
        samples
    }
}

impl AudioCaptureSource for SyntheticSource {
    fn open(&mut self, spec: &StreamSpec) -> Result<(), AudioCaptureError> {
        self.spec = Some(*spec);
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        if self.spec.is_none() {
            return Err(AudioCaptureError::StreamOpenFailed {
                reason: "start() called before open()".to_string(),
            });
        }
        self.started_at = Some(Instant::now());
        self.blocks_emitted = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioCaptureError> {
        self.started_at = None;
        Ok(())
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<AudioBlock>, AudioCaptureError> {
        let (Some(spec), Some(started_at)) = (self.spec, self.started_at) else {
            return Err(AudioCaptureError::StreamFailure {
                reason: "source is not running".to_string(),
            });
        };

        if self.realtime {
            let due = started_at + spec.block_duration() * (self.blocks_emitted as u32 + 1);
            let now = Instant::now();
            if due > now {
                let wait = due - now;
                if wait > timeout {
                    std::thread::sleep(timeout);
                    return Ok(None);
                }
                std::thread::sleep(wait);
            }
        }

        let samples = self.generate(&spec);
        self.blocks_emitted += 1;
        Ok(Some(AudioBlock::new(samples, spec.sample_rate)))
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
