// Microphone capture through cpal
//
// The input callback only copies the first channel into pooled buffers; the
// capture thread assembles them into fixed-size blocks in `next_block`.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::audio::buffer_pool::{BufferPool, CallbackChannels, ReaderChannels, DEFAULT_BUFFER_COUNT};
use crate::audio::{AudioBlock, AudioCaptureSource, CaptureStatus, StreamSpec};
use crate::error::AudioCaptureError;

/// Default input device capture source
pub struct CpalSource {
    stream: Option<cpal::Stream>,
    reader: Option<ReaderChannels>,
    accumulator: Vec<f32>,
    block_size: usize,
    sample_rate: u32,
    /// Frames the callback could not queue
    overflows: Arc<AtomicU64>,
    reported_overflows: u64,
    /// First stream error since the last `next_block`
    stream_error: Arc<Mutex<Option<String>>>,
}

impl CpalSource {
    pub fn new() -> Self {
        Self {
            stream: None,
            reader: None,
            accumulator: Vec::new(),
            block_size: 0,
            sample_rate: 0,
            overflows: Arc::new(AtomicU64::new(0)),
            reported_overflows: 0,
            stream_error: Arc::new(Mutex::new(None)),
        }
    }

    fn build_stream(
        &self,
        device: &cpal::Device,
        supported: cpal::SupportedStreamConfig,
        callback: CallbackChannels,
    ) -> Result<cpal::Stream, AudioCaptureError> {
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;

        let latch = Arc::clone(&self.stream_error);
        let err_fn = move |err: cpal::StreamError| {
            tracing::error!("[CpalSource] Input stream error: {}", err);
            let mut slot = latch.lock().unwrap_or_else(|e| e.into_inner());
            slot.get_or_insert_with(|| err.to_string());
        };

        let result = match sample_format {
            cpal::SampleFormat::F32 => {
                let mut callback = callback;
                let overflows = Arc::clone(&self.overflows);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let lost = callback.push_first_channel(data, channels, |s| s);
                        if lost > 0 {
                            overflows.fetch_add(lost as u64, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let mut callback = callback;
                let overflows = Arc::clone(&self.overflows);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let lost = callback.push_first_channel(data, channels, |s| s as f32 / 32768.0);
                        if lost > 0 {
                            overflows.fetch_add(lost as u64, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::U16 => {
                let mut callback = callback;
                let overflows = Arc::clone(&self.overflows);
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        let convert = |s: u16| (s as f32 - 32768.0) / 32768.0;
                        let lost = callback.push_first_channel(data, channels, convert);
                        if lost > 0 {
                            overflows.fetch_add(lost as u64, Ordering::Relaxed);
                        }
                    },
                    err_fn,
                    None,
                )
            }
            other => {
                return Err(AudioCaptureError::UnsupportedFormat {
                    format: format!("{:?}", other),
                })
            }
        };

        result.map_err(|e| AudioCaptureError::StreamOpenFailed {
            reason: e.to_string(),
        })
    }

    fn take_stream_error(&self) -> Option<String> {
        self.stream_error
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    fn pending_status(&mut self) -> Option<CaptureStatus> {
        let total = self.overflows.load(Ordering::Relaxed);
        if total > self.reported_overflows {
            let lost_frames = total - self.reported_overflows;
            self.reported_overflows = total;
            Some(CaptureStatus::InputOverflow { lost_frames })
        } else {
            None
        }
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCaptureSource for CpalSource {
    fn open(&mut self, spec: &StreamSpec) -> Result<(), AudioCaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioCaptureError::DeviceUnavailable {
                reason: "No default input device found".to_string(),
            })?;

        let supported = device
            .default_input_config()
            .map_err(|e| AudioCaptureError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {}", e),
            })?;

        // The device's own rate wins; keep the block duration constant
        self.sample_rate = supported.sample_rate().0;
        self.block_size = spec.block_size_at(self.sample_rate);
        if self.sample_rate != spec.sample_rate {
            tracing::info!(
                "[CpalSource] Device runs at {} Hz (requested {}), block size {}",
                self.sample_rate,
                spec.sample_rate,
                self.block_size
            );
        }

        let buffer_size = self.block_size.max(1024);
        let (callback, reader) = BufferPool::new(DEFAULT_BUFFER_COUNT, buffer_size).split();
        let stream = self.build_stream(&device, supported, callback)?;

        self.accumulator = Vec::with_capacity(self.block_size * 2);
        self.reader = Some(reader);
        self.stream = Some(stream);
        self.take_stream_error();
        tracing::info!(
            "[CpalSource] Opened input device {}",
            device.name().unwrap_or_else(|_| "<unknown>".to_string())
        );
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| AudioCaptureError::StreamOpenFailed {
                reason: "start() called before open()".to_string(),
            })?;
        stream
            .play()
            .map_err(|e| AudioCaptureError::StreamOpenFailed {
                reason: format!("Input start failed: {}", e),
            })
    }

    fn stop(&mut self) -> Result<(), AudioCaptureError> {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                tracing::debug!("[CpalSource] pause() on stop failed: {}", e);
            }
        }
        self.reader = None;
        self.accumulator.clear();
        Ok(())
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<AudioBlock>, AudioCaptureError> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(reason) = self.take_stream_error() {
                return Err(AudioCaptureError::StreamFailure { reason });
            }

            let reader = self
                .reader
                .as_mut()
                .ok_or_else(|| AudioCaptureError::StreamFailure {
                    reason: "stream is not open".to_string(),
                })?;

            while let Ok(buffer) = reader.data_consumer.pop() {
                self.accumulator.extend_from_slice(&buffer);
                if reader.pool_producer.push(buffer).is_err() {
                    tracing::warn!("[CpalSource] Pool queue full, dropping buffer");
                }
            }

            if self.accumulator.len() >= self.block_size {
                let samples: Vec<f32> = self.accumulator.drain(..self.block_size).collect();
                let mut block = AudioBlock::new(samples, self.sample_rate);
                if let Some(status) = self.pending_status() {
                    block = block.with_status(status);
                }
                return Ok(Some(block));
            }

            if Instant::now() >= deadline {
                return Ok(None);
            }
            // Small sleep to avoid busy loop when empty
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
