// WAV file replay through hound

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::audio::{AudioBlock, AudioCaptureSource, StreamSpec};
use crate::error::AudioCaptureError;

/// Replays a WAV file as fixed-duration mono blocks
///
/// The file's own sample rate is kept; the block size is rescaled so each
/// block still covers the configured duration. Integer formats are
/// normalised to [-1, 1]. Once the file is exhausted `next_block` idles
/// until its timeout and returns `Ok(None)`.
pub struct WavSource {
    path: PathBuf,
    samples: Vec<f32>,
    sample_rate: u32,
    block_size: usize,
    cursor: usize,
    realtime: bool,
    started_at: Option<Instant>,
    blocks_emitted: u32,
}

impl WavSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            samples: Vec::new(),
            sample_rate: 0,
            block_size: 0,
            cursor: 0,
            realtime: false,
            started_at: None,
            blocks_emitted: 0,
        }
    }

    /// Pace blocks to wall-clock time
    pub fn realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Playing time of a WAV file without decoding it
    pub fn duration_of<P: AsRef<Path>>(path: P) -> Result<Duration, AudioCaptureError> {
        let reader = hound::WavReader::open(path.as_ref()).map_err(|e| open_failed(path.as_ref(), e))?;
        let spec = reader.spec();
        Ok(Duration::from_secs_f64(
            reader.duration() as f64 / spec.sample_rate.max(1) as f64,
        ))
    }

    pub fn is_finished(&self) -> bool {
        !self.samples.is_empty() && self.cursor >= self.samples.len()
    }

    fn decode(path: &Path) -> Result<(Vec<f32>, u32), AudioCaptureError> {
        let mut reader = hound::WavReader::open(path).map_err(|e| open_failed(path, e))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| read_failed(path, e))?,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(AudioCaptureError::UnsupportedFormat {
                        format: format!("{}-bit integer PCM", spec.bits_per_sample),
                    });
                }
                let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| read_failed(path, e))?
            }
        };

        let mono = interleaved.chunks(channels).map(|frame| frame[0]).collect();
        Ok((mono, spec.sample_rate))
    }
}

fn open_failed(path: &Path, err: hound::Error) -> AudioCaptureError {
    match err {
        hound::Error::IoError(e) => AudioCaptureError::DeviceUnavailable {
            reason: format!("{}: {}", path.display(), e),
        },
        other => AudioCaptureError::UnsupportedFormat {
            format: format!("{}: {}", path.display(), other),
        },
    }
}

fn read_failed(path: &Path, err: hound::Error) -> AudioCaptureError {
    AudioCaptureError::StreamFailure {
        reason: format!("{}: {}", path.display(), err),
    }
}

impl AudioCaptureSource for WavSource {
    fn open(&mut self, spec: &StreamSpec) -> Result<(), AudioCaptureError> {
        let (samples, sample_rate) = Self::decode(&self.path)?;
        self.block_size = spec.block_size_at(sample_rate);
        self.sample_rate = sample_rate;
        self.samples = samples;
        self.cursor = 0;
        tracing::info!(
            "[WavSource] Loaded {} ({} samples at {} Hz)",
            self.path.display(),
            self.samples.len(),
            self.sample_rate
        );
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        self.started_at = Some(Instant::now());
        self.blocks_emitted = 0;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioCaptureError> {
        self.started_at = None;
        Ok(())
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<AudioBlock>, AudioCaptureError> {
        let Some(started_at) = self.started_at else {
            return Err(AudioCaptureError::StreamFailure {
                reason: "source is not running".to_string(),
            });
        };

        if self.cursor >= self.samples.len() {
            std::thread::sleep(timeout);
            return Ok(None);
        }

        if self.realtime {
            let block_duration =
                Duration::from_secs_f64(self.block_size as f64 / self.sample_rate.max(1) as f64);
            let due = started_at + block_duration * (self.blocks_emitted + 1);
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

        let end = (self.cursor + self.block_size).min(self.samples.len());
        let block = AudioBlock::new(self.samples[self.cursor..end].to_vec(), self.sample_rate);
        self.cursor = end;
        self.blocks_emitted += 1;
        Ok(Some(block))
    }

    fn name(&self) -> &str {
        "wav"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in frames {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_replays_first_channel_in_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        // 1200 stereo frames: left = 16384 (0.5), right = -32768
        let frames: Vec<i16> = (0..1200).flat_map(|_| [16384i16, i16::MIN]).collect();
        write_wav(&path, 2, &frames);

        let mut source = WavSource::new(&path);
        source.open(&StreamSpec::default()).unwrap();
        source.start().unwrap();

        // 100 ms at 8 kHz
        let first = source.next_block(Duration::ZERO).unwrap().unwrap();
        assert_eq!(first.len(), 800);
        assert_eq!(first.sample_rate(), 8000);
        assert!(first.samples().iter().all(|&s| (s - 0.5).abs() < 1e-6));

        let tail = source.next_block(Duration::ZERO).unwrap().unwrap();
        assert_eq!(tail.len(), 400);
        assert!(source.is_finished());
        assert_eq!(source.next_block(Duration::from_millis(1)).unwrap(), None);
    }

    #[test]
    fn test_duration_of() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &vec![0i16; 4000]);
        assert_eq!(WavSource::duration_of(&path).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_missing_file_is_device_unavailable() {
        let mut source = WavSource::new("/nonexistent/voice.wav");
        match source.open(&StreamSpec::default()) {
            Err(AudioCaptureError::DeviceUnavailable { .. }) => {}
            other => panic!("Expected DeviceUnavailable, got {:?}", other),
        }
    }
}
