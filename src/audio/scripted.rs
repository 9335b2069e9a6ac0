// Scripted capture source for deterministic supervisor tests
//
// All clones share one script and one set of counters, so a factory that
// hands out clones lets the script carry on across restarts.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::audio::{AudioBlock, AudioCaptureSource, CaptureSourceFactory, StreamSpec};
use crate::error::AudioCaptureError;

/// Longest a drained script waits inside `next_block`
const IDLE_POLL: Duration = Duration::from_millis(5);

/// One scripted reply to `next_block`
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Block(AudioBlock),
    Fail(AudioCaptureError),
    /// Sleep, then return `Ok(None)`
    Idle(Duration),
}

#[derive(Default)]
struct Shared {
    steps: Mutex<VecDeque<ScriptStep>>,
    /// Pending forced failures of `open()`
    open_failures: AtomicUsize,
    opens: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    blocks_served: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    shared: Arc<Shared>,
    running: bool,
}

impl ScriptedSource {
    pub fn new<I: IntoIterator<Item = ScriptStep>>(steps: I) -> Self {
        let source = Self::default();
        source.extend(steps);
        source
    }

    /// Append steps; visible to every clone
    pub fn extend<I: IntoIterator<Item = ScriptStep>>(&self, steps: I) {
        self.lock_steps().extend(steps);
    }

    pub fn push(&self, step: ScriptStep) {
        self.lock_steps().push_back(step);
    }

    /// Make the next `count` calls to `open()` fail
    pub fn fail_next_opens(&self, count: usize) {
        self.shared.open_failures.store(count, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> usize {
        self.lock_steps().len()
    }

    pub fn opens(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn starts(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.shared.stops.load(Ordering::SeqCst)
    }

    pub fn blocks_served(&self) -> usize {
        self.shared.blocks_served.load(Ordering::SeqCst)
    }

    /// Factory producing clones that share this script
    pub fn factory(&self) -> impl CaptureSourceFactory + 'static {
        let template = self.clone();
        move || -> Result<Box<dyn AudioCaptureSource>, AudioCaptureError> {
            let mut source = template.clone();
            source.running = false;
            Ok(Box::new(source))
        }
    }

    fn lock_steps(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptStep>> {
        self.shared.steps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AudioCaptureSource for ScriptedSource {
    fn open(&mut self, _spec: &StreamSpec) -> Result<(), AudioCaptureError> {
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        let forced = self
            .shared
            .open_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced {
            return Err(AudioCaptureError::DeviceUnavailable {
                reason: "scripted open failure".to_string(),
            });
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioCaptureError> {
        self.shared.starts.fetch_add(1, Ordering::SeqCst);
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioCaptureError> {
        if self.running {
            self.shared.stops.fetch_add(1, Ordering::SeqCst);
        }
        self.running = false;
        Ok(())
    }

    fn next_block(&mut self, timeout: Duration) -> Result<Option<AudioBlock>, AudioCaptureError> {
        let step = self.lock_steps().pop_front();
        match step {
            Some(ScriptStep::Block(block)) => {
                self.shared.blocks_served.fetch_add(1, Ordering::SeqCst);
                Ok(Some(block))
            }
            Some(ScriptStep::Fail(err)) => Err(err),
            Some(ScriptStep::Idle(pause)) => {
                std::thread::sleep(pause);
                Ok(None)
            }
            None => {
                std::thread::sleep(timeout.min(IDLE_POLL));
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
