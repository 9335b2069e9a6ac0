// Volume strategy that talks to the system mixer from its own thread
//
// The capture thread only writes the newest level into a slot and returns.
// A `volume-<name>` thread owns the backend, created there so it need not
// be `Send`, and applies whatever level is latest. Levels that arrive while
// the backend is busy are coalesced. Backend errors are latched and handed
// back by the next `set_volume`, which sends the supervisor into recovery.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::VolumeControlError;
use crate::volume::VolumeController;

/// Longest `get_volume` / `reinitialize` wait for the mixer thread
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// A system mixer as seen from the mixer thread
pub trait MixerBackend {
    fn apply(&mut self, level: f64) -> Result<(), VolumeControlError>;

    fn read(&mut self) -> Result<f64, VolumeControlError>;
}

#[derive(Default)]
struct Slot {
    pending: Option<f64>,
    reopen_requested: bool,
    shutdown: bool,
    /// Completed backend opens, the initial one included
    opens: u64,
    /// Last level read from or applied to the backend
    level: f64,
    error: Option<VolumeControlError>,
}

struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// [`VolumeController`] whose `set_volume` never waits on the backend
pub struct DeferredVolume {
    name: String,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl DeferredVolume {
    /// Start the mixer thread; `open` runs on it now and on every reinitialize
    pub fn spawn<F, B>(name: &str, open: F) -> Result<Self, VolumeControlError>
    where
        F: FnMut() -> Result<B, VolumeControlError> + Send + 'static,
        B: MixerBackend + 'static,
    {
        let shared = Arc::new(Shared {
            slot: Mutex::new(Slot::default()),
            wake: Condvar::new(),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("volume-{}", name))
                .spawn(move || mixer_loop(&shared, open))?
        };

        Ok(Self {
            name: name.to_string(),
            shared,
            worker: Some(worker),
        })
    }

    /// Wait until the backend has been opened `count` times
    fn wait_for_opens(&self, count: u64) -> Result<MutexGuard<'_, Slot>, VolumeControlError> {
        let guard = self.shared.lock();
        let (guard, wait) = self
            .shared
            .wake
            .wait_timeout_while(guard, REPLY_TIMEOUT, |slot| slot.opens < count)
            .unwrap_or_else(|e| e.into_inner());
        if wait.timed_out() {
            return Err(VolumeControlError::Unavailable {
                reason: format!("{} mixer did not answer within {:?}", self.name, REPLY_TIMEOUT),
            });
        }
        Ok(guard)
    }
}

impl VolumeController for DeferredVolume {
    fn set_volume(&mut self, level: f64) -> Result<(), VolumeControlError> {
        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        {
            let mut slot = self.shared.lock();
            if let Some(err) = slot.error.take() {
                return Err(err);
            }
            slot.pending = Some(level);
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    fn get_volume(&mut self) -> Result<f64, VolumeControlError> {
        let slot = self.wait_for_opens(1)?;
        match &slot.error {
            Some(err) => Err(err.clone()),
            None => Ok(slot.pending.unwrap_or(slot.level)),
        }
    }

    fn reinitialize(&mut self) -> Result<(), VolumeControlError> {
        let target = {
            let mut slot = self.shared.lock();
            slot.error = None;
            slot.reopen_requested = true;
            slot.opens + 1
        };
        self.shared.wake.notify_all();

        let mut slot = self.wait_for_opens(target)?;
        slot.error.take().map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for DeferredVolume {
    fn drop(&mut self) {
        self.shared.lock().shutdown = true;
        self.shared.wake.notify_all();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn mixer_loop<F, B>(shared: &Shared, mut open: F)
where
    F: FnMut() -> Result<B, VolumeControlError>,
    B: MixerBackend,
{
    let mut backend = open_backend(shared, &mut open);

    loop {
        let (level, reopen) = {
            let guard = shared.lock();
            let mut slot = shared
                .wake
                .wait_while(guard, |s| s.pending.is_none() && !s.reopen_requested && !s.shutdown)
                .unwrap_or_else(|e| e.into_inner());
            if slot.shutdown {
                return;
            }
            (slot.pending.take(), std::mem::take(&mut slot.reopen_requested))
        };

        if reopen {
            drop(backend.take());
            backend = open_backend(shared, &mut open);
        }

        if let Some(level) = level {
            let result = match backend.as_mut() {
                Some(backend) => backend.apply(level),
                None => Err(VolumeControlError::Unavailable {
                    reason: "mixer is not open".to_string(),
                }),
            };
            let mut slot = shared.lock();
            match result {
                Ok(()) => slot.level = level,
                Err(err) => {
                    tracing::warn!("[DeferredVolume] Failed to apply {:.3}: {}", level, err);
                    slot.error.get_or_insert(err);
                }
            }
        }
    }
}

fn open_backend<F, B>(shared: &Shared, open: &mut F) -> Option<B>
where
    F: FnMut() -> Result<B, VolumeControlError>,
    B: MixerBackend,
{
    let opened = open().and_then(|mut backend| {
        let level = backend.read()?;
        Ok((backend, level))
    });

    let mut slot = shared.lock();
    slot.opens += 1;
    let backend = match opened {
        Ok((backend, level)) => {
            slot.level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
            slot.error = None;
            Some(backend)
        }
        Err(err) => {
            tracing::warn!("[DeferredVolume] Could not open mixer: {}", err);
            slot.error = Some(err);
            None
        }
    };
    drop(slot);
    shared.wake.notify_all();
    backend
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Clone, Default)]
    struct Recorder {
        applied: Arc<Mutex<Vec<f64>>>,
        opens: Arc<AtomicUsize>,
        failing_applies: Arc<AtomicUsize>,
        failing_opens: Arc<AtomicUsize>,
    }

    impl Recorder {
        fn applied(&self) -> Vec<f64> {
            self.applied.lock().unwrap().clone()
        }

        fn open(&self, delay: Duration) -> impl FnMut() -> Result<SlowMixer, VolumeControlError> {
            let recorder = self.clone();
            move || {
                recorder.opens.fetch_add(1, Ordering::SeqCst);
                if take_one(&recorder.failing_opens) {
                    return Err(VolumeControlError::Unavailable {
                        reason: "no mixer".to_string(),
                    });
                }
                Ok(SlowMixer {
                    recorder: recorder.clone(),
                    delay,
                    level: 0.4,
                })
            }
        }
    }

    fn take_one(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    struct SlowMixer {
        recorder: Recorder,
        delay: Duration,
        level: f64,
    }

    impl MixerBackend for SlowMixer {
        fn apply(&mut self, level: f64) -> Result<(), VolumeControlError> {
            std::thread::sleep(self.delay);
            if take_one(&self.recorder.failing_applies) {
                return Err(VolumeControlError::CommandFailed {
                    command: "slow".to_string(),
                    reason: "device busy".to_string(),
                });
            }
            self.level = level;
            self.recorder.applied.lock().unwrap().push(level);
            Ok(())
        }

        fn read(&mut self) -> Result<f64, VolumeControlError> {
            Ok(self.level)
        }
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_set_volume_does_not_wait_for_slow_mixer() {
        let recorder = Recorder::default();
        let mut volume =
            DeferredVolume::spawn("slow", recorder.open(Duration::from_millis(150))).unwrap();
        assert_eq!(volume.get_volume().unwrap(), 0.4);

        let started = Instant::now();
        for level in [0.1, 0.2, 0.3, 0.4, 0.5] {
            volume.set_volume(level).unwrap();
        }
        assert!(started.elapsed() < Duration::from_millis(50));

        // Intermediate levels are coalesced; the newest always lands
        assert!(wait_until(|| recorder.applied().last() == Some(&0.5)));
        assert!(recorder.applied().len() <= 2);
        assert_eq!(volume.get_volume().unwrap(), 0.5);
    }

    #[test]
    fn test_apply_failure_is_latched_then_reopened() {
        let recorder = Recorder::default();
        recorder.failing_applies.store(1, Ordering::SeqCst);
        let mut volume = DeferredVolume::spawn("flaky", recorder.open(Duration::ZERO)).unwrap();

        volume.set_volume(0.3).unwrap();
        assert!(wait_until(|| volume.get_volume().is_err()));
        match volume.set_volume(0.6) {
            Err(VolumeControlError::CommandFailed { .. }) => {}
            other => panic!("Expected latched CommandFailed, got {:?}", other),
        }

        volume.reinitialize().unwrap();
        assert_eq!(recorder.opens.load(Ordering::SeqCst), 2);
        volume.set_volume(0.6).unwrap();
        assert!(wait_until(|| recorder.applied() == vec![0.6]));
    }

    #[test]
    fn test_open_failure_surfaces_on_every_call() {
        let recorder = Recorder::default();
        recorder.failing_opens.store(2, Ordering::SeqCst);
        let mut volume = DeferredVolume::spawn("absent", recorder.open(Duration::ZERO)).unwrap();

        assert!(volume.get_volume().is_err());
        assert!(volume.set_volume(0.5).is_err());
        assert!(volume.reinitialize().is_err());

        // Third open succeeds
        volume.reinitialize().unwrap();
        assert_eq!(volume.get_volume().unwrap(), 0.4);
        assert_eq!(volume.name(), "absent");
    }
}
