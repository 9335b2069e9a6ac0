// In-process volume level, for simulation and tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::VolumeControlError;
use crate::volume::VolumeController;

#[derive(Debug)]
struct Shared {
    level: Mutex<f64>,
    writes: AtomicUsize,
    reinitializations: AtomicUsize,
    pending_failures: AtomicUsize,
}

/// Volume held in memory and observable through a [`SoftwareVolumeHandle`]
#[derive(Debug)]
pub struct SoftwareVolume {
    shared: Arc<Shared>,
}

/// Cloneable view of a [`SoftwareVolume`] from other threads
#[derive(Debug, Clone)]
pub struct SoftwareVolumeHandle {
    shared: Arc<Shared>,
}

impl SoftwareVolume {
    pub fn new(initial: f64) -> Self {
        Self {
            shared: Arc::new(Shared {
                level: Mutex::new(initial.clamp(0.0, 1.0)),
                writes: AtomicUsize::new(0),
                reinitializations: AtomicUsize::new(0),
                pending_failures: AtomicUsize::new(0),
            }),
        }
    }

    pub fn handle(&self) -> SoftwareVolumeHandle {
        SoftwareVolumeHandle {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Default for SoftwareVolume {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl SoftwareVolumeHandle {
    pub fn level(&self) -> f64 {
        *self.shared.level.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Successful `set_volume` calls so far
    pub fn writes(&self) -> usize {
        self.shared.writes.load(Ordering::SeqCst)
    }

    pub fn reinitializations(&self) -> usize {
        self.shared.reinitializations.load(Ordering::SeqCst)
    }

    /// Make the next `count` calls to `set_volume` fail
    pub fn fail_next_writes(&self, count: usize) {
        self.shared.pending_failures.store(count, Ordering::SeqCst);
    }
}

impl VolumeController for SoftwareVolume {
    fn set_volume(&mut self, level: f64) -> Result<(), VolumeControlError> {
        let injected = self
            .shared
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(VolumeControlError::Unavailable {
                reason: "injected software volume failure".to_string(),
            });
        }

        let level = if level.is_finite() { level.clamp(0.0, 1.0) } else { 0.0 };
        *self.shared.level.lock().unwrap_or_else(|e| e.into_inner()) = level;
        self.shared.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_volume(&mut self) -> Result<f64, VolumeControlError> {
        Ok(*self.shared.level.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn reinitialize(&mut self) -> Result<(), VolumeControlError> {
        self.shared.reinitializations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "software"
    }
}
