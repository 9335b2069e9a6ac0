//! Consumer side of the level channel.
//!
//! A [`LevelMonitor`] is ticked on the consumer's own schedule (the CLI uses
//! a 100 ms interval). Each tick drains whatever the capture thread queued
//! since the last one and never blocks.

use std::collections::VecDeque;

use crate::channel::{LevelReceiver, LevelSample};

pub const DEFAULT_HISTORY: usize = 100;

/// Latest reading plus a bounded history for display
#[derive(Debug, Clone)]
pub struct LevelMonitor {
    history: VecDeque<LevelSample>,
    capacity: usize,
    latest: Option<LevelSample>,
    received: u64,
}

impl LevelMonitor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            latest: None,
            received: 0,
        }
    }

    /// Drain the channel; returns how many samples arrived
    pub fn tick(&mut self, receiver: &mut LevelReceiver) -> usize {
        let mut count = 0;
        while let Some(sample) = receiver.try_pop() {
            self.record(sample);
            count += 1;
        }
        count
    }

    pub fn record(&mut self, sample: LevelSample) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(sample);
        self.latest = Some(sample);
        self.received += 1;
    }

    pub fn latest(&self) -> Option<LevelSample> {
        self.latest
    }

    /// Latest volume as a percentage
    pub fn volume_percent(&self) -> f64 {
        self.latest.map_or(0.0, |s| s.volume * 100.0)
    }

    /// Latest intensity clamped to a 0-100 meter
    pub fn intensity_meter(&self) -> f64 {
        self.latest
            .map_or(0.0, |s| if s.intensity.is_finite() { s.intensity.clamp(0.0, 100.0) } else { 0.0 })
    }

    pub fn intensity_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|s| s.intensity)
    }

    pub fn volume_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().map(|s| s.volume)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Samples seen since creation
    pub fn received(&self) -> u64 {
        self.received
    }

    /// One status line for the latest reading
    pub fn status_line(&self) -> Option<String> {
        self.latest.map(|s| {
            format!(
                "Intensity: {:.2} dB, Volume: {:.2}%",
                s.intensity,
                s.volume * 100.0
            )
        })
    }
}

impl Default for LevelMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY)
    }
}
