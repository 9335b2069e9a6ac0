//! Moving-average volume damper.

use std::collections::VecDeque;

pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Fixed-capacity FIFO window of recent volumes; `smooth` returns its mean.
///
/// A single-block spike moves the output by at most `spike / capacity`.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    window: VecDeque<f64>,
    capacity: usize,
}

impl SmoothingFilter {
    /// Create a filter holding `capacity` values (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push `volume` and return the mean of the window.
    ///
    /// Non-finite input is recorded as 0.
    pub fn smooth(&mut self, volume: f64) -> f64 {
        let volume = if volume.is_finite() { volume } else { 0.0 };
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(volume);

        self.window.iter().sum::<f64>() / self.window.len() as f64
    }

    /// Drop all history
    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Values currently held, oldest first
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}
