// Level channel - bounded SPSC queue from the capture thread to the consumer
//
// Built on rtrb so push and pop never lock. An SPSC producer cannot evict
// from the consumer's end, so when the ring is full the sender parks the
// sample in a one-slot hold instead. Each later sample replaces the held
// one (the replaced sample is counted as dropped) until the ring has room
// again. The newest level therefore always reaches the consumer, and what
// gets lost are the levels in between.

use rtrb::{Consumer, Producer, RingBuffer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const DEFAULT_CAPACITY: usize = 256;

/// One (intensity, volume) observation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LevelSample {
    /// Block intensity in dB
    pub intensity: f64,
    /// Volume level in [0, 1]
    pub volume: f64,
}

impl LevelSample {
    pub fn new(intensity: f64, volume: f64) -> Self {
        Self { intensity, volume }
    }
}

impl From<(f64, f64)> for LevelSample {
    fn from((intensity, volume): (f64, f64)) -> Self {
        Self { intensity, volume }
    }
}

impl From<LevelSample> for (f64, f64) {
    fn from(sample: LevelSample) -> Self {
        (sample.intensity, sample.volume)
    }
}

/// Create a bounded level channel (capacity is raised to at least 1)
pub fn level_channel(capacity: usize) -> (LevelSender, LevelReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let dropped = Arc::new(AtomicU64::new(0));
    (
        LevelSender {
            producer,
            held: None,
            dropped: Arc::clone(&dropped),
        },
        LevelReceiver { consumer, dropped },
    )
}

/// Producer half, owned by the capture thread
pub struct LevelSender {
    producer: Producer<LevelSample>,
    /// Newest sample that did not fit yet
    held: Option<LevelSample>,
    dropped: Arc<AtomicU64>,
}

impl LevelSender {
    /// Queue a sample without blocking
    ///
    /// Returns false when the queue was full and the sample was held back
    /// for a later push or [`flush`](Self::flush).
    pub fn push(&mut self, sample: LevelSample) -> bool {
        if !self.flush() {
            self.hold(sample);
            return false;
        }
        match self.producer.push(sample) {
            Ok(()) => true,
            Err(_) => {
                self.hold(sample);
                false
            }
        }
    }

    /// Try to queue the held sample; true when nothing is held any more
    pub fn flush(&mut self) -> bool {
        match self.held.take() {
            None => true,
            Some(sample) => match self.producer.push(sample) {
                Ok(()) => true,
                Err(_) => {
                    self.held = Some(sample);
                    false
                }
            },
        }
    }

    fn hold(&mut self, sample: LevelSample) {
        if self.held.replace(sample).is_some() {
            let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if total.is_power_of_two() {
                tracing::warn!("[LevelChannel] Consumer stalled, {} samples dropped", total);
            }
        }
    }

    /// True once the receiver has been dropped
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Consumer half, polled on the consumer's own schedule
pub struct LevelReceiver {
    consumer: Consumer<LevelSample>,
    dropped: Arc<AtomicU64>,
}

impl LevelReceiver {
    pub fn try_pop(&mut self) -> Option<LevelSample> {
        self.consumer.pop().ok()
    }

    /// Everything queued right now, oldest first
    pub fn drain(&mut self) -> Vec<LevelSample> {
        let mut samples = Vec::with_capacity(self.consumer.slots());
        while let Ok(sample) = self.consumer.pop() {
            samples.push(sample);
        }
        samples
    }

    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }

    /// Samples replaced in the sender's hold while the queue was full
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
