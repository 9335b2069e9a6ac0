// BufferPool - lock-free buffer pool with dual SPSC queues
//
// Sits between the realtime input callback and the capture thread so the
// callback never allocates or locks.
//
// - DATA_QUEUE: callback pushes filled buffers, capture thread consumes
// - POOL_QUEUE: capture thread returns empty buffers, callback recycles
//
// Buffer flow:
// 1. Callback pops an empty buffer from POOL_QUEUE (none left = overflow)
// 2. Callback copies the first input channel into it, taking more buffers
//    when the callback is longer than one
// 3. Callback pushes it to DATA_QUEUE
// 4. Capture thread pops it, appends to its block accumulator
// 5. Capture thread pushes it back to POOL_QUEUE

use rtrb::{Consumer, Producer};

pub const DEFAULT_BUFFER_COUNT: usize = 16;
pub const DEFAULT_BUFFER_SIZE: usize = 2048;

/// Pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Ends used inside the realtime input callback
pub struct CallbackChannels {
    pub pool_consumer: Consumer<AudioBuffer>,
    pub data_producer: Producer<AudioBuffer>,
}

/// Ends used on the capture thread
pub struct ReaderChannels {
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
}

/// Both queues, before they are handed to their threads
pub struct BufferPoolChannels {
    pub callback: CallbackChannels,
    pub reader: ReaderChannels,
}

impl BufferPoolChannels {
    pub fn split(self) -> (CallbackChannels, ReaderChannels) {
        (self.callback, self.reader)
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// All heap allocation happens in [`BufferPool::new`]. Zero counts or sizes
/// are raised to 1.
pub struct BufferPool;

impl BufferPool {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> BufferPoolChannels {
        let buffer_count = buffer_count.max(1);
        let buffer_size = buffer_size.max(1);

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            if pool_producer.push(Vec::with_capacity(buffer_size)).is_err() {
                break;
            }
        }

        BufferPoolChannels {
            callback: CallbackChannels {
                pool_consumer,
                data_producer,
            },
            reader: ReaderChannels {
                data_consumer,
                pool_producer,
            },
        }
    }
}

impl CallbackChannels {
    /// Copy the first channel of interleaved `data` into pooled buffers
    ///
    /// A callback longer than one buffer is spread over as many buffers as
    /// it needs. Returns the number of frames that could not be queued
    /// because the pool ran dry (input overflow).
    pub fn push_first_channel<T, F>(&mut self, data: &[T], channels: usize, convert: F) -> usize
    where
        T: Copy,
        F: Fn(T) -> f32,
    {
        let channels = channels.max(1);
        let mut frames = data
            .chunks(channels)
            .filter_map(|frame| frame.first().copied())
            .peekable();
        let mut lost = 0;

        while frames.peek().is_some() {
            let Ok(mut buffer) = self.pool_consumer.pop() else {
                lost += frames.by_ref().count();
                break;
            };
            buffer.clear();
            let limit = buffer.capacity().max(1);
            buffer.extend(frames.by_ref().take(limit).map(&convert));
            let queued = buffer.len();
            if self.data_producer.push(buffer).is_err() {
                lost += queued;
            }
        }
        lost
    }
}
