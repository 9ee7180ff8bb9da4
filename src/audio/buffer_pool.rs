// BufferPool - lock-free buffer pool with dual SPSC queues
//
// Object pool built on two rtrb ring buffers so the device callback never
// allocates:
// - DATA_QUEUE: device callback pushes filled buffers, capture worker consumes
// - POOL_QUEUE: capture worker returns drained buffers, device callback recycles
//
// Buffer flow:
// 1. Device callback pops an empty buffer from POOL_QUEUE
// 2. Device callback copies (mono) input samples into it
// 3. Device callback pushes it to DATA_QUEUE
// 4. Capture worker pops it from DATA_QUEUE and feeds the frame assembler
// 5. Capture worker pushes it back to POOL_QUEUE

use rtrb::{Consumer, Producer};

use crate::error::AudioError;

/// Audio buffer type - pre-allocated vector of f32 samples
pub type AudioBuffer = Vec<f32>;

/// Both queue ends, as created by `BufferPool::new`
pub struct BufferPoolChannels {
    pub data_producer: Producer<AudioBuffer>,
    pub data_consumer: Consumer<AudioBuffer>,
    pub pool_producer: Producer<AudioBuffer>,
    pub pool_consumer: Consumer<AudioBuffer>,
}

/// Queue ends owned by the device callback
pub struct DeviceChannels {
    /// Filled buffers out
    pub data_producer: Producer<AudioBuffer>,
    /// Empty buffers in
    pub pool_consumer: Consumer<AudioBuffer>,
}

/// Queue ends owned by the capture worker
pub struct WorkerChannels {
    /// Filled buffers in
    pub data_consumer: Consumer<AudioBuffer>,
    /// Empty buffers out
    pub pool_producer: Producer<AudioBuffer>,
}

impl BufferPoolChannels {
    /// Split into the callback half and the worker half
    pub fn split_for_threads(self) -> (DeviceChannels, WorkerChannels) {
        (
            DeviceChannels {
                data_producer: self.data_producer,
                pool_consumer: self.pool_consumer,
            },
            WorkerChannels {
                data_consumer: self.data_consumer,
                pool_producer: self.pool_producer,
            },
        )
    }
}

/// Lock-free buffer pool using dual SPSC ring buffers
///
/// Pre-allocates a fixed number of audio buffers and manages them through
/// two lock-free queues. All heap allocation happens here, so the device
/// callback side is allocation-free.
pub struct BufferPool;

impl BufferPool {
    /// Create a pool of `buffer_count` buffers with `buffer_size` capacity each
    ///
    /// Buffers start empty (length 0) with their full capacity reserved; the
    /// callback sets the length when it fills them.
    ///
    /// # Errors
    /// `AudioError::InvalidConfig` if either argument is 0
    #[allow(clippy::new_ret_no_self)]
    pub fn new(buffer_count: usize, buffer_size: usize) -> Result<BufferPoolChannels, AudioError> {
        if buffer_count == 0 || buffer_size == 0 {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "buffer pool needs at least one buffer of one sample (got {} x {})",
                    buffer_count, buffer_size
                ),
            });
        }

        let (mut pool_producer, pool_consumer) = rtrb::RingBuffer::new(buffer_count);
        let (data_producer, data_consumer) = rtrb::RingBuffer::new(buffer_count);

        for _ in 0..buffer_count {
            let buffer: AudioBuffer = Vec::with_capacity(buffer_size);
            pool_producer
                .push(buffer)
                .map_err(|_| AudioError::InvalidConfig {
                    reason: "pool queue rejected a pre-allocated buffer".to_string(),
                })?;
        }

        Ok(BufferPoolChannels {
            data_producer,
            data_consumer,
            pool_producer,
            pool_consumer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_pool_creation() {
        let mut channels = BufferPool::new(16, 2048).unwrap();

        let mut available_buffers = 0;
        while channels.pool_consumer.pop().is_ok() {
            available_buffers += 1;
        }
        assert_eq!(available_buffers, 16, "Expected 16 buffers in pool queue");
        assert!(
            channels.data_consumer.pop().is_err(),
            "Data queue should be empty initially"
        );
    }

    #[test]
    fn test_buffers_reserve_capacity() {
        let mut channels = BufferPool::new(1, 512).unwrap();
        let buffer = channels.pool_consumer.pop().unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.capacity() >= 512);
    }

    #[test]
    fn test_split_circulation() {
        let (mut device, mut worker) = BufferPool::new(2, 256).unwrap().split_for_threads();

        let mut buffer = device.pool_consumer.pop().unwrap();
        buffer.extend_from_slice(&[0.25, -0.25]);
        device.data_producer.push(buffer).unwrap();

        let buffer = worker.data_consumer.pop().unwrap();
        assert_eq!(buffer, vec![0.25, -0.25]);
        worker.pool_producer.push(buffer).unwrap();

        // Both buffers are available to the device side again
        assert!(device.pool_consumer.pop().is_ok());
        assert!(device.pool_consumer.pop().is_ok());
        assert!(device.pool_consumer.pop().is_err());
    }

    #[test]
    fn test_send() {
        fn assert_send<T: Send>() {}
        assert_send::<DeviceChannels>();
        assert_send::<WorkerChannels>();
    }

    #[test]
    fn test_zero_sizes_rejected() {
        assert!(matches!(
            BufferPool::new(0, 1024),
            Err(AudioError::InvalidConfig { .. })
        ));
        assert!(matches!(
            BufferPool::new(16, 0),
            Err(AudioError::InvalidConfig { .. })
        ));
    }
}
