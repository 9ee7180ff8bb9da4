//! Capture contract shared by the microphone, WAV and synthetic sources.

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Frame geometry requested from a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    /// Samples per analysis frame
    pub buffer_size: usize,
    /// Samples between the starts of consecutive frames
    pub hop_size: usize,
    /// Pre-allocated buffers between a device callback and the reader
    pub buffer_pool_size: usize,
    pub open_timeout_ms: u64,
}

impl From<&AudioConfig> for CaptureConfig {
    fn from(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
            hop_size: config.hop_size,
            buffer_pool_size: config.buffer_pool_size,
            open_timeout_ms: config.open_timeout_ms,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&AudioConfig::default())
    }
}

/// Outcome of a `next_frame` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame slice holds a complete new frame
    Filled,
    /// Not enough samples yet; try again shortly
    NotReady,
    /// The source has no more audio
    Finished,
}

/// A continuous stream of fixed-size mono frames
///
/// Sources are opened and read on the capture thread; they need not be `Send`.
pub trait SampleSource {
    /// Acquire the underlying device or file
    fn open(&mut self, config: &CaptureConfig) -> Result<(), AudioError>;

    /// Copy the next frame into `frame` (length = `buffer_size`)
    fn next_frame(&mut self, frame: &mut [f32]) -> Result<FrameStatus, AudioError>;

    /// Release the device. Calling it more than once is harmless.
    fn close(&mut self) -> Result<(), AudioError>;

    /// Rate of the samples this source delivers
    fn sample_rate(&self) -> u32;
}

/// Turns arbitrarily sized sample chunks into overlapping frames
///
/// Holds at most `buffer_size + chunk` samples; the backing vector is
/// reserved up front.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer_size: usize,
    hop_size: usize,
    pending: Vec<f32>,
}

impl FrameAssembler {
    pub fn new(buffer_size: usize, hop_size: usize) -> Self {
        Self {
            buffer_size,
            hop_size: hop_size.clamp(1, buffer_size.max(1)),
            pending: Vec::with_capacity(buffer_size * 2),
        }
    }

    pub fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
    }

    /// Emit one frame if enough samples are buffered, then advance by one hop
    pub fn pop_frame(&mut self, frame: &mut [f32]) -> bool {
        if self.pending.len() < self.buffer_size || frame.len() != self.buffer_size {
            return false;
        }
        frame.copy_from_slice(&self.pending[..self.buffer_size]);
        self.pending.drain(..self.hop_size);
        true
    }

    pub fn buffered(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
