// Audio module - sample sources and the lock-free device handoff

pub mod buffer_pool;
pub mod cpal_source;
pub mod source;
pub mod synthetic;
pub mod wav;

pub use buffer_pool::{AudioBuffer, BufferPool, BufferPoolChannels, DeviceChannels, WorkerChannels};
pub use cpal_source::CpalSource;
pub use source::{CaptureConfig, FrameAssembler, FrameStatus, SampleSource};
pub use synthetic::{ToneSegment, ToneSource};
pub use wav::WavSource;
