//! Microphone capture through cpal's default input device.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};

use super::buffer_pool::{BufferPool, DeviceChannels, WorkerChannels};
use super::source::{CaptureConfig, FrameAssembler, FrameStatus, SampleSource};
use crate::error::AudioError;

const STREAM_OK: u8 = 0;
const STREAM_DEVICE_LOST: u8 = 1;
const STREAM_BACKEND_ERROR: u8 = 2;

/// Default input device, first channel only
///
/// The device callback copies into pooled buffers; `next_frame` drains them
/// into a `FrameAssembler`. `cpal::Stream` is not `Send`, so a `CpalSource`
/// must be opened on the thread that reads it.
pub struct CpalSource {
    stream: Option<cpal::Stream>,
    channels: Option<WorkerChannels>,
    assembler: FrameAssembler,
    sample_rate: u32,
    stream_state: Arc<AtomicU8>,
    dropped_samples: Arc<AtomicU64>,
}

impl CpalSource {
    pub fn new() -> Self {
        Self {
            stream: None,
            channels: None,
            assembler: FrameAssembler::new(0, 1),
            sample_rate: 0,
            stream_state: Arc::new(AtomicU8::new(STREAM_OK)),
            dropped_samples: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Samples discarded because the pool was empty when the device delivered them
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples.load(Ordering::Relaxed)
    }

    fn select_config(
        device: &cpal::Device,
        sample_rate: u32,
    ) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let ranges = device
            .supported_input_configs()
            .map_err(|err| match err {
                cpal::SupportedStreamConfigsError::DeviceNotAvailable => {
                    AudioError::DeviceUnavailable
                }
                cpal::SupportedStreamConfigsError::BackendSpecific { err } => {
                    backend_error(err.description)
                }
                other => AudioError::StreamOpenFailed {
                    reason: format!("Failed to query input configs: {}", other),
                },
            })?;

        let rate = cpal::SampleRate(sample_rate);
        let mut candidates: Vec<_> = ranges
            .filter(|range| range.min_sample_rate() <= rate && rate <= range.max_sample_rate())
            .collect();
        // Native f32 first, then fewest channels
        candidates.sort_by_key(|range| {
            (
                range.sample_format() != cpal::SampleFormat::F32,
                range.channels(),
            )
        });

        candidates
            .into_iter()
            .next()
            .map(|range| range.with_sample_rate(rate))
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: format!("Input device does not support {} Hz", sample_rate),
            })
    }

    fn build_stream<T>(
        device: &cpal::Device,
        stream_config: &cpal::StreamConfig,
        mut channels: DeviceChannels,
        frame_len: usize,
        stream_state: Arc<AtomicU8>,
        dropped_samples: Arc<AtomicU64>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let channel_count = (stream_config.channels as usize).max(1);
        let chunk_len = frame_len.max(1) * channel_count;

        let err_fn = move |err: cpal::StreamError| {
            let state = match err {
                cpal::StreamError::DeviceNotAvailable => STREAM_DEVICE_LOST,
                _ => STREAM_BACKEND_ERROR,
            };
            log::error!("[CpalSource] Input stream error: {}", err);
            stream_state.store(state, Ordering::SeqCst);
        };

        device
            .build_input_stream(
                stream_config,
                move |data: &[T], _: &cpal::InputCallbackInfo| {
                    for chunk in data.chunks(chunk_len) {
                        let Ok(mut buffer) = channels.pool_consumer.pop() else {
                            dropped_samples
                                .fetch_add((chunk.len() / channel_count) as u64, Ordering::Relaxed);
                            continue;
                        };
                        buffer.clear();
                        buffer.extend(
                            chunk
                                .chunks(channel_count)
                                .map(|frame| frame[0].to_sample::<f32>()),
                        );
                        let _ = channels.data_producer.push(buffer);
                    }
                },
                err_fn,
                None,
            )
            .map_err(|err| match err {
                cpal::BuildStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
                cpal::BuildStreamError::BackendSpecific { err } => backend_error(err.description),
                other => AudioError::StreamOpenFailed {
                    reason: format!("{}", other),
                },
            })
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleSource for CpalSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::DeviceUnavailable)?;
        let supported = Self::select_config(&device, config.sample_rate)?;
        let stream_config: cpal::StreamConfig = supported.config();

        let (device_channels, worker_channels) =
            BufferPool::new(config.buffer_pool_size, config.buffer_size)?.split_for_threads();
        self.stream_state.store(STREAM_OK, Ordering::SeqCst);
        self.dropped_samples.store(0, Ordering::Relaxed);

        let state = Arc::clone(&self.stream_state);
        let dropped = Arc::clone(&self.dropped_samples);
        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &stream_config,
                device_channels,
                config.buffer_size,
                state,
                dropped,
            ),
            cpal::SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &stream_config,
                device_channels,
                config.buffer_size,
                state,
                dropped,
            ),
            cpal::SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &stream_config,
                device_channels,
                config.buffer_size,
                state,
                dropped,
            ),
            other => Err(AudioError::StreamOpenFailed {
                reason: format!("Unsupported input sample format {:?}", other),
            }),
        }?;

        stream.play().map_err(|err| match err {
            cpal::PlayStreamError::DeviceNotAvailable => AudioError::DeviceUnavailable,
            cpal::PlayStreamError::BackendSpecific { err } => AudioError::HardwareError {
                details: format!("Input start failed: {}", err.description),
            },
        })?;

        log::info!(
            "[CpalSource] Capturing {} Hz, {} channel(s), {:?}",
            config.sample_rate,
            stream_config.channels,
            supported.sample_format()
        );

        self.assembler = FrameAssembler::new(config.buffer_size, config.hop_size);
        self.sample_rate = config.sample_rate;
        self.channels = Some(worker_channels);
        self.stream = Some(stream);
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut [f32]) -> Result<FrameStatus, AudioError> {
        match self.stream_state.load(Ordering::SeqCst) {
            STREAM_DEVICE_LOST => return Err(AudioError::DeviceUnavailable),
            STREAM_BACKEND_ERROR => {
                return Err(AudioError::StreamFailure {
                    reason: "input stream reported an error".to_string(),
                })
            }
            _ => {}
        }

        let channels = self.channels.as_mut().ok_or(AudioError::NotRunning)?;
        while let Ok(buffer) = channels.data_consumer.pop() {
            self.assembler.push(&buffer);
            if channels.pool_producer.push(buffer).is_err() {
                log::warn!("[CpalSource] Pool queue full, dropping buffer");
            }
        }

        if self.assembler.pop_frame(frame) {
            Ok(FrameStatus::Filled)
        } else {
            Ok(FrameStatus::NotReady)
        }
    }

    fn close(&mut self) -> Result<(), AudioError> {
        let Some(stream) = self.stream.take() else {
            return Ok(());
        };
        self.channels = None;
        self.assembler.clear();

        let paused = stream.pause();
        drop(stream);

        let dropped = self.dropped_samples();
        if dropped > 0 {
            log::warn!("[CpalSource] {} samples dropped while capturing", dropped);
        }

        paused.map_err(|err| AudioError::HardwareError {
            details: format!("Input stop failed: {}", err),
        })
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Backends report permission problems only as free text
fn backend_error(description: String) -> AudioError {
    let lower = description.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        AudioError::PermissionDenied
    } else {
        AudioError::StreamOpenFailed {
            reason: description,
        }
    }
}
