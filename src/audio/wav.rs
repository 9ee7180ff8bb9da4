//! WAV file source (hound), mixed down to mono.

use std::path::{Path, PathBuf};

use super::source::{CaptureConfig, FrameStatus, SampleSource};
use crate::error::AudioError;

/// Reads a whole WAV file up front and serves it as overlapping frames
pub struct WavSource {
    path: PathBuf,
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    buffer_size: usize,
    hop_size: usize,
    opened: bool,
}

impl WavSource {
    /// Decode `path` into mono f32 samples
    ///
    /// Integer formats are scaled to [-1, 1); multi-channel files are averaged.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, AudioError> {
        let path = path.as_ref().to_path_buf();
        let reader = hound::WavReader::open(&path).map_err(|err| wav_error(&path, err))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|err| wav_error(&path, err))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|value| value as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|err| wav_error(&path, err))?
            }
        };

        let samples = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self {
            path,
            samples,
            sample_rate: spec.sample_rate,
            position: 0,
            buffer_size: 0,
            hop_size: 0,
            opened: false,
        })
    }

    /// Total mono samples in the file
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleSource for WavSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), AudioError> {
        if config.buffer_size == 0 || config.hop_size == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "buffer_size and hop_size must be greater than 0".to_string(),
            });
        }
        self.buffer_size = config.buffer_size;
        self.hop_size = config.hop_size;
        self.position = 0;
        self.opened = true;
        log::info!(
            "[WavSource] Opened {:?}: {} samples at {} Hz",
            self.path,
            self.samples.len(),
            self.sample_rate
        );
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut [f32]) -> Result<FrameStatus, AudioError> {
        if !self.opened {
            return Err(AudioError::NotRunning);
        }
        let end = self.position + self.buffer_size;
        if end > self.samples.len() || frame.len() != self.buffer_size {
            return Ok(FrameStatus::Finished);
        }
        frame.copy_from_slice(&self.samples[self.position..end]);
        self.position += self.hop_size;
        Ok(FrameStatus::Filled)
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.opened = false;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn wav_error(path: &Path, err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(io) => AudioError::from(io),
        other => AudioError::StreamOpenFailed {
            reason: format!("{}: {}", path.display(), other),
        },
    }
}
