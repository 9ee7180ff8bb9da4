//! Deterministic synthetic voice for tests, simulation and demos.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::source::{CaptureConfig, FrameStatus, SampleSource};
use crate::error::AudioError;

/// Relative partial amplitudes of a plain sung vowel
const VOICE_HARMONICS: [f32; 4] = [1.0, 0.5, 0.3, 0.15];

/// One sustained pitch of the melody
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSegment {
    pub start_ms: u64,
    pub end_ms: u64,
    pub frequency: f32,
}

/// Harmonic tone generator following a list of timed segments
///
/// Samples outside every segment are silent. With pacing enabled frames are
/// released no faster than real time, which makes it a drop-in stand-in for
/// a microphone.
pub struct ToneSource {
    segments: Vec<ToneSegment>,
    sample_rate: u32,
    amplitude: f32,
    harmonics: Vec<f32>,
    noise_level: f32,
    noise_seed: u64,
    rng: StdRng,
    length_samples: Option<u64>,
    paced: bool,
    started_at: Option<Instant>,
    position: u64,
    buffer_size: usize,
    hop_size: usize,
    opened: bool,
}

impl ToneSource {
    /// Endless tone at one frequency
    pub fn constant(frequency: f32, sample_rate: u32) -> Self {
        Self::build(
            vec![ToneSegment {
                start_ms: 0,
                end_ms: u64::MAX,
                frequency,
            }],
            sample_rate,
            None,
        )
    }

    /// Melody that finishes after its last segment
    pub fn melody(segments: Vec<ToneSegment>, sample_rate: u32) -> Self {
        let end_ms = segments.iter().map(|s| s.end_ms).max().unwrap_or(0);
        let length = end_ms.saturating_mul(sample_rate as u64) / 1000;
        Self::build(segments, sample_rate, Some(length))
    }

    fn build(segments: Vec<ToneSegment>, sample_rate: u32, length_samples: Option<u64>) -> Self {
        Self {
            segments,
            sample_rate,
            amplitude: 0.3,
            harmonics: VOICE_HARMONICS.to_vec(),
            noise_level: 0.0,
            noise_seed: 0,
            rng: StdRng::seed_from_u64(0),
            length_samples,
            paced: false,
            started_at: None,
            position: 0,
            buffer_size: 0,
            hop_size: 0,
            opened: false,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Replace the partial amplitudes (index 0 is the fundamental)
    pub fn with_harmonics(mut self, harmonics: &[f32]) -> Self {
        self.harmonics = harmonics.to_vec();
        self
    }

    /// Add seeded uniform noise of peak `level`
    pub fn with_noise(mut self, level: f32, seed: u64) -> Self {
        self.noise_level = level;
        self.noise_seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_length_ms(mut self, length_ms: u64) -> Self {
        self.length_samples = Some(length_ms.saturating_mul(self.sample_rate as u64) / 1000);
        self
    }

    pub fn paced(mut self, paced: bool) -> Self {
        self.paced = paced;
        self
    }

    fn frequency_at(&self, sample_index: u64) -> Option<f32> {
        let t_ms = sample_index.saturating_mul(1000) / self.sample_rate.max(1) as u64;
        self.segments
            .iter()
            .find(|segment| segment.start_ms <= t_ms && t_ms < segment.end_ms)
            .map(|segment| segment.frequency)
    }

    fn render(&mut self, frame: &mut [f32]) {
        let rate = self.sample_rate.max(1) as f64;
        for (offset, slot) in frame.iter_mut().enumerate() {
            let n = self.position + offset as u64;
            let mut value = 0.0f32;
            if let Some(frequency) = self.frequency_at(n) {
                let t = n as f64 / rate;
                for (k, weight) in self.harmonics.iter().enumerate() {
                    let partial = (k + 1) as f64 * frequency as f64;
                    value += weight * (2.0 * PI * partial * t).sin() as f32;
                }
                value *= self.amplitude;
            }
            if self.noise_level > 0.0 {
                value += self.rng.gen_range(-self.noise_level..=self.noise_level);
            }
            *slot = value;
        }
    }
}

impl SampleSource for ToneSource {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), AudioError> {
        if config.buffer_size == 0 || config.hop_size == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "buffer_size and hop_size must be greater than 0".to_string(),
            });
        }
        self.buffer_size = config.buffer_size;
        self.hop_size = config.hop_size;
        self.position = 0;
        self.rng = StdRng::seed_from_u64(self.noise_seed);
        self.started_at = Some(Instant::now());
        self.opened = true;
        Ok(())
    }

    fn next_frame(&mut self, frame: &mut [f32]) -> Result<FrameStatus, AudioError> {
        if !self.opened {
            return Err(AudioError::NotRunning);
        }
        if frame.len() != self.buffer_size {
            return Err(AudioError::FormatMismatch {
                expected_len: self.buffer_size,
                actual_len: frame.len(),
                expected_rate: self.sample_rate,
                actual_rate: self.sample_rate,
            });
        }

        let frame_end = self.position + self.buffer_size as u64;
        if let Some(length) = self.length_samples {
            if frame_end > length {
                return Ok(FrameStatus::Finished);
            }
        }

        if self.paced {
            let due = Duration::from_secs_f64(frame_end as f64 / self.sample_rate.max(1) as f64);
            let elapsed = self
                .started_at
                .map(|start| start.elapsed())
                .unwrap_or_default();
            if elapsed < due {
                return Ok(FrameStatus::NotReady);
            }
        }

        self.render(frame);
        self.position += self.hop_size as u64;
        Ok(FrameStatus::Filled)
    }

    fn close(&mut self) -> Result<(), AudioError> {
        self.opened = false;
        self.started_at = None;
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> CaptureConfig {
        CaptureConfig {
            sample_rate: 8000,
            buffer_size: 800,
            hop_size: 800,
            ..CaptureConfig::default()
        }
    }

    #[test]
    fn test_melody_is_silent_between_segments() {
        let mut source = ToneSource::melody(
            vec![
                ToneSegment {
                    start_ms: 0,
                    end_ms: 100,
                    frequency: 200.0,
                },
                ToneSegment {
                    start_ms: 200,
                    end_ms: 300,
                    frequency: 300.0,
                },
            ],
            8000,
        );
        source.open(&small_config()).unwrap();

        let mut frame = vec![0.0; 800];
        assert_eq!(source.next_frame(&mut frame).unwrap(), FrameStatus::Filled);
        assert!(frame.iter().any(|s| s.abs() > 0.1));

        assert_eq!(source.next_frame(&mut frame).unwrap(), FrameStatus::Filled);
        assert!(frame.iter().all(|s| *s == 0.0));

        assert_eq!(source.next_frame(&mut frame).unwrap(), FrameStatus::Filled);
        assert!(frame.iter().any(|s| s.abs() > 0.1));

        assert_eq!(source.next_frame(&mut frame).unwrap(), FrameStatus::Finished);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let render = || {
            let mut source = ToneSource::constant(220.0, 8000)
                .with_noise(0.05, 11)
                .with_length_ms(200);
            source.open(&small_config()).unwrap();
            let mut frame = vec![0.0; 800];
            source.next_frame(&mut frame).unwrap();
            frame
        };
        assert_eq!(render(), render());
    }

    #[test]
    fn test_paced_source_waits_for_real_time() {
        let mut source = ToneSource::constant(220.0, 8000).paced(true);
        source.open(&small_config()).unwrap();
        let mut frame = vec![0.0; 800];
        // The first 100 ms frame cannot be due immediately after opening
        assert_eq!(source.next_frame(&mut frame).unwrap(), FrameStatus::NotReady);
    }

    #[test]
    fn test_wrong_frame_length() {
        let mut source = ToneSource::constant(220.0, 8000);
        source.open(&small_config()).unwrap();
        let mut frame = vec![0.0; 10];
        assert!(matches!(
            source.next_frame(&mut frame),
            Err(AudioError::FormatMismatch { .. })
        ));
    }
}
