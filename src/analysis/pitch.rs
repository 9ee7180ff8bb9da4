//! PitchEstimator - monophonic fundamental frequency estimation
//!
//! Implements the McLeod Pitch Method: a normalized square difference
//! function (NSDF) built from an FFT autocorrelation, followed by key-maximum
//! peak picking. Picking the first key maximum that reaches a fraction of the
//! strongest one keeps a sung fundamental from being reported an octave up
//! when its second harmonic dominates.
//!
//! The NSDF peak value ("clarity") doubles as the confidence score.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::PitchConfig;
use crate::error::AudioError;

/// Raw estimator output before confidence gating
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PitchEstimate {
    /// Estimated fundamental in Hz
    pub frequency: f32,
    /// NSDF clarity at the chosen lag (0.0-1.0)
    pub confidence: f32,
}

/// NSDF-based pitch estimator for fixed-size frames
///
/// All FFT plans and working buffers are allocated up front; `analyze` and
/// `estimate` do not allocate.
pub struct PitchEstimator {
    config: PitchConfig,
    sample_rate: u32,
    buffer_size: usize,
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    centered: Vec<f32>,
    nsdf: Vec<f32>,
    key_maxima: Vec<usize>,
    min_lag: usize,
    max_lag: usize,
}

impl PitchEstimator {
    /// Create an estimator for frames of `buffer_size` samples at `sample_rate`
    ///
    /// # Errors
    /// `AudioError::InvalidConfig` if the frequency range is empty or the frame
    /// is too short to hold a single period of `min_frequency_hz`'s upper lag bound
    pub fn new(
        sample_rate: u32,
        buffer_size: usize,
        config: PitchConfig,
    ) -> Result<Self, AudioError> {
        config.validate()?;
        if sample_rate == 0 || buffer_size < 4 {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "estimator needs a positive sample rate and at least 4 samples (got {} Hz, {})",
                    sample_rate, buffer_size
                ),
            });
        }

        let min_lag = ((sample_rate as f32 / config.max_frequency_hz).floor() as usize).max(2);
        let max_lag = ((sample_rate as f32 / config.min_frequency_hz).ceil() as usize)
            .min(buffer_size - 2);
        if min_lag >= max_lag {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "no lags to search: {} samples cannot resolve {}..{} Hz at {} Hz",
                    buffer_size, config.min_frequency_hz, config.max_frequency_hz, sample_rate
                ),
            });
        }

        // Zero padding to 2N avoids circular wrap in the autocorrelation
        let fft_len = (buffer_size * 2).next_power_of_two();
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Ok(Self {
            config,
            sample_rate,
            buffer_size,
            fft_len,
            forward,
            inverse,
            spectrum: vec![Complex::new(0.0, 0.0); fft_len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            centered: vec![0.0; buffer_size],
            nsdf: vec![0.0; max_lag + 2],
            key_maxima: Vec::with_capacity(max_lag),
            min_lag,
            max_lag,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    /// Estimate pitch and apply the confidence gate
    ///
    /// # Arguments
    /// * `frame` - Exactly `buffer_size` mono samples
    /// * `sample_rate` - Rate the frame was captured at
    ///
    /// # Returns
    /// * `Ok(Some(estimate))` - Voiced frame above the confidence threshold
    /// * `Ok(None)` - Silence, unvoiced or low-confidence frame
    ///
    /// # Errors
    /// `AudioError::FormatMismatch` if the frame length or sample rate differs
    /// from the estimator configuration
    pub fn estimate(
        &mut self,
        frame: &[f32],
        sample_rate: u32,
    ) -> Result<Option<PitchEstimate>, AudioError> {
        if frame.len() != self.buffer_size || sample_rate != self.sample_rate {
            return Err(AudioError::FormatMismatch {
                expected_len: self.buffer_size,
                actual_len: frame.len(),
                expected_rate: self.sample_rate,
                actual_rate: sample_rate,
            });
        }

        let threshold = self.config.confidence_threshold;
        Ok(self
            .analyze(frame)
            .filter(|estimate| estimate.confidence > threshold))
    }

    /// Run the NSDF analysis without confidence gating
    ///
    /// Returns `None` for silent frames or when no positive NSDF lobe falls in
    /// the searchable lag range.
    pub fn analyze(&mut self, frame: &[f32]) -> Option<PitchEstimate> {
        let n = self.buffer_size.min(frame.len());
        if n < self.buffer_size {
            return None;
        }

        let mean = frame[..n].iter().sum::<f32>() / n as f32;
        let mut energy = 0.0f64;
        for (dst, &src) in self.centered.iter_mut().zip(frame.iter()) {
            *dst = src - mean;
            energy += (*dst as f64) * (*dst as f64);
        }

        let rms = (energy / n as f64).sqrt() as f32;
        if rms < self.config.min_rms {
            return None;
        }

        self.autocorrelate();
        self.fill_nsdf(energy);
        self.collect_key_maxima();

        let strongest = self
            .key_maxima
            .iter()
            .map(|&lag| self.nsdf[lag])
            .fold(f32::MIN, f32::max);
        if strongest <= 0.0 {
            return None;
        }

        let cutoff = self.config.peak_threshold * strongest;
        let chosen = *self
            .key_maxima
            .iter()
            .find(|&&lag| self.nsdf[lag] >= cutoff)?;

        let (lag, clarity) = self.interpolate_peak(chosen);
        let frequency = self.sample_rate as f32 / lag;
        if !frequency.is_finite() || frequency <= 0.0 {
            return None;
        }

        Some(PitchEstimate {
            frequency,
            confidence: clarity.clamp(0.0, 1.0),
        })
    }

    /// r(τ) for τ in 0..=max_lag, left in `spectrum[τ].re` (unnormalized)
    fn autocorrelate(&mut self) {
        for (i, bin) in self.spectrum.iter_mut().enumerate() {
            let value = if i < self.buffer_size {
                self.centered[i]
            } else {
                0.0
            };
            *bin = Complex::new(value, 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);
    }

    /// nsdf(τ) = 2·r(τ) / m(τ), with m(τ) = Σ x[j]² + x[j+τ]² updated incrementally
    fn fill_nsdf(&mut self, energy: f64) {
        let n = self.buffer_size;
        let scale = 1.0 / self.fft_len as f64;
        let mut m = 2.0 * energy;

        for tau in 0..self.nsdf.len() {
            if tau > 0 {
                let head = self.centered[tau - 1] as f64;
                let tail = self.centered[n - tau] as f64;
                m -= head * head + tail * tail;
            }
            let r = self.spectrum[tau].re as f64 * scale;
            self.nsdf[tau] = if m > 1e-12 { (2.0 * r / m) as f32 } else { 0.0 };
        }
    }

    /// Highest point of each positive lobe after the zero-lag lobe
    fn collect_key_maxima(&mut self) {
        self.key_maxima.clear();
        let limit = self.max_lag + 1;

        let mut tau = 1;
        while tau < limit && self.nsdf[tau] > 0.0 {
            tau += 1;
        }

        while tau < limit {
            while tau < limit && self.nsdf[tau] <= 0.0 {
                tau += 1;
            }
            if tau >= limit {
                break;
            }

            let mut best = tau;
            while tau < limit && self.nsdf[tau] > 0.0 {
                if self.nsdf[tau] > self.nsdf[best] {
                    best = tau;
                }
                tau += 1;
            }

            if best >= self.min_lag {
                self.key_maxima.push(best);
            }
        }
    }

    /// Parabolic refinement of lag and peak height around `tau`
    fn interpolate_peak(&self, tau: usize) -> (f32, f32) {
        let a = self.nsdf[tau - 1];
        let b = self.nsdf[tau];
        let c = self.nsdf[tau + 1];
        let denom = a - 2.0 * b + c;

        if denom.abs() < f32::EPSILON {
            return (tau as f32, b);
        }

        let delta = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
        (tau as f32 + delta, b - 0.25 * (a - c) * delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    const SAMPLE_RATE: u32 = 44100;
    const BUFFER_SIZE: usize = 2048;

    fn estimator() -> PitchEstimator {
        PitchEstimator::new(SAMPLE_RATE, BUFFER_SIZE, PitchConfig::default()).unwrap()
    }

    fn tone(partials: &[(f32, f32)]) -> Vec<f32> {
        (0..BUFFER_SIZE)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                partials
                    .iter()
                    .map(|&(freq, amp)| amp * (2.0 * PI * freq * t).sin())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn test_pure_sine_a4() {
        let mut estimator = estimator();
        let frame = tone(&[(440.0, 0.5)]);
        let estimate = estimator.estimate(&frame, SAMPLE_RATE).unwrap().unwrap();
        assert!(
            (estimate.frequency - 440.0).abs() < 2.0,
            "expected ~440 Hz, got {}",
            estimate.frequency
        );
        assert!(estimate.confidence > 0.9);
    }

    #[test]
    fn test_sung_range() {
        let mut estimator = estimator();
        for &freq in &[110.0f32, 196.0, 261.63, 329.63, 523.25, 880.0] {
            let frame = tone(&[(freq, 0.4)]);
            let estimate = estimator
                .estimate(&frame, SAMPLE_RATE)
                .unwrap()
                .unwrap_or_else(|| panic!("no pitch for {} Hz", freq));
            assert!(
                (estimate.frequency - freq).abs() < freq * 0.01,
                "expected ~{} Hz, got {}",
                freq,
                estimate.frequency
            );
        }
    }

    #[test]
    fn test_strong_second_harmonic_is_not_octave_error() {
        let mut estimator = estimator();
        // Second harmonic louder than the fundamental
        let frame = tone(&[(200.0, 0.4), (400.0, 0.6)]);
        let estimate = estimator.estimate(&frame, SAMPLE_RATE).unwrap().unwrap();
        assert!(
            (estimate.frequency - 200.0).abs() < 3.0,
            "expected fundamental ~200 Hz, got {}",
            estimate.frequency
        );
    }

    #[test]
    fn test_silence_is_no_pitch() {
        let mut estimator = estimator();
        let frame = vec![0.0; BUFFER_SIZE];
        assert_eq!(estimator.estimate(&frame, SAMPLE_RATE).unwrap(), None);
    }

    #[test]
    fn test_white_noise_is_below_threshold() {
        let mut estimator = estimator();
        let mut rng = StdRng::seed_from_u64(7);
        let frame: Vec<f32> = (0..BUFFER_SIZE).map(|_| rng.gen_range(-0.5..0.5)).collect();
        assert_eq!(estimator.estimate(&frame, SAMPLE_RATE).unwrap(), None);
    }

    #[test]
    fn test_format_mismatch_is_rejected() {
        let mut estimator = estimator();
        let short = vec![0.0; 1024];
        assert!(matches!(
            estimator.estimate(&short, SAMPLE_RATE),
            Err(AudioError::FormatMismatch {
                expected_len: 2048,
                actual_len: 1024,
                ..
            })
        ));

        let frame = tone(&[(440.0, 0.5)]);
        assert!(matches!(
            estimator.estimate(&frame, 48000),
            Err(AudioError::FormatMismatch {
                actual_rate: 48000,
                ..
            })
        ));
    }

    #[test]
    fn test_threshold_gates_but_analyze_does_not() {
        let config = PitchConfig {
            confidence_threshold: 0.999_9,
            ..PitchConfig::default()
        };
        let mut estimator = PitchEstimator::new(SAMPLE_RATE, BUFFER_SIZE, config).unwrap();
        let frame = tone(&[(200.0, 0.3), (400.0, 0.3), (600.0, 0.3)]);
        let mut rng = StdRng::seed_from_u64(3);
        let noisy: Vec<f32> = frame
            .iter()
            .map(|s| s + rng.gen_range(-0.2..0.2))
            .collect();

        let raw = estimator.analyze(&noisy).expect("voiced frame");
        assert!(raw.confidence < 0.999_9);
        assert_eq!(estimator.estimate(&noisy, SAMPLE_RATE).unwrap(), None);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(PitchEstimator::new(0, BUFFER_SIZE, PitchConfig::default()).is_err());
        // 64 samples cannot hold a 60 Hz period, but the lag range is clipped, so
        // a range entirely above the searchable lags must be rejected
        let config = PitchConfig {
            min_frequency_hz: 10_000.0,
            max_frequency_hz: 20_000.0,
            ..PitchConfig::default()
        };
        assert!(PitchEstimator::new(SAMPLE_RATE, 64, config).is_err());
    }
}
