//! Configuration management for dynamic parameter tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! enabling fast iteration without recompilation. Pitch estimator tuning,
//! capture format and gameplay windows can all be adjusted via the config
//! file. Every section defaults field-by-field, so a partial file only
//! overrides what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::AudioError;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pitch: PitchConfig,
    pub audio: AudioConfig,
    pub game: GameConfig,
}

/// Pitch estimator parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Estimates at or below this confidence are reported as "no pitch"
    pub confidence_threshold: f32,
    /// Lowest fundamental considered (Hz)
    pub min_frequency_hz: f32,
    /// Highest fundamental considered (Hz)
    pub max_frequency_hz: f32,
    /// Frames quieter than this RMS level are treated as silence
    pub min_rms: f32,
    /// Fraction of the strongest NSDF key maximum a peak must reach to be picked
    pub peak_threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            min_frequency_hz: 60.0,
            max_frequency_hz: 1500.0,
            min_rms: 0.01,
            peak_threshold: 0.9,
        }
    }
}

impl PitchConfig {
    /// Reject frequency ranges the estimator cannot search
    pub fn validate(&self) -> Result<(), AudioError> {
        if !(self.min_frequency_hz > 0.0 && self.min_frequency_hz < self.max_frequency_hz) {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "frequency range {}..{} Hz is empty",
                    self.min_frequency_hz, self.max_frequency_hz
                ),
            });
        }
        Ok(())
    }
}

/// Capture format configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz, shared by the capture source and the estimator
    pub sample_rate: u32,
    /// Analysis frame length in samples
    pub buffer_size: usize,
    /// Samples between the starts of consecutive analysis frames
    pub hop_size: usize,
    /// Number of pre-allocated buffers between the device callback and the worker
    pub buffer_pool_size: usize,
    /// Upper bound on device initialization
    pub open_timeout_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: 2048,
            hop_size: 1024,
            buffer_pool_size: 16,
            open_timeout_ms: 5000,
        }
    }
}

impl AudioConfig {
    /// Check the capture format before any device is touched
    pub fn validate(&self) -> Result<(), AudioError> {
        if self.sample_rate == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "sample_rate must be greater than 0".to_string(),
            });
        }
        if self.buffer_size == 0 || self.buffer_pool_size == 0 {
            return Err(AudioError::InvalidConfig {
                reason: "buffer_size and buffer_pool_size must be greater than 0".to_string(),
            });
        }
        if self.hop_size == 0 || self.hop_size > self.buffer_size {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "hop_size {} must be within 1..={}",
                    self.hop_size, self.buffer_size
                ),
            });
        }
        Ok(())
    }
}

/// Active-window and auto-miss timing (milliseconds)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long before its target time a note becomes active
    pub lookbehind_ms: u64,
    /// How long after target + duration a note stays active
    pub lookahead_ms: u64,
    /// Slack after target + duration before a pending note is missed
    pub grace_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            lookbehind_ms: 2000,
            lookahead_ms: 1000,
            grace_ms: 500,
        }
    }
}

/// Hit window for pitch judgement
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JudgementConfig {
    pub time_tolerance_ms: f32,
    pub pitch_tolerance_hz: f32,
    /// Limit each pitch sample to its single most accurate note
    pub exclusive: bool,
}

impl Default for JudgementConfig {
    fn default() -> Self {
        Self {
            time_tolerance_ms: 200.0,
            pitch_tolerance_hz: 20.0,
            exclusive: false,
        }
    }
}

impl JudgementConfig {
    /// Tolerances divide the accuracy terms, so both must be positive
    pub fn validate(&self) -> Result<(), AudioError> {
        let positive = |value: f32| value.is_finite() && value > 0.0;
        if !positive(self.time_tolerance_ms) || !positive(self.pitch_tolerance_hz) {
            return Err(AudioError::InvalidConfig {
                reason: format!(
                    "judgement tolerances must be positive (got {} ms, {} Hz)",
                    self.time_tolerance_ms, self.pitch_tolerance_hz
                ),
            });
        }
        Ok(())
    }
}

/// Gameplay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Initial difficulty (clamped to 1..=10)
    pub difficulty: i32,
    /// Initial volume (clamped to 0.0..=1.0)
    pub volume: f32,
    pub lane_count: u32,
    /// Seed for the random walk chart pattern
    pub chart_seed: u64,
    /// Game clock cadence
    pub tick_interval_ms: u64,
    pub timing: TimingConfig,
    pub judgement: JudgementConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            difficulty: 1,
            volume: 0.8,
            lane_count: 4,
            chart_seed: 0,
            tick_interval_ms: 16,
            timing: TimingConfig::default(),
            judgement: JudgementConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist
    /// or the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<Self>(&contents) {
                Ok(mut config) => {
                    if let Err(err) = config.game.judgement.validate() {
                        log::warn!(
                            "[Config] {} in {:?}. Using default judgement.",
                            err,
                            path.as_ref()
                        );
                        config.game.judgement = JudgementConfig::default();
                    }
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/game_config.json")
    }
}
