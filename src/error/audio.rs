// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Single source of truth for the numeric codes reported to the UI layer.
///
/// Error code range: 1001-1011
pub struct AudioErrorCodes;

impl AudioErrorCodes {
    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1001;

    /// No usable input device
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// Failed to open audio stream
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Hardware error occurred
    pub const HARDWARE_ERROR: i32 = 1004;

    /// Capture is already running
    pub const ALREADY_RUNNING: i32 = 1005;

    /// Capture is not running
    pub const NOT_RUNNING: i32 = 1006;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1007;

    /// Audio stream disconnected or channel closed unexpectedly
    pub const STREAM_FAILURE: i32 = 1008;

    /// Frame size or sample rate disagrees with the estimator configuration
    pub const FORMAT_MISMATCH: i32 = 1009;

    /// Capture configuration rejected before opening the device
    pub const INVALID_CONFIG: i32 = 1010;

    /// Device did not finish opening within the configured timeout
    pub const OPEN_TIMEOUT: i32 = 1011;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=Capture, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover capture device access, stream management and
/// frame format validation.
///
/// Error code ranges: 1001-1011
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Microphone permission denied
    PermissionDenied,

    /// No input device present, or the device went away
    DeviceUnavailable,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },

    /// Hardware error occurred
    HardwareError { details: String },

    /// Capture is already running
    AlreadyRunning,

    /// Capture is not running
    NotRunning,

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Stream channel disconnected unexpectedly
    StreamFailure { reason: String },

    /// Frame length or sample rate does not match the estimator
    FormatMismatch {
        expected_len: usize,
        actual_len: usize,
        expected_rate: u32,
        actual_rate: u32,
    },

    /// Capture configuration is unusable
    InvalidConfig { reason: String },

    /// Opening the device exceeded the configured timeout
    OpenTimeout { timeout_ms: u64 },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::PermissionDenied => AudioErrorCodes::PERMISSION_DENIED,
            AudioError::DeviceUnavailable => AudioErrorCodes::DEVICE_UNAVAILABLE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::HardwareError { .. } => AudioErrorCodes::HARDWARE_ERROR,
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::FormatMismatch { .. } => AudioErrorCodes::FORMAT_MISMATCH,
            AudioError::InvalidConfig { .. } => AudioErrorCodes::INVALID_CONFIG,
            AudioError::OpenTimeout { .. } => AudioErrorCodes::OPEN_TIMEOUT,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            AudioError::DeviceUnavailable => "No audio input device available".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
            AudioError::AlreadyRunning => {
                "Recording already running. Call stop_recording() first.".to_string()
            }
            AudioError::NotRunning => {
                "Recording not running. Call start_recording() first.".to_string()
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned on {}", component)
            }
            AudioError::StreamFailure { reason } => {
                format!("Audio stream failed: {}", reason)
            }
            AudioError::FormatMismatch {
                expected_len,
                actual_len,
                expected_rate,
                actual_rate,
            } => format!(
                "Frame format mismatch: expected {} samples at {} Hz, got {} samples at {} Hz",
                expected_len, expected_rate, actual_len, actual_rate
            ),
            AudioError::InvalidConfig { reason } => {
                format!("Invalid capture configuration: {}", reason)
            }
            AudioError::OpenTimeout { timeout_ms } => {
                format!("Audio device did not open within {} ms", timeout_ms)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
