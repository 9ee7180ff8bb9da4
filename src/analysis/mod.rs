// Analysis module - pitch estimation pipeline
//
// Runs the capture loop on its own thread: the SampleSource delivers frames,
// the PitchEstimator turns each into an optional PitchSample, and the result
// is handed to a caller-supplied sink (the session actor's command channel).
//
// Architecture:
// - CaptureWorker: owns the source and estimator, loops until shutdown
// - Pipeline: SampleSource → PitchEstimator → confidence gate → sink
// - Output: Option<PitchSample> per frame ("None" is silence, not an error)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::{CaptureConfig, FrameStatus, SampleSource};
use crate::config::PitchConfig;
use crate::error::{log_audio_error, AudioError};

pub mod note_name;
pub mod pitch;

pub use note_name::{note_name, NoteName};
pub use pitch::{PitchEstimate, PitchEstimator};

/// Idle wait when the source has no complete frame yet
const NOT_READY_BACKOFF: Duration = Duration::from_millis(2);

/// A surfaced pitch estimate
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PitchSample {
    /// Fundamental in Hz (> 0)
    pub frequency: f32,
    /// Estimator clarity (0.0-1.0)
    pub confidence: f32,
    /// Stream position of the frame start, in milliseconds since capture began
    pub timestamp_ms: u64,
}

impl PitchSample {
    pub fn from_estimate(estimate: PitchEstimate, timestamp_ms: u64) -> Self {
        Self {
            frequency: estimate.frequency,
            confidence: estimate.confidence,
            timestamp_ms,
        }
    }
}

/// Builds the source on the capture thread
pub type SourceFactory =
    Box<dyn FnOnce() -> Result<Box<dyn SampleSource>, AudioError> + Send + 'static>;

struct CaptureWorker<F> {
    source: Box<dyn SampleSource>,
    estimator: PitchEstimator,
    capture: CaptureConfig,
    shutdown: Arc<AtomicBool>,
    sink: F,
    frame: Vec<f32>,
    frames_processed: u64,
}

impl<F> CaptureWorker<F>
where
    F: FnMut(Option<PitchSample>) -> bool,
{
    fn run(mut self) {
        tracing::info!(
            "[CaptureThread] Capturing {} samples per frame, hop {}",
            self.capture.buffer_size,
            self.capture.hop_size
        );

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::info!("[CaptureThread] Shutdown requested, exiting");
                break;
            }

            match self.source.next_frame(&mut self.frame) {
                Ok(FrameStatus::Filled) => {
                    if !self.process_frame() {
                        tracing::info!("[CaptureThread] Sink closed, exiting");
                        break;
                    }
                }
                Ok(FrameStatus::NotReady) => thread::sleep(NOT_READY_BACKOFF),
                Ok(FrameStatus::Finished) => {
                    tracing::info!(
                        "[CaptureThread] Source finished after {} frames",
                        self.frames_processed
                    );
                    break;
                }
                Err(err) => {
                    log_audio_error(&err, "capture_worker");
                    break;
                }
            }
        }

        if let Err(err) = self.source.close() {
            log_audio_error(&err, "capture_close");
        }
    }

    fn process_frame(&mut self) -> bool {
        let timestamp_ms = self.frames_processed * self.capture.hop_size as u64 * 1000
            / self.capture.sample_rate.max(1) as u64;
        self.frames_processed += 1;

        let sample = match self
            .estimator
            .estimate(&self.frame, self.source.sample_rate())
        {
            Ok(estimate) => estimate.map(|e| PitchSample::from_estimate(e, timestamp_ms)),
            Err(err) => {
                log_audio_error(&err, "pitch_estimate");
                None
            }
        };

        if let Some(ref sample) = sample {
            tracing::debug!(
                "[CaptureThread] {:.1} Hz (confidence {:.2}) at {} ms",
                sample.frequency,
                sample.confidence,
                sample.timestamp_ms
            );
        }

        (self.sink)(sample)
    }
}

/// Spawn the capture thread and wait for the source to open
///
/// The source is created and opened on the new thread. This call blocks until
/// the open result comes back, for at most `capture.open_timeout_ms`.
///
/// # Arguments
/// * `factory` - Creates the source on the capture thread
/// * `capture` - Frame geometry and open timeout
/// * `pitch` - Estimator tuning
/// * `shutdown` - Set to `true` to stop the loop; the source is closed on exit
/// * `sink` - Receives one `Option<PitchSample>` per frame; returning `false` stops the loop
///
/// # Errors
/// * The source's own open error (permission, device, format)
/// * `AudioError::FormatMismatch` if the source rate differs from `capture.sample_rate`
/// * `AudioError::OpenTimeout` if opening took too long (the thread is told to stop)
pub fn spawn_pitch_thread<F>(
    factory: SourceFactory,
    capture: CaptureConfig,
    pitch: PitchConfig,
    shutdown: Arc<AtomicBool>,
    sink: F,
) -> Result<JoinHandle<()>, AudioError>
where
    F: FnMut(Option<PitchSample>) -> bool + Send + 'static,
{
    let (open_tx, open_rx) = mpsc::channel::<Result<(), AudioError>>();
    let thread_shutdown = Arc::clone(&shutdown);

    let handle = thread::Builder::new()
        .name("pitch-capture".to_string())
        .spawn(move || {
            let worker = match open_worker(factory, capture, pitch, thread_shutdown, sink) {
                Ok(worker) => worker,
                Err(err) => {
                    let _ = open_tx.send(Err(err));
                    return;
                }
            };
            if open_tx.send(Ok(())).is_err() {
                // Caller already gave up waiting
                let mut source = worker.source;
                let _ = source.close();
                return;
            }
            worker.run();
        })
        .map_err(AudioError::from)?;

    match open_rx.recv_timeout(Duration::from_millis(capture.open_timeout_ms)) {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(err)) => {
            let _ = handle.join();
            Err(err)
        }
        Err(mpsc::RecvTimeoutError::Timeout) => {
            shutdown.store(true, Ordering::SeqCst);
            Err(AudioError::OpenTimeout {
                timeout_ms: capture.open_timeout_ms,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            Err(AudioError::StreamFailure {
                reason: "capture thread exited while opening the source".to_string(),
            })
        }
    }
}

fn open_worker<F>(
    factory: SourceFactory,
    capture: CaptureConfig,
    pitch: PitchConfig,
    shutdown: Arc<AtomicBool>,
    sink: F,
) -> Result<CaptureWorker<F>, AudioError>
where
    F: FnMut(Option<PitchSample>) -> bool,
{
    let estimator = PitchEstimator::new(capture.sample_rate, capture.buffer_size, pitch)?;
    let mut source = factory()?;
    source.open(&capture)?;

    if source.sample_rate() != capture.sample_rate {
        let actual_rate = source.sample_rate();
        let _ = source.close();
        return Err(AudioError::FormatMismatch {
            expected_len: capture.buffer_size,
            actual_len: capture.buffer_size,
            expected_rate: capture.sample_rate,
            actual_rate,
        });
    }

    Ok(CaptureWorker {
        source,
        estimator,
        capture,
        shutdown,
        sink,
        frame: vec![0.0; capture.buffer_size],
        frames_processed: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{ToneSegment, ToneSource};
    use std::sync::Mutex;

    fn capture_config() -> CaptureConfig {
        CaptureConfig {
            sample_rate: 44100,
            buffer_size: 2048,
            hop_size: 1024,
            buffer_pool_size: 4,
            open_timeout_ms: 2000,
        }
    }

    #[test]
    fn test_worker_tracks_a_melody() {
        let melody = vec![
            ToneSegment {
                start_ms: 0,
                end_ms: 300,
                frequency: 220.0,
            },
            ToneSegment {
                start_ms: 300,
                end_ms: 600,
                frequency: 330.0,
            },
        ];
        let readings = Arc::new(Mutex::new(Vec::new()));
        let sink_readings = Arc::clone(&readings);

        let handle = spawn_pitch_thread(
            Box::new(move || Ok(Box::new(ToneSource::melody(melody, 44100)) as Box<dyn SampleSource>)),
            capture_config(),
            PitchConfig::default(),
            Arc::new(AtomicBool::new(false)),
            move |sample| {
                sink_readings.lock().unwrap().push(sample);
                true
            },
        )
        .unwrap();
        handle.join().unwrap();

        let readings = readings.lock().unwrap();
        let voiced: Vec<PitchSample> = readings.iter().flatten().copied().collect();
        assert!(!voiced.is_empty());
        let first = voiced.first().unwrap();
        let last = voiced.last().unwrap();
        assert!((first.frequency - 220.0).abs() < 3.0, "{}", first.frequency);
        assert!((last.frequency - 330.0).abs() < 3.0, "{}", last.frequency);
        assert!(voiced.windows(2).all(|w| w[0].timestamp_ms < w[1].timestamp_ms));
    }

    #[test]
    fn test_open_error_is_reported() {
        let result = spawn_pitch_thread(
            Box::new(|| Err(AudioError::PermissionDenied)),
            capture_config(),
            PitchConfig::default(),
            Arc::new(AtomicBool::new(false)),
            |_| true,
        );
        assert!(matches!(result, Err(AudioError::PermissionDenied)));
    }

    #[test]
    fn test_sample_rate_mismatch_is_rejected() {
        let result = spawn_pitch_thread(
            Box::new(|| Ok(Box::new(ToneSource::constant(220.0, 48000)) as Box<dyn SampleSource>)),
            capture_config(),
            PitchConfig::default(),
            Arc::new(AtomicBool::new(false)),
            |_| true,
        );
        assert!(matches!(
            result,
            Err(AudioError::FormatMismatch {
                expected_rate: 44100,
                actual_rate: 48000,
                ..
            })
        ));
    }

    #[test]
    fn test_shutdown_flag_stops_endless_source() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = spawn_pitch_thread(
            Box::new(|| {
                Ok(Box::new(ToneSource::constant(440.0, 44100).paced(true)) as Box<dyn SampleSource>)
            }),
            capture_config(),
            PitchConfig::default(),
            Arc::clone(&shutdown),
            |_| true,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(30));
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }

    #[test]
    fn test_closed_sink_stops_worker() {
        let mut remaining = 3;
        let handle = spawn_pitch_thread(
            Box::new(|| Ok(Box::new(ToneSource::constant(440.0, 44100)) as Box<dyn SampleSource>)),
            capture_config(),
            PitchConfig::default(),
            Arc::new(AtomicBool::new(false)),
            move |_| {
                remaining -= 1;
                remaining > 0
            },
        )
        .unwrap();
        handle.join().unwrap();
    }
}
