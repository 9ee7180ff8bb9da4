//! JudgementEngine - pitch/time matching against active notes

use super::note::Note;
use crate::config::JudgementConfig;

/// A note the current pitch sample qualifies as hitting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgement {
    pub note_index: usize,
    /// 0.0-1.0, half from timing and half from pitch
    pub accuracy: f32,
}

#[derive(Debug, Clone, Default)]
pub struct JudgementEngine {
    config: JudgementConfig,
}

impl JudgementEngine {
    /// Invalid tolerances are replaced by the defaults
    pub fn new(config: JudgementConfig) -> Self {
        if let Err(err) = config.validate() {
            log::warn!("[JudgementEngine] {}, using default tolerances", err);
            return Self::default();
        }
        Self { config }
    }

    pub fn config(&self) -> &JudgementConfig {
        &self.config
    }

    /// `clamp(1 − 0.5·Δt/Tt − 0.5·Δf/Tf, 0, 1)`
    pub fn accuracy(&self, time_diff_ms: f32, pitch_diff_hz: f32) -> f32 {
        let timing = 0.5 * time_diff_ms / self.config.time_tolerance_ms;
        let pitch = 0.5 * pitch_diff_hz / self.config.pitch_tolerance_hz;
        (1.0 - timing - pitch).clamp(0.0, 1.0)
    }

    /// Judge one pitch sample against the active notes
    ///
    /// # Arguments
    /// * `notes` - The full chart
    /// * `active` - Indices of the currently active notes
    /// * `clock_ms` - Current game clock
    /// * `frequency` - Sung pitch in Hz
    ///
    /// # Returns
    /// Every active note within both tolerances, in chart order. In exclusive
    /// mode only the most accurate one (earliest on ties).
    pub fn judge(
        &self,
        notes: &[Note],
        active: &[usize],
        clock_ms: u64,
        frequency: f32,
    ) -> Vec<Judgement> {
        let mut hits: Vec<Judgement> = active
            .iter()
            .filter_map(|&index| {
                let note = notes.get(index)?;
                if !note.is_pending() {
                    return None;
                }
                let time_diff = clock_ms.abs_diff(note.target_time_ms) as f32;
                let pitch_diff = (frequency - note.frequency).abs();
                if time_diff <= self.config.time_tolerance_ms
                    && pitch_diff <= self.config.pitch_tolerance_hz
                {
                    Some(Judgement {
                        note_index: index,
                        accuracy: self.accuracy(time_diff, pitch_diff),
                    })
                } else {
                    None
                }
            })
            .collect();

        if self.config.exclusive && hits.len() > 1 {
            let best = hits.iter().copied().fold(hits[0], |best, candidate| {
                if candidate.accuracy > best.accuracy {
                    candidate
                } else {
                    best
                }
            });
            hits = vec![best];
        }

        hits
    }
}
