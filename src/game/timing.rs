//! TimingEngine - active-note window and auto-miss detection
//!
//! Notes are sorted by target time and every note shares the same
//! look-behind, so window open times are sorted too. A cursor marks the
//! first note that is still unresolved; each sweep starts there and stops at
//! the first note whose window has not opened yet.

use super::note::Note;
use crate::config::TimingConfig;

/// Result of one sweep over the chart
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Sweep {
    /// Pending notes past `target + duration + grace`, to be missed
    pub overdue: Vec<usize>,
    /// Pending notes inside their active window (excludes `overdue`)
    pub active: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct TimingEngine {
    config: TimingConfig,
    cursor: usize,
}

impl TimingEngine {
    pub fn new(config: TimingConfig) -> Self {
        Self { config, cursor: 0 }
    }

    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Forget the cursor (new chart)
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Index of the first unresolved note
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `target − lookbehind ≤ clock ≤ target + duration + lookahead` and Pending
    pub fn is_active(&self, note: &Note, clock_ms: u64) -> bool {
        note.is_pending()
            && note.window_open_ms(self.config.lookbehind_ms) <= clock_ms
            && clock_ms <= note.window_close_ms(self.config.lookahead_ms)
    }

    /// Classify pending notes around `clock_ms`
    ///
    /// Overdue notes are reported even when a clock jump carried `clock_ms`
    /// past their whole active window.
    pub fn sweep(&mut self, notes: &[Note], clock_ms: u64) -> Sweep {
        while self.cursor < notes.len() && !notes[self.cursor].is_pending() {
            self.cursor += 1;
        }

        let mut sweep = Sweep::default();
        for (index, note) in notes.iter().enumerate().skip(self.cursor) {
            if note.window_open_ms(self.config.lookbehind_ms) > clock_ms {
                break;
            }
            if !note.is_pending() {
                continue;
            }
            if note.is_overdue(clock_ms, self.config.grace_ms) {
                sweep.overdue.push(index);
            } else if self.is_active(note, clock_ms) {
                sweep.active.push(index);
            }
        }
        sweep
    }

    /// Active notes only, without touching the cursor
    pub fn active_indices(&self, notes: &[Note], clock_ms: u64) -> Vec<usize> {
        notes
            .iter()
            .enumerate()
            .skip(self.cursor.min(notes.len()))
            .take_while(|(_, note)| note.window_open_ms(self.config.lookbehind_ms) <= clock_ms)
            .filter(|(_, note)| {
                !note.is_overdue(clock_ms, self.config.grace_ms) && self.is_active(note, clock_ms)
            })
            .map(|(index, _)| index)
            .collect()
    }
}

impl Default for TimingEngine {
    fn default() -> Self {
        Self::new(TimingConfig::default())
    }
}
