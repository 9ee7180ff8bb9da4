//! GameSession - the rhythm game state machine
//!
//! Idle → Playing ⇄ Paused → Ended, with `reset_game` returning to Idle from
//! anywhere. Every state change that a collaborator might care about is
//! queued as a `GameEvent`; the owner drains them with `drain_events`.

use std::collections::HashMap;

use super::chart::{clamp_difficulty, ChartGenerator};
use super::events::{GameEvent, SessionSnapshot, SessionStats, SessionStatus, SessionSummary};
use super::judgement::JudgementEngine;
use super::note::{Note, NoteId};
use super::scoring::{clamp_volume, HitOutcome, ScoreBoard};
use super::timing::TimingEngine;
use crate::analysis::PitchSample;
use crate::config::GameConfig;

pub struct GameSession {
    chart: ChartGenerator,
    timing: TimingEngine,
    judgement: JudgementEngine,
    status: SessionStatus,
    clock_ms: u64,
    board: ScoreBoard,
    notes: Vec<Note>,
    note_index: HashMap<NoteId, usize>,
    current_pitch: Option<PitchSample>,
    target_pitch: Option<f32>,
    difficulty: u8,
    volume: f32,
    outbox: Vec<GameEvent>,
}

impl GameSession {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            chart: ChartGenerator::from_config(config),
            timing: TimingEngine::new(config.timing),
            judgement: JudgementEngine::new(config.judgement),
            status: SessionStatus::Idle,
            clock_ms: 0,
            board: ScoreBoard::default(),
            notes: Vec::new(),
            note_index: HashMap::new(),
            current_pitch: None,
            target_pitch: None,
            difficulty: clamp_difficulty(config.difficulty),
            volume: clamp_volume(config.volume),
            outbox: Vec::new(),
        }
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Generate a fresh chart and start playing from clock 0
    ///
    /// Allowed from any state. All per-run state is replaced; difficulty and
    /// volume are kept.
    pub fn start_game(&mut self) {
        self.clear_run();
        self.notes = self.chart.generate(self.difficulty as i32);
        self.note_index = self
            .notes
            .iter()
            .enumerate()
            .map(|(index, note)| (note.id.clone(), index))
            .collect();

        log::info!(
            "[GameSession] Starting difficulty {} with {} notes",
            self.difficulty,
            self.notes.len()
        );
        self.set_status(SessionStatus::Playing);
        self.emit_stats();
    }

    pub fn pause_game(&mut self) -> bool {
        if self.status != SessionStatus::Playing {
            return false;
        }
        self.set_status(SessionStatus::Paused);
        true
    }

    pub fn resume_game(&mut self) -> bool {
        if self.status != SessionStatus::Paused {
            return false;
        }
        self.set_status(SessionStatus::Playing);
        // Notes resolved while paused may have emptied the chart
        self.check_finished();
        true
    }

    /// Back to Idle with an empty chart; difficulty and volume survive
    pub fn reset_game(&mut self) {
        self.clear_run();
        self.set_status(SessionStatus::Idle);
    }

    fn clear_run(&mut self) {
        self.timing.reset();
        self.clock_ms = 0;
        self.board = ScoreBoard::default();
        self.notes.clear();
        self.note_index.clear();
        self.current_pitch = None;
        self.target_pitch = None;
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.outbox.push(GameEvent::StatusChanged { status });
    }

    // ========================================================================
    // CLOCK AND PITCH
    // ========================================================================

    /// Advance the game clock; auto-misses overdue notes
    ///
    /// Ignored unless Playing.
    pub fn update_time(&mut self, clock_ms: u64) {
        if self.status != SessionStatus::Playing {
            return;
        }
        self.clock_ms = clock_ms;

        let sweep = self.timing.sweep(&self.notes, clock_ms);
        for index in sweep.overdue {
            let id = self.notes[index].id.clone();
            self.miss_note(&id);
        }

        self.target_pitch = sweep
            .active
            .first()
            .map(|&index| self.notes[index].frequency);
        self.check_finished();
    }

    /// Store the latest estimate and judge it while Playing
    ///
    /// `None` clears the current pitch. A `PitchUpdated` event is queued only
    /// when the stored value actually changes.
    pub fn update_pitch(&mut self, sample: Option<PitchSample>) {
        let changed = self.current_pitch.map(|p| p.frequency) != sample.map(|s| s.frequency);
        self.current_pitch = sample;
        if changed {
            self.outbox.push(GameEvent::PitchUpdated {
                frequency: sample.map(|s| s.frequency),
            });
        }

        let Some(sample) = sample else {
            return;
        };
        if self.status != SessionStatus::Playing {
            return;
        }

        let active = self.timing.active_indices(&self.notes, self.clock_ms);
        let hits = self
            .judgement
            .judge(&self.notes, &active, self.clock_ms, sample.frequency);
        for judgement in hits {
            let id = self.notes[judgement.note_index].id.clone();
            self.hit_note(&id, judgement.accuracy);
        }
    }

    // ========================================================================
    // SCORING
    // ========================================================================

    /// Resolve `id` as hit. Unknown or already resolved ids are ignored.
    pub fn hit_note(&mut self, id: &str, accuracy: f32) -> Option<HitOutcome> {
        let index = *self.note_index.get(id)?;
        if !self.notes[index].is_pending() {
            return None;
        }

        let outcome = self.board.register_hit(accuracy);
        self.notes[index].mark_hit(outcome.perfect());
        log::debug!(
            "[GameSession] Hit {} ({:?}, +{})",
            id,
            outcome.grade,
            outcome.points
        );

        self.outbox.push(GameEvent::NoteHit {
            id: id.to_string(),
            perfect: outcome.perfect(),
            points_awarded: outcome.points,
        });
        self.emit_stats();
        self.check_finished();
        Some(outcome)
    }

    /// Resolve `id` as missed
    ///
    /// An id outside the current chart still breaks the combo but leaves
    /// notes and counters alone. Already resolved ids are ignored.
    ///
    /// # Returns
    /// `true` if a pending note was transitioned to Missed
    pub fn miss_note(&mut self, id: &str) -> bool {
        let Some(&index) = self.note_index.get(id) else {
            if self.board.combo > 0 {
                log::debug!("[GameSession] Miss for unknown note {}, combo reset", id);
                self.reset_combo();
            }
            return false;
        };
        if !self.notes[index].mark_missed() {
            return false;
        }

        self.board.register_miss();
        log::debug!("[GameSession] Missed {}", id);

        self.outbox.push(GameEvent::NoteMissed { id: id.to_string() });
        self.emit_stats();
        self.check_finished();
        true
    }

    pub fn add_score(&mut self, points: u64) {
        self.board.add_score(points);
        self.emit_stats();
    }

    pub fn reset_combo(&mut self) {
        self.board.reset_combo();
        self.emit_stats();
    }

    fn check_finished(&mut self) {
        if self.status != SessionStatus::Playing || self.notes.iter().any(Note::is_pending) {
            return;
        }
        let summary = self.summary();
        log::info!(
            "[GameSession] Finished: score {}, accuracy {:.1}%",
            summary.score,
            summary.accuracy
        );
        self.set_status(SessionStatus::Ended);
        self.outbox.push(GameEvent::SessionEnded { summary });
    }

    fn emit_stats(&mut self) {
        self.outbox.push(GameEvent::SessionStats(self.stats()));
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    /// Returns the clamped difficulty actually stored
    pub fn set_difficulty(&mut self, difficulty: i32) -> u8 {
        self.difficulty = clamp_difficulty(difficulty);
        self.difficulty
    }

    /// Returns the clamped volume actually stored
    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.volume = clamp_volume(volume);
        self.volume
    }

    // ========================================================================
    // READ ACCESS
    // ========================================================================

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &str) -> Option<&Note> {
        self.note_index.get(id).map(|&index| &self.notes[index])
    }

    pub fn board(&self) -> &ScoreBoard {
        &self.board
    }

    pub fn current_pitch(&self) -> Option<PitchSample> {
        self.current_pitch
    }

    pub fn target_pitch(&self) -> Option<f32> {
        self.target_pitch
    }

    pub fn difficulty(&self) -> u8 {
        self.difficulty
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            score: self.board.score,
            combo: self.board.combo,
            level: self.board.level,
            accuracy: self.board.accuracy_percent(),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            score: self.board.score,
            accuracy: self.board.accuracy_percent(),
            max_combo: self.board.max_combo,
            perfect_notes: self.board.perfect_notes,
            missed_notes: self.board.missed_notes,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            clock_ms: self.clock_ms,
            score: self.board.score,
            combo: self.board.combo,
            max_combo: self.board.max_combo,
            level: self.board.level,
            xp: self.board.xp,
            total_notes: self.board.total_notes,
            hit_notes: self.board.hit_notes,
            perfect_notes: self.board.perfect_notes,
            missed_notes: self.board.missed_notes,
            notes: self.notes.clone(),
            current_pitch: self.current_pitch,
            target_pitch: self.target_pitch,
            difficulty: self.difficulty,
            volume: self.volume,
        }
    }

    /// Take all queued events in production order
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.outbox)
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new(&GameConfig::default())
    }
}
