//! Event sink payloads and read-only session views.

use serde::{Deserialize, Serialize};

use super::note::{Note, NoteId};
use crate::analysis::PitchSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Playing,
    Paused,
    Ended,
}

/// HUD numbers pushed after every scoring change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub score: u64,
    pub combo: u32,
    pub level: u32,
    /// Percentage of judged notes that were hit
    pub accuracy: f32,
}

/// What the app persists for a finished run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub score: u64,
    pub accuracy: f32,
    pub max_combo: u32,
    pub perfect_notes: u32,
    pub missed_notes: u32,
}

/// Outbound notifications, in the order the session produced them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    NoteHit {
        id: NoteId,
        perfect: bool,
        points_awarded: u64,
    },
    NoteMissed {
        id: NoteId,
    },
    PitchUpdated {
        frequency: Option<f32>,
    },
    SessionStats(SessionStats),
    StatusChanged {
        status: SessionStatus,
    },
    SessionEnded {
        summary: SessionSummary,
    },
}

/// Immutable copy of the whole session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub clock_ms: u64,
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub level: u32,
    pub xp: u64,
    pub total_notes: u32,
    pub hit_notes: u32,
    pub perfect_notes: u32,
    pub missed_notes: u32,
    pub notes: Vec<Note>,
    pub current_pitch: Option<PitchSample>,
    pub target_pitch: Option<f32>,
    pub difficulty: u8,
    pub volume: f32,
}

impl SessionSnapshot {
    pub fn accuracy_percent(&self) -> f32 {
        if self.total_notes == 0 {
            0.0
        } else {
            self.hit_notes as f32 / self.total_notes as f32 * 100.0
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            score: self.score,
            accuracy: self.accuracy_percent(),
            max_combo: self.max_combo,
            perfect_notes: self.perfect_notes,
            missed_notes: self.missed_notes,
        }
    }
}
