use serde::{Deserialize, Serialize};

/// Unique note identifier ("note-<index>")
pub type NoteId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    Pending,
    Hit,
    Missed,
}

/// One target note of a chart
///
/// A note leaves `Pending` exactly once and never goes back. `perfect` is
/// only ever set together with the transition to `Hit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Target pitch in Hz
    pub frequency: f32,
    /// Offset from session start
    pub target_time_ms: u64,
    pub duration_ms: u64,
    pub lane: u32,
    pub state: NoteState,
    pub perfect: bool,
}

impl Note {
    pub fn id_for_index(index: usize) -> NoteId {
        format!("note-{}", index)
    }

    pub fn is_pending(&self) -> bool {
        self.state == NoteState::Pending
    }

    /// First clock value at which the note can be active
    pub fn window_open_ms(&self, lookbehind_ms: u64) -> u64 {
        self.target_time_ms.saturating_sub(lookbehind_ms)
    }

    /// Last clock value at which the note can be active
    pub fn window_close_ms(&self, lookahead_ms: u64) -> u64 {
        self.target_time_ms
            .saturating_add(self.duration_ms)
            .saturating_add(lookahead_ms)
    }

    /// `clock − target > duration + grace`
    pub fn is_overdue(&self, clock_ms: u64, grace_ms: u64) -> bool {
        clock_ms.saturating_sub(self.target_time_ms) > self.duration_ms.saturating_add(grace_ms)
    }

    /// Pending → Hit. Returns `false` if the note was already resolved.
    pub fn mark_hit(&mut self, perfect: bool) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.state = NoteState::Hit;
        self.perfect = perfect;
        true
    }

    /// Pending → Missed. Returns `false` if the note was already resolved.
    pub fn mark_missed(&mut self) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.state = NoteState::Missed;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(target: u64) -> Note {
        Note {
            id: Note::id_for_index(0),
            frequency: 261.63,
            target_time_ms: target,
            duration_ms: 1000,
            lane: 0,
            state: NoteState::Pending,
            perfect: false,
        }
    }

    #[test]
    fn test_transitions_happen_once() {
        let mut n = note(0);
        assert!(n.mark_hit(true));
        assert!(!n.mark_missed());
        assert!(!n.mark_hit(false));
        assert_eq!(n.state, NoteState::Hit);
        assert!(n.perfect);

        let mut m = note(0);
        assert!(m.mark_missed());
        assert!(!m.mark_hit(true));
        assert_eq!(m.state, NoteState::Missed);
        assert!(!m.perfect);
    }

    #[test]
    fn test_window_edges() {
        let n = note(1000);
        assert_eq!(n.window_open_ms(2000), 0);
        assert_eq!(n.window_close_ms(1000), 3000);

        // Overdue strictly after target + duration + grace
        assert!(!n.is_overdue(2500, 500));
        assert!(n.is_overdue(2501, 500));
        assert!(!n.is_overdue(0, 500));
    }

    #[test]
    fn test_serializes_state_in_snake_case() {
        let json = serde_json::to_string(&note(0)).unwrap();
        assert!(json.contains("\"state\":\"pending\""));
        assert!(json.contains("\"id\":\"note-0\""));
    }
}
