//! ScoringEngine - points, combo, level and note counters

use serde::{Deserialize, Serialize};

/// Score needed per level; xp is the remainder
pub const XP_PER_LEVEL: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitGrade {
    Perfect,
    Good,
    Okay,
    Weak,
}

impl HitGrade {
    pub fn from_accuracy(accuracy: f32) -> Self {
        if accuracy >= 0.95 {
            HitGrade::Perfect
        } else if accuracy >= 0.75 {
            HitGrade::Good
        } else if accuracy >= 0.5 {
            HitGrade::Okay
        } else {
            HitGrade::Weak
        }
    }
}

/// Multiplier for the combo held before the hit
pub fn combo_multiplier(combo: u32) -> u64 {
    match combo {
        50.. => 4,
        25..=49 => 3,
        10..=24 => 2,
        _ => 1,
    }
}

/// Points for a hit of `grade` with `combo` consecutive hits before it
pub fn points_for(grade: HitGrade, combo: u32) -> u64 {
    let combo = combo as u64;
    let base = match grade {
        HitGrade::Perfect => 100 + 15 * combo,
        HitGrade::Good => 75 + 10 * combo,
        HitGrade::Okay => 50 + 5 * combo,
        HitGrade::Weak => 25,
    };
    base * combo_multiplier(combo as u32)
}

/// What a registered hit was worth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitOutcome {
    pub grade: HitGrade,
    pub points: u64,
}

impl HitOutcome {
    pub fn perfect(&self) -> bool {
        self.grade == HitGrade::Perfect
    }
}

/// Per-run scoring state
///
/// Keeps `combo ≤ max_combo`, `level = score / 10000 + 1`,
/// `xp = score mod 10000` and `hit_notes + missed_notes = total_notes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBoard {
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub level: u32,
    pub xp: u64,
    pub total_notes: u32,
    pub hit_notes: u32,
    pub perfect_notes: u32,
    pub missed_notes: u32,
}

impl Default for ScoreBoard {
    fn default() -> Self {
        Self {
            score: 0,
            combo: 0,
            max_combo: 0,
            level: 1,
            xp: 0,
            total_notes: 0,
            hit_notes: 0,
            perfect_notes: 0,
            missed_notes: 0,
        }
    }
}

impl ScoreBoard {
    /// Score a hit; `accuracy` is clamped to 0.0-1.0 (NaN counts as 0)
    pub fn register_hit(&mut self, accuracy: f32) -> HitOutcome {
        let accuracy = if accuracy.is_nan() {
            0.0
        } else {
            accuracy.clamp(0.0, 1.0)
        };
        let grade = HitGrade::from_accuracy(accuracy);
        let points = points_for(grade, self.combo);

        self.score = self.score.saturating_add(points);
        self.combo += 1;
        self.max_combo = self.max_combo.max(self.combo);
        self.hit_notes += 1;
        self.total_notes += 1;
        if grade == HitGrade::Perfect {
            self.perfect_notes += 1;
        }
        self.refresh_level();

        HitOutcome { grade, points }
    }

    pub fn register_miss(&mut self) {
        self.combo = 0;
        self.missed_notes += 1;
        self.total_notes += 1;
    }

    /// Bonus points outside note judgement
    pub fn add_score(&mut self, points: u64) {
        self.score = self.score.saturating_add(points);
        self.refresh_level();
    }

    pub fn reset_combo(&mut self) {
        self.combo = 0;
    }

    /// `hit / total * 100`, or 0 before any note was judged
    pub fn accuracy_percent(&self) -> f32 {
        if self.total_notes == 0 {
            0.0
        } else {
            self.hit_notes as f32 / self.total_notes as f32 * 100.0
        }
    }

    fn refresh_level(&mut self) {
        self.level = (self.score / XP_PER_LEVEL) as u32 + 1;
        self.xp = self.score % XP_PER_LEVEL;
    }
}

/// Clamp to 0.0-1.0; non-finite input becomes 0
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_finite() {
        volume.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grades() {
        assert_eq!(HitGrade::from_accuracy(1.0), HitGrade::Perfect);
        assert_eq!(HitGrade::from_accuracy(0.95), HitGrade::Perfect);
        assert_eq!(HitGrade::from_accuracy(0.9), HitGrade::Good);
        assert_eq!(HitGrade::from_accuracy(0.75), HitGrade::Good);
        assert_eq!(HitGrade::from_accuracy(0.5), HitGrade::Okay);
        assert_eq!(HitGrade::from_accuracy(0.49), HitGrade::Weak);
    }

    #[test]
    fn test_multiplier_thresholds() {
        assert_eq!(combo_multiplier(0), 1);
        assert_eq!(combo_multiplier(9), 1);
        assert_eq!(combo_multiplier(10), 2);
        assert_eq!(combo_multiplier(25), 3);
        assert_eq!(combo_multiplier(49), 3);
        assert_eq!(combo_multiplier(50), 4);
    }

    #[test]
    fn test_points_table() {
        assert_eq!(points_for(HitGrade::Perfect, 0), 100);
        assert_eq!(points_for(HitGrade::Good, 0), 75);
        assert_eq!(points_for(HitGrade::Okay, 0), 50);
        assert_eq!(points_for(HitGrade::Weak, 0), 25);
        assert_eq!(points_for(HitGrade::Perfect, 10), (100 + 150) * 2);
        assert_eq!(points_for(HitGrade::Weak, 50), 100);
    }

    #[test]
    fn test_hit_and_miss_update_counters() {
        let mut board = ScoreBoard::default();
        let outcome = board.register_hit(0.95);
        assert!(outcome.perfect());
        assert_eq!(board.score, 100);
        assert_eq!(board.combo, 1);
        assert_eq!(board.max_combo, 1);
        assert_eq!(board.perfect_notes, 1);

        board.register_hit(0.8);
        assert_eq!(board.score, 100 + 85);
        assert_eq!(board.combo, 2);

        board.register_miss();
        assert_eq!(board.combo, 0);
        assert_eq!(board.max_combo, 2);
        assert_eq!(board.total_notes, 3);
        assert_eq!(board.hit_notes + board.missed_notes, board.total_notes);
        assert!((board.accuracy_percent() - 66.666_67).abs() < 0.01);
    }

    #[test]
    fn test_level_and_xp_follow_score() {
        let mut board = ScoreBoard::default();
        board.add_score(25_250);
        assert_eq!(board.level, 3);
        assert_eq!(board.xp, 5_250);
    }

    #[test]
    fn test_accuracy_input_is_clamped() {
        let mut board = ScoreBoard::default();
        assert_eq!(board.register_hit(3.0).grade, HitGrade::Perfect);
        assert_eq!(board.register_hit(-1.0).grade, HitGrade::Weak);
        assert_eq!(board.register_hit(f32::NAN).grade, HitGrade::Weak);
    }

    #[test]
    fn test_volume_clamp() {
        assert_eq!(clamp_volume(-0.1), 0.0);
        assert_eq!(clamp_volume(1.5), 1.0);
        assert_eq!(clamp_volume(0.3), 0.3);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
    }
}
