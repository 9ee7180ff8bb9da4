//! ChartGenerator - reproducible note charts per difficulty
//!
//! Difficulty picks the scale, the melodic pattern, the note count and the
//! spacing. The only randomness (the random-walk pattern) comes from a
//! `StdRng` seeded with the configured chart seed and the difficulty, so a
//! given (difficulty, seed) pair always yields the same chart.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::note::{Note, NoteState};
use crate::config::GameConfig;

/// Middle C, root of every chart
pub const TONIC_HZ: f64 = 261.63;

pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 10;

/// Clamp any integer difficulty into 1..=10
pub fn clamp_difficulty(difficulty: i32) -> u8 {
    difficulty.clamp(MIN_DIFFICULTY as i32, MAX_DIFFICULTY as i32) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Pentatonic,
    Major,
    NaturalMinor,
    Blues,
}

impl Scale {
    pub fn for_difficulty(difficulty: u8) -> Self {
        match difficulty {
            0..=3 => Scale::Pentatonic,
            4..=6 => Scale::Major,
            7..=8 => Scale::NaturalMinor,
            _ => Scale::Blues,
        }
    }

    /// Semitone offsets from the tonic
    pub fn intervals(&self) -> &'static [u8] {
        match self {
            Scale::Pentatonic => &[0, 2, 4, 7, 9],
            Scale::Major => &[0, 2, 4, 5, 7, 9, 11],
            Scale::NaturalMinor => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    Ascending,
    Descending,
    Arpeggio,
    RandomWalk,
    Wave,
}

impl Pattern {
    const ROTATION: [Pattern; 5] = [
        Pattern::Ascending,
        Pattern::Descending,
        Pattern::Arpeggio,
        Pattern::RandomWalk,
        Pattern::Wave,
    ];

    pub fn for_difficulty(difficulty: u8) -> Self {
        Self::ROTATION[difficulty as usize % Self::ROTATION.len()]
    }
}

/// Everything derived from a difficulty before any note is placed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartParams {
    pub difficulty: u8,
    pub scale: Scale,
    pub pattern: Pattern,
    pub note_count: usize,
    pub interval_ms: u64,
    pub duration_ms: u64,
}

impl ChartParams {
    pub fn for_difficulty(difficulty: i32) -> Self {
        let d = clamp_difficulty(difficulty);
        let d64 = d as u64;
        Self {
            difficulty: d,
            scale: Scale::for_difficulty(d),
            pattern: Pattern::for_difficulty(d),
            note_count: (10 + 2 * d as usize).min(25),
            interval_ms: 2500u64.saturating_sub(150 * d64).max(1000),
            duration_ms: 1200u64.saturating_sub(40 * d64).max(800),
        }
    }
}

/// Equal-tempered frequency `semitone` steps above the tonic, rounded to 0.01 Hz
pub fn semitone_frequency(semitone: u8) -> f32 {
    let hz = TONIC_HZ * 2f64.powf(semitone as f64 / 12.0);
    ((hz * 100.0).round() / 100.0) as f32
}

#[derive(Debug, Clone)]
pub struct ChartGenerator {
    lane_count: u32,
    seed: u64,
}

impl ChartGenerator {
    pub fn new(lane_count: u32, seed: u64) -> Self {
        Self {
            lane_count: lane_count.max(1),
            seed,
        }
    }

    pub fn from_config(config: &GameConfig) -> Self {
        Self::new(config.lane_count, config.chart_seed)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Generate the chart for `difficulty` (clamped to 1..=10)
    ///
    /// Notes come back Pending, ordered by strictly increasing target time.
    pub fn generate(&self, difficulty: i32) -> Vec<Note> {
        let params = ChartParams::for_difficulty(difficulty);
        let semitones = self.melody(&params);

        semitones
            .into_iter()
            .enumerate()
            .map(|(i, semitone)| Note {
                id: Note::id_for_index(i),
                frequency: semitone_frequency(semitone),
                target_time_ms: i as u64 * params.interval_ms,
                duration_ms: params.duration_ms,
                lane: semitone as u32 % self.lane_count,
                state: NoteState::Pending,
                perfect: false,
            })
            .collect()
    }

    fn melody(&self, params: &ChartParams) -> Vec<u8> {
        let scale = params.scale.intervals();
        let len = scale.len();
        let count = params.note_count;

        match params.pattern {
            Pattern::Ascending => (0..count).map(|i| scale[i % len]).collect(),
            Pattern::Descending => (0..count).map(|i| scale[len - 1 - (i % len)]).collect(),
            Pattern::Arpeggio => (0..count).map(|i| scale[(i * 2) % len]).collect(),
            Pattern::RandomWalk => {
                let mut rng = StdRng::seed_from_u64(self.walk_seed(params.difficulty));
                let mut degree: i64 = 0;
                (0..count)
                    .map(|i| {
                        if i > 0 {
                            degree = (degree + rng.gen_range(-2..=2)).clamp(0, len as i64 - 1);
                        }
                        scale[degree as usize]
                    })
                    .collect()
            }
            Pattern::Wave => (0..count)
                .map(|i| {
                    let phase = i as f64 / count as f64 * 4.0 * std::f64::consts::PI;
                    let position = phase.sin() * 0.5 + 0.5;
                    let index = ((position * len as f64).floor() as usize).min(len - 1);
                    scale[index]
                })
                .collect(),
        }
    }

    fn walk_seed(&self, difficulty: u8) -> u64 {
        self.seed ^ (difficulty as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

impl Default for ChartGenerator {
    fn default() -> Self {
        Self::from_config(&GameConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_by_difficulty() {
        let easy = ChartParams::for_difficulty(1);
        assert_eq!(easy.scale, Scale::Pentatonic);
        assert_eq!(easy.pattern, Pattern::Descending);
        assert_eq!(easy.note_count, 12);
        assert_eq!(easy.interval_ms, 2350);
        assert_eq!(easy.duration_ms, 1160);

        let hard = ChartParams::for_difficulty(10);
        assert_eq!(hard.scale, Scale::Blues);
        assert_eq!(hard.pattern, Pattern::Ascending);
        assert_eq!(hard.note_count, 25);
        assert_eq!(hard.interval_ms, 1000);
        assert_eq!(hard.duration_ms, 800);

        assert_eq!(ChartParams::for_difficulty(7).scale, Scale::NaturalMinor);
        assert_eq!(ChartParams::for_difficulty(5).pattern, Pattern::Ascending);
        assert_eq!(ChartParams::for_difficulty(8).pattern, Pattern::RandomWalk);
        assert_eq!(ChartParams::for_difficulty(9).pattern, Pattern::Wave);
    }

    #[test]
    fn test_out_of_range_difficulty_is_clamped() {
        assert_eq!(ChartParams::for_difficulty(-3), ChartParams::for_difficulty(1));
        assert_eq!(ChartParams::for_difficulty(42), ChartParams::for_difficulty(10));
    }

    #[test]
    fn test_descending_pentatonic_chart() {
        let notes = ChartGenerator::new(4, 0).generate(1);
        assert_eq!(notes.len(), 12);

        // 9, 7, 4, 2, 0, 9, ...
        assert_eq!(notes[0].frequency, 440.0);
        assert_eq!(notes[1].frequency, 392.0);
        assert_eq!(notes[4].frequency, 261.63);
        assert_eq!(notes[5].frequency, 440.0);
        assert_eq!(notes[0].lane, 1);
        assert_eq!(notes[1].lane, 3);
        assert_eq!(notes[4].lane, 0);

        for (i, note) in notes.iter().enumerate() {
            assert_eq!(note.id, format!("note-{}", i));
            assert_eq!(note.target_time_ms, i as u64 * 2350);
            assert_eq!(note.state, NoteState::Pending);
            assert!(!note.perfect);
        }
    }

    #[test]
    fn test_wave_stays_in_scale() {
        let notes = ChartGenerator::new(4, 0).generate(9);
        let allowed: Vec<f32> = Scale::Blues
            .intervals()
            .iter()
            .map(|&s| semitone_frequency(s))
            .collect();
        assert_eq!(notes.len(), 25);
        assert!(notes.iter().all(|n| allowed.contains(&n.frequency)));
        // sin(0) lands mid-scale
        assert_eq!(notes[0].frequency, semitone_frequency(6));
    }

    #[test]
    fn test_random_walk_is_seeded() {
        let a = ChartGenerator::new(4, 99).generate(8);
        let b = ChartGenerator::new(4, 99).generate(8);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );

        // Starts on the tonic and never leaves the scale
        assert_eq!(a[0].frequency, 261.63);
        let allowed: Vec<f32> = Scale::NaturalMinor
            .intervals()
            .iter()
            .map(|&s| semitone_frequency(s))
            .collect();
        assert!(a.iter().all(|n| allowed.contains(&n.frequency)));
    }

    #[test]
    fn test_target_times_strictly_increase() {
        let generator = ChartGenerator::default();
        for d in 1..=10 {
            let notes = generator.generate(d);
            assert!(notes
                .windows(2)
                .all(|w| w[0].target_time_ms < w[1].target_time_ms));
        }
    }

    #[test]
    fn test_semitone_frequency_rounding() {
        assert_eq!(semitone_frequency(0), 261.63);
        assert_eq!(semitone_frequency(12), 523.26);
    }
}
