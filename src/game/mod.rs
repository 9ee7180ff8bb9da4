// Game module - chart generation, timing, judgement and scoring
//
// GameSession composes the pieces:
// - ChartGenerator: difficulty → ordered Pending notes
// - TimingEngine: active window and auto-miss over the game clock
// - JudgementEngine: pitch sample vs. active notes
// - ScoreBoard: points, combo, level/xp and counters

pub mod chart;
pub mod events;
pub mod judgement;
pub mod note;
pub mod scoring;
pub mod session;
pub mod timing;

pub use chart::{clamp_difficulty, ChartGenerator, ChartParams, Pattern, Scale};
pub use events::{GameEvent, SessionSnapshot, SessionStats, SessionStatus, SessionSummary};
pub use judgement::{Judgement, JudgementEngine};
pub use note::{Note, NoteId, NoteState};
pub use scoring::{clamp_volume, HitGrade, HitOutcome, ScoreBoard};
pub use session::GameSession;
pub use timing::{Sweep, TimingEngine};
