// Vocal Rhythm Core - Rust game engine
// Real-time pitch estimation feeding a deterministic rhythm game session

pub mod analysis;
pub mod audio;
pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod managers;

pub use analysis::{note_name, NoteName, PitchEstimate, PitchEstimator, PitchSample};
pub use config::AppConfig;
pub use engine::{EngineHandle, EngineOptions};
pub use error::{AudioError, ErrorCode, SessionError};
pub use game::{GameEvent, GameSession, SessionSnapshot, SessionStatus, SessionSummary};
