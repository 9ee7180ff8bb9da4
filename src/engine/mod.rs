//! Engine module housing the session actor.
//!
//! `clock` provides the time sources and the pause-aware game clock; `core`
//! provides the `EngineHandle` that owns the actor thread and the capture
//! worker.

pub mod clock;
pub mod core;

pub use clock::{GameClock, ManualTimeSource, SystemTimeSource, TimeSource};
pub use core::{EngineHandle, EngineOptions, SessionCommand};
