// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 2001-2002
pub struct SessionErrorCodes;

impl SessionErrorCodes {
    /// The session actor is no longer accepting commands
    pub const ACTOR_STOPPED: i32 = 2001;

    /// A background thread panicked before it could be joined
    pub const WORKER_PANICKED: i32 = 2002;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionActor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the engine handle when talking to the session actor
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// Command channel closed (actor shut down)
    ActorStopped,

    /// Thread join reported a panic
    WorkerPanicked { worker: String },
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::ActorStopped => SessionErrorCodes::ACTOR_STOPPED,
            SessionError::WorkerPanicked { .. } => SessionErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::ActorStopped => "Session actor is not running".to_string(),
            SessionError::WorkerPanicked { worker } => {
                format!("Worker thread panicked: {}", worker)
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        assert_eq!(
            SessionError::ActorStopped.code(),
            SessionErrorCodes::ACTOR_STOPPED
        );
        assert_eq!(
            SessionError::WorkerPanicked {
                worker: "capture".to_string()
            }
            .code(),
            SessionErrorCodes::WORKER_PANICKED
        );
    }

    #[test]
    fn test_error_code_trait_object() {
        let err: &dyn ErrorCode = &SessionError::ActorStopped;
        assert_eq!(err.code(), 2001);
        assert!(err.message().contains("not running"));
    }
}
