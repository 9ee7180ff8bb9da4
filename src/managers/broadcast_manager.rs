// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::game::GameEvent;

/// Buffered game events per subscriber before it starts lagging
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Manages the game event broadcast channel
///
/// The session actor publishes through the sender returned by
/// `init_events`; any number of collaborators subscribe. A subscriber that
/// falls more than `EVENT_CHANNEL_CAPACITY` events behind receives
/// `RecvError::Lagged` and skips ahead.
pub struct BroadcastChannelManager {
    events: Arc<Mutex<Option<broadcast::Sender<GameEvent>>>>,
}

impl BroadcastChannelManager {
    /// Create a manager with the channel uninitialized
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(None)),
        }
    }

    // ========================================================================
    // GAME EVENT CHANNEL
    // ========================================================================

    /// Initialize the game event channel, replacing any previous one
    ///
    /// # Returns
    /// `broadcast::Sender<GameEvent>` - Sender for the session actor
    pub fn init_events(&self) -> broadcast::Sender<GameEvent> {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        if let Ok(mut guard) = self.events.lock() {
            *guard = Some(tx.clone());
        }
        tx
    }

    /// Subscribe to game events
    ///
    /// # Returns
    /// `None` if `init_events()` has not been called yet
    pub fn subscribe_events(&self) -> Option<broadcast::Receiver<GameEvent>> {
        self.events
            .lock()
            .ok()?
            .as_ref()
            .map(|tx| tx.subscribe())
    }

    /// Get the sender, if initialized
    pub fn events_sender(&self) -> Option<broadcast::Sender<GameEvent>> {
        self.events.lock().ok()?.clone()
    }

    /// Drop the stored sender; receivers see `Closed` once the actor's clone goes too
    pub fn close_events(&self) {
        if let Ok(mut guard) = self.events.lock() {
            guard.take();
        }
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
