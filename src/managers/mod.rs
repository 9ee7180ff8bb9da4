// Managers Module
//
// Focused manager classes owned by the EngineHandle:
// - BroadcastChannelManager: Tokio broadcast channel for game events

pub mod broadcast_manager;

pub use broadcast_manager::BroadcastChannelManager;
