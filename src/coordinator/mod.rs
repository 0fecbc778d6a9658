//! Conversation orchestration
//!
//! This module provides the `ConversationCoordinator` that ties together:
//! - The signaling channel (user text/audio out, agent events in)
//! - Media stream negotiation on turn completion
//! - The append-only conversation log
//! - Display pacing of agent text against avatar playback

mod coordinator;
mod log;
mod pacing;

pub use coordinator::ConversationCoordinator;
pub use log::{ChatMessage, ConversationLog, Direction};
pub use pacing::DisplayPacer;
