//! Signaling channel to the conversation backend
//!
//! This module owns the persistent WebSocket carrying conversation text,
//! encoded audio chunks, and turn notifications, plus the HTTP calls that
//! register and close the session:
//! - POST /inferenceRT/initialize_websocket - after the transport opens
//! - POST /inferenceRT/close_websocket - on explicit termination
//! - wss://<host>/inferenceRT/ws/{session_id}/{agent_id} - the channel itself

pub mod control;
pub mod messages;
mod session;

pub use control::SessionControlClient;
pub use messages::{parse_frame, OutboundFrame, SignalingEvent};
pub use session::{SessionIds, SignalingSession};
