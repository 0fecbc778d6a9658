pub mod audio;
pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod media;
pub mod signaling;

pub use audio::{
    AlwaysGranted, AudioCapture, AudioChunk, AudioChunker, AudioFrame, CaptureConfig,
    ChunkerConfig, PermissionGate, ScriptedCapture,
};
pub use catalog::{Avatar, AvatarQuery, CatalogClient};
pub use config::Config;
pub use coordinator::{ChatMessage, ConversationCoordinator, ConversationLog, Direction, DisplayPacer};
pub use media::{
    ApiOfferTransport, LiveOffer, MediaControl, MediaEvent, MediaNegotiator, OfferTransport,
    RemoteDescription, StreamState,
};
pub use signaling::{OutboundFrame, SessionControlClient, SessionIds, SignalingEvent, SignalingSession};
