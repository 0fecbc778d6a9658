pub mod backend;
pub mod chunker;

pub use backend::{AudioCapture, AudioFrame, CaptureConfig, ScriptedCapture};
pub use chunker::{AlwaysGranted, AudioChunk, AudioChunker, ChunkerConfig, PermissionGate};
