use serde::{Deserialize, Serialize};

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_AUDIO: &str = "audio/pcm";
pub const MIME_TRANSCRIBED_INPUT: &str = "text/plain/input";
pub const MIME_AGENT_OUTPUT: &str = "text/plain/output";

/// Outbound frame carrying user text or an encoded audio chunk.
///
/// Identifier keys are camelCase on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub mime_type: String,
    pub data: String,
    #[serde(rename = "sessionId")]
    pub session_id: String,
    #[serde(rename = "agentId")]
    pub agent_id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

impl OutboundFrame {
    pub fn text(data: &str, session_id: &str, agent_id: &str, user_id: &str) -> Self {
        Self {
            mime_type: MIME_TEXT.to_string(),
            data: data.to_string(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            user_id: user_id.to_string(),
        }
    }

    pub fn audio_chunk(payload: &str, session_id: &str, agent_id: &str, user_id: &str) -> Self {
        Self {
            mime_type: MIME_AUDIO.to_string(),
            data: payload.to_string(),
            session_id: session_id.to_string(),
            agent_id: agent_id.to_string(),
            user_id: user_id.to_string(),
        }
    }
}

/// Inbound frame as it appears on the wire. Field presence decides the kind.
#[derive(Debug, Deserialize)]
struct InboundFrame {
    mime_type: Option<String>,
    data: Option<String>,
    turn_complete: Option<bool>,
    id_msg: Option<String>,
}

/// Typed events dispatched from the signaling channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingEvent {
    Connected,
    Disconnected,
    /// User's spoken words as recognized by the backend
    TranscribedInput { text: String },
    /// One fragment of the agent's reply; fragments accumulate until the
    /// turn-completion event arrives
    AgentFragment { text: String },
    /// The reply is finished; the message id requests the matching media stream
    TurnComplete { message_id: String },
}

/// Parse one wire frame into its events, preserving the dispatch order
/// (payload first, then turn completion).
///
/// A frame may carry both the turn flag and a payload; the payload belongs
/// to the turn being closed, so it must dispatch before the completion.
/// Unknown mime types yield no events.
pub fn parse_frame(raw: &str) -> Result<Vec<SignalingEvent>, serde_json::Error> {
    let frame: InboundFrame = serde_json::from_str(raw)?;
    let mut events = Vec::new();

    match frame.mime_type.as_deref() {
        Some(MIME_TRANSCRIBED_INPUT) => events.push(SignalingEvent::TranscribedInput {
            text: frame.data.unwrap_or_default(),
        }),
        Some(MIME_AGENT_OUTPUT) => events.push(SignalingEvent::AgentFragment {
            text: frame.data.unwrap_or_default(),
        }),
        _ => {}
    }

    if frame.turn_complete == Some(true) {
        events.push(SignalingEvent::TurnComplete {
            message_id: frame.id_msg.unwrap_or_default(),
        });
    }

    Ok(events)
}
