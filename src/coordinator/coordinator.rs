use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{error, info, warn};

use super::log::{ChatMessage, ConversationLog};
use super::pacing::DisplayPacer;
use crate::audio::AudioChunk;
use crate::media::{MediaControl, StreamState};
use crate::signaling::{SignalingEvent, SignalingSession};

use anyhow::Result;

/// Orchestration glue between the signaling channel, the media negotiator,
/// and the microphone chunker.
///
/// Owns the conversation log and the display pacer; reacts to signaling
/// events in arrival order. A turn-completion event with a non-empty message
/// id is the sole trigger for (re)negotiating the media stream.
pub struct ConversationCoordinator {
    signaling: Arc<SignalingSession>,
    media: Arc<dyn MediaControl>,
    log: Mutex<ConversationLog>,
    pacer: Mutex<DisplayPacer>,
    turn_buffer: Mutex<String>,
    displayed_tx: watch::Sender<Option<String>>,
}

impl ConversationCoordinator {
    pub fn new(signaling: Arc<SignalingSession>, media: Arc<dyn MediaControl>) -> Self {
        let (displayed_tx, _) = watch::channel(None);

        Self {
            signaling,
            media,
            log: Mutex::new(ConversationLog::new()),
            pacer: Mutex::new(DisplayPacer::new()),
            turn_buffer: Mutex::new(String::new()),
            displayed_tx,
        }
    }

    /// Open the signaling channel for this session.
    pub async fn start(&self) -> Result<()> {
        self.signaling.connect().await
    }

    /// Forward user text. Appends to the conversation log only when the
    /// channel accepted the message; clearing input state is the caller's
    /// concern either way.
    pub async fn submit_text(&self, message: &str) -> bool {
        if !self.signaling.send_text(message).await {
            return false;
        }

        self.log
            .lock()
            .await
            .append(ChatMessage::from_user(message.trim()));
        true
    }

    /// Forward an encoded microphone chunk.
    pub async fn on_audio_chunk(&self, chunk: &AudioChunk) {
        if !self.signaling.send_audio_chunk(&chunk.payload).await {
            warn!(
                "Dropping audio chunk {}: signaling channel not open",
                chunk.sequence
            );
        }
    }

    /// Apply one signaling event. Events must be applied in arrival order.
    pub async fn handle_event(&self, event: SignalingEvent) {
        match event {
            SignalingEvent::Connected => info!("Signaling channel connected"),
            SignalingEvent::Disconnected => info!("Signaling channel disconnected"),
            SignalingEvent::TranscribedInput { text } => {
                self.log.lock().await.append(ChatMessage::from_user(text));
            }
            SignalingEvent::AgentFragment { text } => {
                self.turn_buffer.lock().await.push_str(&text);
                let mut pacer = self.pacer.lock().await;
                pacer.push_fragment(text);
                self.advance_display(&mut pacer);
            }
            SignalingEvent::TurnComplete { message_id } => {
                let reply = std::mem::take(&mut *self.turn_buffer.lock().await);
                if !reply.is_empty() {
                    self.log.lock().await.append(ChatMessage::from_agent(reply));
                }

                if message_id.is_empty() {
                    warn!("Turn completed without a message id; keeping current stream");
                    return;
                }

                // Sole trigger for stream (re)negotiation. Failures surface
                // only as the absence of a live stream.
                if let Err(e) = self.media.setup_stream(&message_id).await {
                    error!("Stream negotiation for turn {} failed: {:#}", message_id, e);
                }

                let mut pacer = self.pacer.lock().await;
                self.advance_display(&mut pacer);
            }
        }
    }

    /// The render layer finished animating the current displayed message.
    pub async fn display_complete(&self) {
        let mut pacer = self.pacer.lock().await;
        pacer.display_complete();
        self.advance_display(&mut pacer);
    }

    fn advance_display(&self, pacer: &mut DisplayPacer) {
        if let Some(text) = pacer.advance(self.media.is_streaming()) {
            self.displayed_tx.send_replace(Some(text));
        }
    }

    /// Watch the currently displayed agent message.
    pub fn subscribe_display(&self) -> watch::Receiver<Option<String>> {
        self.displayed_tx.subscribe()
    }

    /// Snapshot of the conversation log.
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.log.lock().await.entries().to_vec()
    }

    /// Drive the event loop: signaling events, microphone chunks, and stream
    /// state changes, each processed in arrival order.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<SignalingEvent>,
        mut chunks: mpsc::Receiver<AudioChunk>,
        mut stream_state: watch::Receiver<StreamState>,
    ) {
        let mut chunks_open = true;
        let mut state_open = true;

        loop {
            tokio::select! {
                maybe = events.recv() => match maybe {
                    Some(event) => self.handle_event(event).await,
                    None => break,
                },
                maybe = chunks.recv(), if chunks_open => match maybe {
                    Some(chunk) => self.on_audio_chunk(&chunk).await,
                    None => chunks_open = false,
                },
                changed = stream_state.changed(), if state_open => match changed {
                    Ok(()) => {
                        let mut pacer = self.pacer.lock().await;
                        self.advance_display(&mut pacer);
                    }
                    Err(_) => state_open = false,
                },
            }
        }

        info!("Coordinator event loop stopped");
    }

    /// Tear down the session. Idempotent at the protocol level: the backend
    /// is notified only when a channel was actually open.
    pub async fn shutdown(&self) {
        let was_open = self.signaling.close().await;
        self.media.stop_stream().await;

        if was_open {
            if let Err(e) = self.signaling.notify_session_closed().await {
                warn!("Session close notification failed: {:#}", e);
            }
        }
    }
}
