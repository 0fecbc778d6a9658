use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use super::control::SessionControlClient;
use super::messages::{parse_frame, OutboundFrame, SignalingEvent};

/// Identifiers for one conversation instance. Stable for the process
/// lifetime unless explicitly reset.
#[derive(Debug, Clone)]
pub struct SessionIds {
    pub session_id: String,
    pub user_id: String,
    pub agent_id: String,
}

impl SessionIds {
    /// Generates a client-side session id when none was persisted.
    pub fn new(user_id: impl Into<String>, agent_id: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            session_id: session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            user_id: user_id.into(),
            agent_id: agent_id.into(),
        }
    }
}

/// Persistent bidirectional message channel to the conversation backend.
///
/// Owns the one underlying transport connection, translates the wire protocol
/// into [`SignalingEvent`]s delivered in arrival order, and carries outbound
/// user text and audio. Does not reconnect on unexpected closure; callers
/// decide when to `connect` again.
pub struct SignalingSession {
    ids: SessionIds,
    ws_base: String,
    control: SessionControlClient,
    events_tx: mpsc::UnboundedSender<SignalingEvent>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    connected: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl SignalingSession {
    /// Create a session and the receiving end of its event stream.
    pub fn new(
        ids: SessionIds,
        ws_base: String,
        control: SessionControlClient,
    ) -> (Self, mpsc::UnboundedReceiver<SignalingEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let session = Self {
            ids,
            ws_base,
            control,
            events_tx,
            outbound: Mutex::new(None),
            connected: Arc::new(AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        };

        (session, events_rx)
    }

    pub fn ids(&self) -> &SessionIds {
        &self.ids
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Open the channel. No-op when session or agent id is absent. A second
    /// call always closes the previous transport before reopening.
    pub async fn connect(&self) -> Result<()> {
        if self.ids.session_id.is_empty() || self.ids.agent_id.is_empty() {
            warn!("Session or agent id missing, not connecting");
            return Ok(());
        }

        self.close().await;

        let url = format!(
            "{}/inferenceRT/ws/{}/{}",
            self.ws_base.trim_end_matches('/'),
            self.ids.session_id,
            self.ids.agent_id
        );
        info!("Connecting signaling channel: {}", url);

        let (ws, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .context("Failed to open signaling channel")?;
        let (mut sink, mut stream) = ws.split();

        // Writer task owns the sink; senders queue frames without blocking.
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                let closing = matches!(msg, Message::Close(_));
                if let Err(e) = sink.send(msg).await {
                    warn!("Signaling send failed: {}", e);
                    break;
                }
                if closing {
                    break;
                }
            }
        });

        // Session registration is fire-and-forget; the channel is usable
        // whether or not it lands.
        let control = self.control.clone();
        let session_id = self.ids.session_id.clone();
        let agent_id = self.ids.agent_id.clone();
        tokio::spawn(async move {
            if let Err(e) = control.initialize_websocket(&session_id, &agent_id).await {
                warn!("Session registration failed: {:#}", e);
            }
        });

        *self.outbound.lock().await = Some(out_tx);
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events_tx.send(SignalingEvent::Connected);

        let events_tx = self.events_tx.clone();
        let connected = Arc::clone(&self.connected);
        let reader = tokio::spawn(async move {
            while let Some(frame) = stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match parse_frame(&text) {
                        Ok(events) => {
                            for event in events {
                                if events_tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => warn!("Dropping malformed signaling frame: {}", e),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {} // pings are answered by the transport, binary is ignored
                    Err(e) => {
                        warn!("Signaling channel error: {}", e);
                        break;
                    }
                }
            }

            if connected.swap(false, Ordering::SeqCst) {
                let _ = events_tx.send(SignalingEvent::Disconnected);
            }
            info!("Signaling channel closed");
        });

        *self.reader_task.lock().await = Some(reader);

        Ok(())
    }

    /// Send user text. Returns false for empty/whitespace input or when no
    /// transport is open; the caller appends to the conversation log only on
    /// a true return.
    pub async fn send_text(&self, message: &str) -> bool {
        let message = message.trim();
        if message.is_empty() || !self.is_connected() {
            return false;
        }

        let frame = OutboundFrame::text(
            message,
            &self.ids.session_id,
            &self.ids.agent_id,
            &self.ids.user_id,
        );
        self.send_frame(&frame).await
    }

    /// Send an encoded microphone chunk. Never appended to the visible log;
    /// the backend echoes recognized speech as a transcribed-input event.
    pub async fn send_audio_chunk(&self, payload: &str) -> bool {
        if payload.is_empty() || !self.is_connected() {
            return false;
        }

        let frame = OutboundFrame::audio_chunk(
            payload,
            &self.ids.session_id,
            &self.ids.agent_id,
            &self.ids.user_id,
        );
        self.send_frame(&frame).await
    }

    async fn send_frame(&self, frame: &OutboundFrame) -> bool {
        let guard = self.outbound.lock().await;
        let Some(tx) = guard.as_ref() else {
            return false;
        };

        match serde_json::to_string(frame) {
            Ok(json) => tx.send(Message::Text(json)).is_ok(),
            Err(e) => {
                error!("Failed to serialize outbound frame: {}", e);
                false
            }
        }
    }

    /// Idempotent: closes the transport if open and marks the channel
    /// disconnected. Returns whether a transport was actually open, so
    /// callers can skip protocol-level close notifications on repeat calls.
    pub async fn close(&self) -> bool {
        if let Some(tx) = self.outbound.lock().await.take() {
            let _ = tx.send(Message::Close(None));
        }

        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }

        if self.connected.swap(false, Ordering::SeqCst) {
            let _ = self.events_tx.send(SignalingEvent::Disconnected);
            return true;
        }

        false
    }

    /// Caller-invoked notification of explicit session termination.
    pub async fn notify_session_closed(&self) -> Result<()> {
        self.control.close_websocket(&self.ids.session_id).await
    }
}
