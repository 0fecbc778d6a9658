use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_transceiver_direction::RTCRtpTransceiverDirection;
use webrtc::rtp_transceiver::RTCRtpTransceiverInit;
use webrtc::track::track_remote::TrackRemote;

use super::transport::{LiveOffer, OfferTransport};
use crate::config::IceConfig;

/// Media stream lifecycle, observable by the render layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Streaming,
    Failed,
}

/// Side-channel events surfaced from the media path.
#[derive(Debug, Clone)]
pub enum MediaEvent {
    /// The server finished playing the current reply; the stream is torn down.
    PlaybackFinished,
    /// Text delivered over the auxiliary `chat` data channel.
    ChatText(String),
}

/// Control surface the coordinator drives. Implemented by
/// [`MediaNegotiator`]; tests substitute their own.
#[async_trait]
pub trait MediaControl: Send + Sync {
    async fn setup_stream(&self, turn_message_id: &str) -> Result<()>;
    async fn stop_stream(&self);
    fn is_streaming(&self) -> bool;
}

/// Negotiates one peer-to-peer media stream per conversation turn, replacing
/// any prior stream. This side only ever receives media.
pub struct MediaNegotiator {
    inner: Arc<Inner>,
    transport: Arc<dyn OfferTransport>,
    state_rx: watch::Receiver<StreamState>,
}

struct Inner {
    session_id: String,
    client_id: String,
    ice: IceConfig,
    state_tx: watch::Sender<StreamState>,
    peer: Mutex<Option<Arc<RTCPeerConnection>>>,
    tracks: Mutex<Vec<Arc<TrackRemote>>>,
    current_turn: Mutex<Option<String>>,
    /// Bumped on every negotiation; stale callbacks and in-flight answers
    /// from an older generation are discarded.
    generation: AtomicU64,
    events_tx: mpsc::UnboundedSender<MediaEvent>,
}

impl Inner {
    fn set_state(&self, state: StreamState) {
        self.state_tx.send_replace(state);
    }

    /// Close and drop the peer connection. `expected_generation` restricts the
    /// teardown to the negotiation that scheduled it.
    async fn teardown(&self, expected_generation: Option<u64>) {
        if let Some(generation) = expected_generation {
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
        }

        let old = self.peer.lock().await.take();
        if let Some(pc) = old {
            if let Err(e) = pc.close().await {
                warn!("Error closing peer connection: {}", e);
            }
        }

        self.tracks.lock().await.clear();
        self.current_turn.lock().await.take();
        self.set_state(StreamState::Idle);
    }
}

impl MediaNegotiator {
    pub fn new(
        session_id: String,
        client_id: String,
        ice: IceConfig,
        transport: Arc<dyn OfferTransport>,
    ) -> (
        Self,
        watch::Receiver<StreamState>,
        mpsc::UnboundedReceiver<MediaEvent>,
    ) {
        let (state_tx, state_rx) = watch::channel(StreamState::Idle);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let negotiator = Self {
            inner: Arc::new(Inner {
                session_id,
                client_id,
                ice,
                state_tx,
                peer: Mutex::new(None),
                tracks: Mutex::new(Vec::new()),
                current_turn: Mutex::new(None),
                generation: AtomicU64::new(0),
                events_tx,
            }),
            transport,
            state_rx: state_rx.clone(),
        };

        (negotiator, state_rx, events_rx)
    }

    pub fn state(&self) -> StreamState {
        *self.state_rx.borrow()
    }

    /// The turn whose answer is currently applied, if any.
    pub async fn current_turn(&self) -> Option<String> {
        self.inner.current_turn.lock().await.clone()
    }

    /// Inbound track handles for the render layer.
    pub async fn remote_tracks(&self) -> Vec<Arc<TrackRemote>> {
        self.inner.tracks.lock().await.clone()
    }

    /// Negotiate a fresh stream for the given turn. Any existing peer
    /// connection is fully torn down first, so at most one exists at any
    /// instant. On failure the attempt is aborted, the partial connection
    /// released, and the negotiator observes `Failed`; there is no automatic
    /// retry.
    pub async fn setup_stream(&self, turn_message_id: &str) -> Result<()> {
        self.inner.teardown(None).await;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.set_state(StreamState::Connecting);
        info!("Negotiating media stream for turn {}", turn_message_id);

        let result = self.negotiate(turn_message_id, generation).await;
        if let Err(ref e) = result {
            warn!(
                "Media negotiation for turn {} failed: {:#}",
                turn_message_id, e
            );
            self.abort_attempt(generation).await;
        }
        result
    }

    /// Explicit teardown; always safe to call.
    pub async fn stop_stream(&self) {
        self.inner.teardown(None).await;
    }

    async fn negotiate(&self, turn_message_id: &str, generation: u64) -> Result<()> {
        let inner = &self.inner;
        let pc = build_peer_connection(inner, generation).await?;

        {
            let mut slot = inner.peer.lock().await;
            if inner.generation.load(Ordering::SeqCst) != generation {
                drop(slot);
                let _ = pc.close().await;
                return Ok(());
            }
            if let Some(prev) = slot.replace(Arc::clone(&pc)) {
                drop(slot);
                let _ = prev.close().await;
            }
        }

        let offer = pc.create_offer(None).await.context("Failed to create offer")?;
        pc.set_local_description(offer)
            .await
            .context("Failed to set local description")?;
        let local = pc
            .local_description()
            .await
            .ok_or_else(|| anyhow!("Local description missing after offer"))?;

        let request = LiveOffer {
            sdp: local.sdp,
            kind: local.sdp_type.to_string(),
            msg_id: turn_message_id.to_string(),
            session_id: inner.session_id.clone(),
            client_id: inner.client_id.clone(),
        };
        let remote = self
            .transport
            .handle_live(&request)
            .await
            .context("Negotiation request failed")?;

        // A newer turn may have started while the request was in flight; its
        // negotiation owns the peer slot now and this answer must not be
        // applied. The later negotiation wins.
        if inner.generation.load(Ordering::SeqCst) != generation {
            info!("Discarding stale negotiation answer for turn {}", turn_message_id);
            return Ok(());
        }

        if !remote.kind.eq_ignore_ascii_case("answer") {
            bail!("Unexpected SDP type from server: {}", remote.kind);
        }
        let answer = RTCSessionDescription::answer(remote.sdp).context("Invalid answer SDP")?;
        pc.set_remote_description(answer)
            .await
            .context("Failed to set remote description")?;

        *inner.current_turn.lock().await = Some(turn_message_id.to_string());
        info!("Media stream negotiated for turn {}", turn_message_id);

        Ok(())
    }

    async fn abort_attempt(&self, generation: u64) {
        let inner = &self.inner;
        if inner.generation.load(Ordering::SeqCst) != generation {
            return;
        }

        let old = inner.peer.lock().await.take();
        if let Some(pc) = old {
            let _ = pc.close().await;
        }
        inner.tracks.lock().await.clear();
        inner.current_turn.lock().await.take();
        inner.set_state(StreamState::Failed);
    }
}

#[async_trait]
impl MediaControl for MediaNegotiator {
    async fn setup_stream(&self, turn_message_id: &str) -> Result<()> {
        MediaNegotiator::setup_stream(self, turn_message_id).await
    }

    async fn stop_stream(&self) {
        MediaNegotiator::stop_stream(self).await
    }

    fn is_streaming(&self) -> bool {
        self.state() == StreamState::Streaming
    }
}

fn ice_servers(ice: &IceConfig) -> Vec<RTCIceServer> {
    let mut servers = vec![RTCIceServer {
        urls: ice.stun_urls.clone(),
        ..Default::default()
    }];

    if let Some(turn) = &ice.turn {
        servers.push(RTCIceServer {
            urls: turn.urls.clone(),
            username: turn.username.clone(),
            credential: turn.credential.clone(),
            ..Default::default()
        });
    }

    servers
}

async fn build_peer_connection(
    inner: &Arc<Inner>,
    generation: u64,
) -> Result<Arc<RTCPeerConnection>> {
    let mut media_engine = MediaEngine::default();
    media_engine
        .register_default_codecs()
        .context("Failed to register codecs")?;

    let mut registry = Registry::new();
    registry = register_default_interceptors(registry, &mut media_engine)
        .context("Failed to register interceptors")?;

    let api = APIBuilder::new()
        .with_media_engine(media_engine)
        .with_interceptor_registry(registry)
        .build();

    let config = RTCConfiguration {
        ice_servers: ice_servers(&inner.ice),
        ..Default::default()
    };

    let pc = Arc::new(
        api.new_peer_connection(config)
            .await
            .context("Failed to create peer connection")?,
    );

    // Inbound audio and video only; this side never sends media upstream.
    for kind in [RTPCodecType::Audio, RTPCodecType::Video] {
        pc.add_transceiver_from_kind(
            kind,
            Some(RTCRtpTransceiverInit {
                direction: RTCRtpTransceiverDirection::Recvonly,
                send_encodings: vec![],
            }),
        )
        .await
        .context("Failed to add recv-only transceiver")?;
    }

    {
        let inner = Arc::clone(inner);
        pc.on_track(Box::new(move |track: Arc<TrackRemote>, _receiver, _transceiver| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                if inner.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                info!("Inbound {} track started", track.kind());
                inner.tracks.lock().await.push(track);
                inner.set_state(StreamState::Streaming);
            })
        }));
    }

    {
        let inner = Arc::clone(inner);
        pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                info!("Peer connection state: {}", state);
                if matches!(
                    state,
                    RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Closed
                ) {
                    inner.teardown(Some(generation)).await;
                }
            })
        }));
    }

    {
        let inner = Arc::clone(inner);
        pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let inner = Arc::clone(&inner);
            Box::pin(async move {
                match dc.label() {
                    "isPlaybackFinished" => {
                        let inner = Arc::clone(&inner);
                        dc.on_message(Box::new(move |msg: DataChannelMessage| {
                            let inner = Arc::clone(&inner);
                            Box::pin(async move {
                                if msg.data.as_ref() == b"true" {
                                    info!("Server reported playback finished");
                                    let _ = inner.events_tx.send(MediaEvent::PlaybackFinished);
                                    inner.teardown(Some(generation)).await;
                                }
                            })
                        }));
                    }
                    "chat" => {
                        let inner = Arc::clone(&inner);
                        dc.on_message(Box::new(move |msg: DataChannelMessage| {
                            let inner = Arc::clone(&inner);
                            Box::pin(async move {
                                if let Ok(text) = std::str::from_utf8(&msg.data) {
                                    let _ = inner
                                        .events_tx
                                        .send(MediaEvent::ChatText(text.to_string()));
                                }
                            })
                        }));
                    }
                    other => info!("Ignoring data channel {}", other),
                }
            })
        }));
    }

    Ok(pc)
}
