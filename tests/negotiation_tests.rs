// Integration tests for per-turn media negotiation
//
// A loopback transport answers offers with a real in-process peer connection,
// which exercises the full offer/answer path without any network. ICE never
// completes here, so a successful negotiation settles in `Connecting`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use avatar_realtime::config::IceConfig;
use avatar_realtime::{LiveOffer, MediaNegotiator, OfferTransport, RemoteDescription, StreamState};

use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

/// Answers each offer from a freshly built local peer connection.
#[derive(Default)]
struct LoopbackTransport {
    answered: Mutex<Vec<Arc<RTCPeerConnection>>>,
}

#[async_trait]
impl OfferTransport for LoopbackTransport {
    async fn handle_live(&self, offer: &LiveOffer) -> Result<RemoteDescription> {
        assert_eq!(offer.kind, "offer");
        // Every offer body carries the ids the negotiator was built with.
        assert_eq!(offer.session_id, "sess-test");
        assert_eq!(offer.client_id, "agent-1");

        let mut media_engine = MediaEngine::default();
        media_engine
            .register_default_codecs()
            .map_err(|e| anyhow!("codec registration failed: {}", e))?;
        let api = APIBuilder::new().with_media_engine(media_engine).build();
        let pc = Arc::new(
            api.new_peer_connection(RTCConfiguration::default())
                .await?,
        );

        pc.set_remote_description(RTCSessionDescription::offer(offer.sdp.clone())?)
            .await?;
        let answer = pc.create_answer(None).await?;
        pc.set_local_description(answer).await?;
        let local = pc
            .local_description()
            .await
            .ok_or_else(|| anyhow!("answerer has no local description"))?;

        // Keep the answering side alive for the duration of the test.
        self.answered.lock().await.push(pc);

        Ok(RemoteDescription {
            sdp: local.sdp,
            kind: local.sdp_type.to_string(),
        })
    }
}

/// Delays the answer for one specific turn, leaving others instantaneous.
struct DelayedTransport {
    inner: LoopbackTransport,
    slow_turn: String,
    delay: Duration,
}

#[async_trait]
impl OfferTransport for DelayedTransport {
    async fn handle_live(&self, offer: &LiveOffer) -> Result<RemoteDescription> {
        if offer.msg_id == self.slow_turn {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.handle_live(offer).await
    }
}

struct FailingTransport;

#[async_trait]
impl OfferTransport for FailingTransport {
    async fn handle_live(&self, _offer: &LiveOffer) -> Result<RemoteDescription> {
        bail!("negotiation endpoint unavailable")
    }
}

/// Returns an SDP of the wrong type, as a misbehaving server would.
struct OfferingTransport {
    inner: LoopbackTransport,
}

#[async_trait]
impl OfferTransport for OfferingTransport {
    async fn handle_live(&self, offer: &LiveOffer) -> Result<RemoteDescription> {
        let mut answer = self.inner.handle_live(offer).await?;
        answer.kind = "offer".to_string();
        Ok(answer)
    }
}

fn negotiator_with(transport: Arc<dyn OfferTransport>) -> MediaNegotiator {
    let ice = IceConfig {
        stun_urls: vec![],
        turn: None,
    };
    let (negotiator, _state_rx, _events_rx) = MediaNegotiator::new(
        "sess-test".to_string(),
        "agent-1".to_string(),
        ice,
        transport,
    );
    negotiator
}

#[tokio::test]
async fn test_loopback_negotiation_applies_answer() -> Result<()> {
    let negotiator = negotiator_with(Arc::new(LoopbackTransport::default()));

    negotiator.setup_stream("m1").await?;

    assert_eq!(negotiator.current_turn().await, Some("m1".to_string()));
    assert_eq!(negotiator.state(), StreamState::Connecting);

    negotiator.stop_stream().await;
    assert_eq!(negotiator.state(), StreamState::Idle);
    assert_eq!(negotiator.current_turn().await, None);

    Ok(())
}

#[tokio::test]
async fn test_later_negotiation_wins_over_stale_answer() -> Result<()> {
    let transport = Arc::new(DelayedTransport {
        inner: LoopbackTransport::default(),
        slow_turn: "m1".to_string(),
        delay: Duration::from_millis(400),
    });
    let negotiator = Arc::new(negotiator_with(transport));

    let slow = {
        let negotiator = Arc::clone(&negotiator);
        tokio::spawn(async move { negotiator.setup_stream("m1").await })
    };

    // Let the first negotiation reach its in-flight request, then overlap it.
    tokio::time::sleep(Duration::from_millis(100)).await;
    negotiator.setup_stream("m2").await?;

    // The slow answer arrives afterwards and must be discarded, not applied.
    slow.await??;
    assert_eq!(negotiator.current_turn().await, Some("m2".to_string()));
    assert_eq!(negotiator.state(), StreamState::Connecting);

    negotiator.stop_stream().await;
    Ok(())
}

#[tokio::test]
async fn test_transport_failure_marks_stream_failed() {
    let negotiator = negotiator_with(Arc::new(FailingTransport));

    assert!(negotiator.setup_stream("m1").await.is_err());
    assert_eq!(negotiator.state(), StreamState::Failed);
    assert_eq!(negotiator.current_turn().await, None);
}

#[tokio::test]
async fn test_unexpected_sdp_type_is_rejected() {
    let negotiator = negotiator_with(Arc::new(OfferingTransport {
        inner: LoopbackTransport::default(),
    }));

    assert!(negotiator.setup_stream("m1").await.is_err());
    assert_eq!(negotiator.state(), StreamState::Failed);
}

#[tokio::test]
async fn test_failed_state_clears_on_next_attempt() -> Result<()> {
    let negotiator = negotiator_with(Arc::new(FailingTransport));
    assert!(negotiator.setup_stream("m1").await.is_err());
    assert_eq!(negotiator.state(), StreamState::Failed);

    // An explicit stop returns the negotiator to idle.
    negotiator.stop_stream().await;
    assert_eq!(negotiator.state(), StreamState::Idle);

    Ok(())
}

#[tokio::test]
async fn test_stop_stream_is_idempotent() {
    let negotiator = negotiator_with(Arc::new(LoopbackTransport::default()));

    negotiator.stop_stream().await;
    negotiator.stop_stream().await;
    assert_eq!(negotiator.state(), StreamState::Idle);
}
