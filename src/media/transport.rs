use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Local SDP offer posted to the negotiation endpoint for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct LiveOffer {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub msg_id: String,
    pub session_id: String,
    pub client_id: String,
}

/// Remote SDP description returned by the negotiation endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDescription {
    pub sdp: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
struct LiveAnswer {
    webrtc_offer: RemoteDescription,
}

/// Exchanges an SDP offer for the server's answer.
#[async_trait]
pub trait OfferTransport: Send + Sync {
    async fn handle_live(&self, offer: &LiveOffer) -> Result<RemoteDescription>;
}

/// Production transport: POST /inferenceRT/handle_live.
pub struct ApiOfferTransport {
    http: reqwest::Client,
    api_base: String,
}

impl ApiOfferTransport {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl OfferTransport for ApiOfferTransport {
    async fn handle_live(&self, offer: &LiveOffer) -> Result<RemoteDescription> {
        let url = format!(
            "{}/inferenceRT/handle_live",
            self.api_base.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .json(offer)
            .send()
            .await
            .context("Failed to reach negotiation endpoint")?
            .error_for_status()
            .context("Negotiation endpoint rejected offer")?;

        let answer: LiveAnswer = response
            .json()
            .await
            .context("Invalid negotiation response")?;

        Ok(answer.webrtc_offer)
    }
}
