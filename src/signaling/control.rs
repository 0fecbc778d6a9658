use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Serialize)]
struct InitializeRequest<'a> {
    session_id: &'a str,
    agent_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CloseRequest<'a> {
    session_id: &'a str,
}

/// Client for the backend's session-registration endpoints.
#[derive(Clone)]
pub struct SessionControlClient {
    http: reqwest::Client,
    api_base: String,
}

impl SessionControlClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// Register the session once the signaling transport is open.
    pub async fn initialize_websocket(&self, session_id: &str, agent_id: &str) -> Result<()> {
        let url = format!(
            "{}/inferenceRT/initialize_websocket",
            self.api_base.trim_end_matches('/')
        );

        self.http
            .post(&url)
            .json(&InitializeRequest { session_id, agent_id })
            .send()
            .await
            .context("Failed to reach session-registration endpoint")?
            .error_for_status()
            .context("Session registration rejected")?;

        info!("Registered session {} for agent {}", session_id, agent_id);

        Ok(())
    }

    /// Tell the backend the session is over. Caller-invoked on explicit
    /// termination, not on every disconnect.
    pub async fn close_websocket(&self, session_id: &str) -> Result<()> {
        let url = format!(
            "{}/inferenceRT/close_websocket",
            self.api_base.trim_end_matches('/')
        );

        self.http
            .post(&url)
            .json(&CloseRequest { session_id })
            .send()
            .await
            .context("Failed to reach session-close endpoint")?
            .error_for_status()
            .context("Session close rejected")?;

        info!("Closed session {}", session_id);

        Ok(())
    }
}
