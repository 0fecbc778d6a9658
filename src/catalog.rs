//! Avatar catalog lookups
//!
//! Read-only client for the persona catalog; hosts use it to pick an agent
//! and the idle fallback video shown when no stream is live. Outside the
//! realtime core.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Catalog entry for one avatar persona.
#[derive(Debug, Clone, Deserialize)]
pub struct Avatar {
    pub id: i64,
    pub avatar_agent_id: String,
    pub name: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub idle_video: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub preview_text: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}

/// Sort and pagination parameters for catalog listings.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AvatarQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

pub struct CatalogClient {
    http: reqwest::Client,
    api_base: String,
}

impl CatalogClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
        }
    }

    /// GET /avatars_vx
    pub async fn get_avatars(&self, query: &AvatarQuery) -> Result<Vec<Avatar>> {
        let url = format!("{}/avatars_vx", self.api_base.trim_end_matches('/'));

        self.http
            .get(&url)
            .query(query)
            .send()
            .await
            .context("Failed to reach avatar catalog")?
            .error_for_status()
            .context("Avatar catalog rejected query")?
            .json()
            .await
            .context("Invalid avatar catalog response")
    }

    /// GET /avatars_vx/{id}
    pub async fn get_avatar(&self, avatar_id: &str) -> Result<Avatar> {
        let url = format!(
            "{}/avatars_vx/{}",
            self.api_base.trim_end_matches('/'),
            avatar_id
        );

        self.http
            .get(&url)
            .send()
            .await
            .context("Failed to reach avatar catalog")?
            .error_for_status()
            .context("Avatar not found")?
            .json()
            .await
            .context("Invalid avatar response")
    }
}
