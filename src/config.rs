use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    pub ice: IceConfig,
    pub audio: AudioSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Base URL for session-control and negotiation calls (https://...)
    pub api_base: String,
    /// Base URL for the signaling channel (wss://...)
    pub ws_base: String,
}

/// STUN/TURN servers used to establish peer-to-peer connectivity
#[derive(Debug, Clone, Deserialize)]
pub struct IceConfig {
    pub stun_urls: Vec<String>,
    pub turn: Option<TurnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TurnConfig {
    pub urls: Vec<String>,
    pub username: String,
    pub credential: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioSettings {
    /// Capture sample rate (backend expects 16kHz)
    pub sample_rate: u32,
    /// Capture channel count (1 = mono)
    pub channels: u16,
    /// Duration of each microphone chunk before it is flushed
    pub chunk_interval_ms: u64,
    /// Directory for transient chunk spool files
    pub spool_dir: String,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_urls: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
            turn: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
