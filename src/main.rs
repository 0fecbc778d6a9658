use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use avatar_realtime::{
    AlwaysGranted, ApiOfferTransport, AudioChunker, ChunkerConfig, Config,
    ConversationCoordinator, MediaControl, MediaNegotiator, ScriptedCapture, SessionControlClient,
    SessionIds, SignalingSession,
};

/// Terminal driver for an avatar realtime session: stdin lines become user
/// messages, agent replies print as they are paced against the stream.
#[derive(Parser)]
#[command(name = "avatar-realtime")]
struct Cli {
    /// User identifier
    #[arg(long)]
    user: String,

    /// Agent (persona) identifier
    #[arg(long)]
    agent: String,

    /// Reuse a persisted session id instead of generating one
    #[arg(long)]
    session: Option<String>,

    /// Stream a WAV file as microphone input
    #[arg(long)]
    wav: Option<String>,

    /// Config file path (without extension)
    #[arg(long, default_value = "config/avatar-realtime")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    let ids = SessionIds::new(cli.user, cli.agent, cli.session);
    info!(
        "Session {} for agent {} ({}Hz, {}ch capture)",
        ids.session_id, ids.agent_id, cfg.audio.sample_rate, cfg.audio.channels
    );

    let control = SessionControlClient::new(cfg.backend.api_base.clone());
    let (signaling, events_rx) =
        SignalingSession::new(ids.clone(), cfg.backend.ws_base.clone(), control);
    let signaling = Arc::new(signaling);

    let transport = Arc::new(ApiOfferTransport::new(cfg.backend.api_base.clone()));
    let (negotiator, state_rx, mut media_events) = MediaNegotiator::new(
        ids.session_id.clone(),
        ids.agent_id.clone(),
        cfg.ice.clone(),
        transport,
    );
    let negotiator: Arc<dyn MediaControl> = Arc::new(negotiator);

    let coordinator = Arc::new(ConversationCoordinator::new(
        Arc::clone(&signaling),
        negotiator,
    ));
    coordinator.start().await?;

    // Microphone path: the device backend is host-provided; here a WAV file
    // can stand in for it.
    let (chunk_tx, chunk_rx) = mpsc::channel(16);
    let mut chunker_config =
        ChunkerConfig::new(ids.session_id.clone(), cfg.audio.spool_dir.clone().into());
    chunker_config.chunk_interval_ms = cfg.audio.chunk_interval_ms;
    let chunker = Arc::new(AudioChunker::new(chunker_config));

    if let Some(wav_path) = &cli.wav {
        chunker.request_permissions(&AlwaysGranted).await;
        let capture = ScriptedCapture::from_wav(wav_path, 100)?;
        chunker
            .start_recording(Box::new(capture), chunk_tx)
            .await?;
    }

    {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            coordinator.run(events_rx, chunk_rx, state_rx).await;
        });
    }

    tokio::spawn(async move {
        while let Some(event) = media_events.recv().await {
            info!("Media event: {:?}", event);
        }
    });

    // No animation in a terminal; print each paced batch and immediately
    // release the next one.
    {
        let coordinator = Arc::clone(&coordinator);
        let mut displayed = coordinator.subscribe_display();
        tokio::spawn(async move {
            while displayed.changed().await.is_ok() {
                let text = displayed.borrow_and_update().clone();
                if let Some(text) = text {
                    println!("agent> {}", text);
                    coordinator.display_complete().await;
                }
            }
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !coordinator.submit_text(&line).await {
                        warn!("Message not sent");
                    }
                }
                None => break,
            },
        }
    }

    chunker.stop_recording().await;
    coordinator.shutdown().await;

    Ok(())
}
