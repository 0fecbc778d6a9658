use anyhow::{Context, Result};
use std::path::Path;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for microphone capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (backend expects 16kHz)
    pub sample_rate: u32,
    /// Target channel count (1 = mono)
    pub channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz linear PCM
            channels: 1,        // Mono
            buffer_duration_ms: 100,
        }
    }
}

/// Microphone capture backend trait
///
/// The device backend lives in the host app behind this trait; this crate
/// ships a scripted backend for tests and offline batch feeds.
#[async_trait::async_trait]
pub trait AudioCapture: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Replays a fixed sequence of frames, then leaves the channel open until
/// stopped (mimicking a device that has gone quiet).
pub struct ScriptedCapture {
    frames: Vec<AudioFrame>,
    keep_alive: Option<mpsc::Sender<AudioFrame>>,
    capturing: bool,
    /// When false, the channel closes as soon as the last frame is replayed.
    hold_open: bool,
}

impl ScriptedCapture {
    pub fn new(frames: Vec<AudioFrame>) -> Self {
        Self {
            frames,
            keep_alive: None,
            capturing: false,
            hold_open: false,
        }
    }

    /// Keep the frame channel open after replay until `stop` is called.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Build a scripted capture from a WAV file, sliced into fixed-duration
    /// frames. Used for offline batch feeds.
    pub fn from_wav(path: impl AsRef<Path>, frame_duration_ms: u64) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {:?}", path))?;
        let spec = reader.spec();

        let samples: Vec<i16> = reader
            .samples::<i16>()
            .collect::<std::result::Result<_, _>>()
            .context("Failed to read WAV samples")?;

        let samples_per_frame =
            (spec.sample_rate as u64 * spec.channels as u64 * frame_duration_ms / 1000) as usize;
        let samples_per_frame = samples_per_frame.max(1);

        let frames = samples
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: spec.sample_rate,
                channels: spec.channels,
                timestamp_ms: i as u64 * frame_duration_ms,
            })
            .collect();

        Ok(Self::new(frames))
    }
}

#[async_trait::async_trait]
impl AudioCapture for ScriptedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(64);

        if self.hold_open {
            self.keep_alive = Some(tx.clone());
        }

        let frames = std::mem::take(&mut self.frames);
        tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    break;
                }
            }
        });

        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.keep_alive.take();
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
