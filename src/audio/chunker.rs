use anyhow::{Context, Result};
use base64::Engine;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::backend::{AudioCapture, AudioFrame};

/// Chunker configuration
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Duration of each chunk before it is flushed (default: 1 second)
    pub chunk_interval_ms: u64,
    /// Directory for transient spool files
    pub spool_dir: PathBuf,
    /// Session ID (used for spool filenames)
    pub session_id: String,
}

impl ChunkerConfig {
    pub fn new(session_id: String, spool_dir: PathBuf) -> Self {
        Self {
            chunk_interval_ms: 1000,
            spool_dir,
            session_id,
        }
    }
}

/// One bounded capture segment, encoded and ready for transport. Ephemeral:
/// the backing spool file is deleted before the chunk is delivered.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Base64-encoded WAV payload
    pub payload: String,
    /// Chunk number (0-indexed, delivery order)
    pub sequence: usize,
    /// Duration covered by the samples in this chunk
    pub duration_ms: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Microphone permission prompt, owned by the host platform.
#[async_trait::async_trait]
pub trait PermissionGate: Send + Sync {
    async fn request_microphone(&self) -> bool;
}

/// Gate for hosts without a permission prompt (desktop, tests).
pub struct AlwaysGranted;

#[async_trait::async_trait]
impl PermissionGate for AlwaysGranted {
    async fn request_microphone(&self) -> bool {
        true
    }
}

/// Slices live microphone capture into bounded encoded chunks
///
/// While recording, frames accumulate into a WAV spool segment; once a
/// segment spans the chunk interval it is finalized, base64-encoded,
/// delivered on the chunk channel, and its backing file deleted. The next
/// segment starts immediately to avoid gaps. A transient chunk failure is
/// logged and capture continues with a fresh segment.
pub struct AudioChunker {
    config: ChunkerConfig,
    permission_granted: AtomicBool,
    recording: Arc<AtomicBool>,
    stop_signal: Mutex<Option<Arc<Notify>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AudioChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self {
            config,
            permission_granted: AtomicBool::new(false),
            recording: Arc::new(AtomicBool::new(false)),
            stop_signal: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Ask the host for microphone access and remember the outcome.
    pub async fn request_permissions(&self, gate: &dyn PermissionGate) -> bool {
        let granted = gate.request_microphone().await;
        self.permission_granted.store(granted, Ordering::SeqCst);
        if !granted {
            warn!("Microphone permission denied");
        }
        granted
    }

    pub fn is_permission_granted(&self) -> bool {
        self.permission_granted.load(Ordering::SeqCst)
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Begin capture and chunking. Short-circuits (logged) when permission
    /// has not been granted or a recording is already active.
    pub async fn start_recording(
        &self,
        mut capture: Box<dyn AudioCapture>,
        chunks_tx: mpsc::Sender<AudioChunk>,
    ) -> Result<()> {
        if !self.is_permission_granted() {
            warn!("Microphone permission not granted; recording not started");
            return Ok(());
        }
        if self.recording.swap(true, Ordering::SeqCst) {
            warn!("Recording already started");
            return Ok(());
        }

        fs::create_dir_all(&self.config.spool_dir)
            .context("Failed to create spool directory")?;

        let mut rx = match capture.start().await.context("Failed to start audio capture") {
            Ok(rx) => rx,
            Err(e) => {
                self.recording.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let stop = Arc::new(Notify::new());
        *self.stop_signal.lock().await = Some(Arc::clone(&stop));

        let recording = Arc::clone(&self.recording);
        let spool_dir = self.config.spool_dir.clone();
        let session_id = self.config.session_id.clone();
        let interval_ms = self.config.chunk_interval_ms;

        let task = tokio::spawn(async move {
            info!(
                "Audio chunking task started ({}, {}ms chunks)",
                capture.name(),
                interval_ms
            );

            let mut segment: Option<SegmentWriter> = None;
            let mut sequence = 0usize;
            let mut spool_index = 0usize;

            loop {
                let frame = tokio::select! {
                    maybe = rx.recv() => match maybe {
                        Some(frame) => frame,
                        None => break,
                    },
                    _ = stop.notified() => break,
                };
                if !recording.load(Ordering::SeqCst) {
                    break;
                }

                let boundary = segment.as_ref().map_or(true, |seg| {
                    frame.timestamp_ms.saturating_sub(seg.start_ms) >= interval_ms
                });
                if boundary {
                    if let Some(seg) = segment.take() {
                        match seg.finish_and_encode(sequence) {
                            Ok(chunk) => {
                                if chunks_tx.send(chunk).await.is_err() {
                                    break;
                                }
                                sequence += 1;
                            }
                            Err(e) => warn!("Dropping audio chunk: {:#}", e),
                        }
                    }

                    segment = match SegmentWriter::create(&spool_dir, &session_id, spool_index, &frame)
                    {
                        Ok(seg) => Some(seg),
                        Err(e) => {
                            warn!("Failed to open chunk segment: {:#}", e);
                            None
                        }
                    };
                    spool_index += 1;
                }

                let write_failed = match segment.as_mut() {
                    Some(seg) => seg
                        .write_frame(&frame)
                        .map_err(|e| warn!("Failed to buffer audio frame: {:#}", e))
                        .is_err(),
                    None => false,
                };
                if write_failed {
                    segment = None;
                }
            }

            // Flush the in-progress segment as one final chunk, even when no
            // interval boundary elapsed.
            if let Some(seg) = segment.take() {
                match seg.finish_and_encode(sequence) {
                    Ok(chunk) => {
                        let _ = chunks_tx.send(chunk).await;
                    }
                    Err(e) => warn!("Dropping final audio chunk: {:#}", e),
                }
            }

            if let Err(e) = capture.stop().await {
                warn!("Failed to stop capture backend: {}", e);
            }
            recording.store(false, Ordering::SeqCst);
            info!("Audio chunking task stopped");
        });

        *self.task.lock().await = Some(task);

        Ok(())
    }

    /// Flush and stop. Always safe to call, even when nothing is recording.
    pub async fn stop_recording(&self) {
        self.recording.store(false, Ordering::SeqCst);

        if let Some(notify) = self.stop_signal.lock().await.take() {
            notify.notify_one();
        }

        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("Chunking task panicked: {}", e);
            }
        }
    }
}

/// Writes one capture segment to a WAV spool file
struct SegmentWriter {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    start_ms: u64,
    sample_rate: u32,
    channels: u16,
    sample_count: usize,
}

impl SegmentWriter {
    fn create(spool_dir: &Path, session_id: &str, index: usize, frame: &AudioFrame) -> Result<Self> {
        let path = spool_dir.join(format!("{}-seg-{:05}.wav", session_id, index));

        let spec = hound::WavSpec {
            channels: frame.channels,
            sample_rate: frame.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create spool file: {:?}", path))?;

        Ok(Self {
            writer: Some(writer),
            path,
            start_ms: frame.timestamp_ms,
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            sample_count: 0,
        })
    }

    fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for &sample in &frame.samples {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to spool file")?;
            }
            self.sample_count += frame.samples.len();
        }

        Ok(())
    }

    /// Finalize the spool file, encode it for transport, and delete it.
    fn finish_and_encode(mut self, sequence: usize) -> Result<AudioChunk> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize spool file")?;
        }

        let bytes = fs::read(&self.path)
            .with_context(|| format!("Failed to read spool file: {:?}", self.path))?;
        let payload = base64::engine::general_purpose::STANDARD.encode(&bytes);

        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to delete spool file: {:?}", self.path))?;

        let frames = self.sample_count as u64 / self.channels.max(1) as u64;
        let duration_ms = frames * 1000 / self.sample_rate.max(1) as u64;

        Ok(AudioChunk {
            payload,
            sequence,
            duration_ms,
            sample_rate: self.sample_rate,
            channels: self.channels,
        })
    }
}

impl Drop for SegmentWriter {
    fn drop(&mut self) {
        // Abandoned segment: finalize quietly and remove the transient file.
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize spool file on drop: {}", e);
            }
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to delete spool file {:?}: {}", self.path, e);
            }
        }
    }
}
