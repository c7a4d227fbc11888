//! Chunked stream encoder
//!
//! Drives an encoder backend on a fixed time slice. Every elapsed slice
//! produces exactly one chunk on the chunk channel; the channel closes when
//! the encoder reaches `Stopped`, which is how consumers know no further
//! chunk can arrive.

use super::backend::{EncoderBackend, EncoderFactory, MediaStream};
use super::types::{EncodedChunk, EncoderOptions, EncoderState, MimeType};
use crate::recorder::state::RecordingEvent;
use crate::utils::error::{RecorderError, RecorderResult};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Pick the first supported identifier: the configured one, then fallbacks.
pub fn negotiate_mime_type(
    factory: &dyn EncoderFactory,
    preferred: &str,
    fallbacks: &[String],
) -> RecorderResult<MimeType> {
    let preferred_mime = MimeType::parse(preferred)?;
    if factory.is_type_supported(preferred_mime.as_str()) {
        return Ok(preferred_mime);
    }

    for candidate in fallbacks {
        match MimeType::parse(candidate) {
            Ok(mime) if factory.is_type_supported(mime.as_str()) => {
                tracing::warn!("{} is not supported, falling back to {}", preferred, mime);
                return Ok(mime);
            }
            Ok(_) => tracing::debug!("Fallback {} is not supported either", candidate),
            Err(_) => tracing::warn!("Ignoring malformed fallback type {:?}", candidate),
        }
    }

    Err(RecorderError::UnsupportedCodec(preferred.to_string()))
}

/// Outcome of an encoder run
#[derive(Debug, Default)]
pub struct EncoderReport {
    pub chunks_emitted: u64,
    pub bytes_emitted: u64,
    /// Set when the encoder stopped because of an error
    pub failure: Option<RecorderError>,
}

/// Time-sliced encoder state machine (`Idle → Recording → Stopped`)
pub struct StreamEncoder {
    options: EncoderOptions,
    timeslice: Duration,
    state: Arc<RwLock<EncoderState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<EncoderReport>>,
    events: Option<broadcast::Sender<RecordingEvent>>,
}

impl StreamEncoder {
    pub fn new(options: EncoderOptions, timeslice: Duration) -> Self {
        Self {
            options,
            timeslice,
            state: Arc::new(RwLock::new(EncoderState::Idle)),
            stop_tx: None,
            task: None,
            events: None,
        }
    }

    /// Publish encoder errors on a recording event channel
    pub fn with_events(mut self, events: broadcast::Sender<RecordingEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> EncoderState {
        *self.state.read()
    }

    pub fn options(&self) -> &EncoderOptions {
        &self.options
    }

    /// Start encoding `stream`, sending chunks to `chunks`.
    ///
    /// A no-op while already recording. An unsupported identifier fails with
    /// `UnsupportedCodec` before the backend is created.
    pub fn start(
        &mut self,
        factory: &dyn EncoderFactory,
        stream: MediaStream,
        chunks: mpsc::UnboundedSender<EncodedChunk>,
    ) -> RecorderResult<()> {
        match self.state() {
            EncoderState::Recording => {
                tracing::debug!("Encoder already recording; ignoring start");
                return Ok(());
            }
            EncoderState::Stopped => {
                return Err(RecorderError::EncodeFailure(
                    "encoder has already stopped".to_string(),
                ));
            }
            EncoderState::Idle => {}
        }

        let mime = MimeType::parse(&self.options.mime_type)?;
        if !factory.is_type_supported(mime.as_str()) {
            return Err(RecorderError::UnsupportedCodec(mime.to_string()));
        }
        if self.timeslice.is_zero() {
            return Err(RecorderError::InvalidConfig(
                "time slice must be greater than zero".to_string(),
            ));
        }

        let backend = factory
            .create(stream, &self.options)
            .map_err(|e| RecorderError::EncodeFailure(format!("{:#}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        *self.state.write() = EncoderState::Recording;

        tracing::info!(
            "Encoder started: {} @ {} bps video / {} bps audio, {:?} slices",
            mime,
            self.options.video_bits_per_second,
            self.options.audio_bits_per_second,
            self.timeslice
        );

        self.task = Some(tokio::spawn(run_encoder(
            backend,
            chunks,
            self.timeslice,
            stop_rx,
            self.state.clone(),
            self.events.clone(),
        )));
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    /// Request a stop and wait for the final flush.
    ///
    /// When this returns the chunk channel is closed.
    pub async fn stop(&mut self) -> EncoderReport {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The task may already have exited on an error
            let _ = stop_tx.send(());
        }

        let report = match self.task.take() {
            Some(task) => match task.await {
                Ok(report) => report,
                Err(e) => EncoderReport {
                    failure: Some(RecorderError::Task(format!("encoder task failed: {}", e))),
                    ..Default::default()
                },
            },
            None => EncoderReport::default(),
        };

        *self.state.write() = EncoderState::Stopped;
        report
    }
}

async fn run_encoder(
    mut backend: Box<dyn EncoderBackend>,
    chunks: mpsc::UnboundedSender<EncodedChunk>,
    timeslice: Duration,
    mut stop_rx: oneshot::Receiver<()>,
    state: Arc<RwLock<EncoderState>>,
    events: Option<broadcast::Sender<RecordingEvent>>,
) -> EncoderReport {
    let started = Instant::now();
    let mut ticker = time::interval_at(started + timeslice, timeslice);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut report = EncoderReport::default();

    let failure = loop {
        tokio::select! {
            _ = &mut stop_rx => break None,
            _ = ticker.tick() => match backend.request_data().await {
                Ok(data) => emit(&chunks, &mut report, data, started),
                Err(e) => break Some(RecorderError::EncodeFailure(format!("{:#}", e))),
            },
        }
    };

    let failure = match failure {
        Some(failure) => Some(failure),
        None => match backend.finish().await {
            Ok(tail) => {
                if !tail.is_empty() {
                    emit(&chunks, &mut report, tail, started);
                }
                None
            }
            Err(e) => Some(RecorderError::EncodeFailure(format!("{:#}", e))),
        },
    };

    *state.write() = EncoderState::Stopped;
    drop(chunks);

    match &failure {
        Some(e) => {
            tracing::error!("Encoder stopped after {} chunk(s): {}", report.chunks_emitted, e);
            if let Some(events) = &events {
                let _ = events.send(RecordingEvent::Error(e.to_string()));
            }
        }
        None => tracing::info!(
            "Encoder stopped: {} chunk(s), {} bytes",
            report.chunks_emitted,
            report.bytes_emitted
        ),
    }

    report.failure = failure;
    report
}

fn emit(
    chunks: &mpsc::UnboundedSender<EncodedChunk>,
    report: &mut EncoderReport,
    data: Vec<u8>,
    started: Instant,
) {
    let chunk = EncodedChunk {
        sequence: report.chunks_emitted,
        captured_at: Utc::now(),
        offset_ms: started.elapsed().as_millis() as u64,
        data,
    };
    report.chunks_emitted += 1;
    report.bytes_emitted += chunk.data.len() as u64;

    tracing::debug!("Chunk {} ready ({} bytes)", chunk.sequence, chunk.data.len());
    if chunks.send(chunk).is_err() {
        tracing::warn!("Chunk receiver dropped; chunk discarded");
    }
}
