//! Recording session
//!
//! Owns every resource of a local recording: the composite surface and its
//! draw loop, the audio graph, the encoder and the chunk sink. `start` and
//! `stop` are idempotent; all start-time failures happen before anything is
//! allocated.

use super::config::RecordingConfig;
use super::sink::{collect_chunks, ChunkSink, ProgressSnapshot, SinkProgress};
use super::state::{RecordingEvent, RecordingOutput, RecordingState};
use crate::audio::graph::{AudioGraphFactory, SoftwareAudioGraphFactory};
use crate::audio::mixer::AudioMixer;
use crate::capture::registry::TrackSourceRegistry;
use crate::capture::traits::SessionProvider;
use crate::compositor::frame_loop::{refresh_interval, FrameCompositor};
use crate::compositor::surface::{CompositeSurface, SharedSurface, SurfaceCapture};
use crate::delivery::PayloadDelivery;
use crate::encoder::backend::{EncoderFactory, MediaStream};
use crate::encoder::stream::{negotiate_mime_type, EncoderReport, StreamEncoder};
use crate::encoder::types::{EncoderState, MimeType};
use crate::utils::error::{RecorderError, RecorderResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

/// Resources held while recording
struct ActivePipeline {
    id: Uuid,
    mime: MimeType,
    started_at: Instant,
    surface: SharedSurface,
    compositor: FrameCompositor,
    mixer: AudioMixer,
    encoder: StreamEncoder,
    collector: JoinHandle<ChunkSink>,
    progress: Arc<SinkProgress>,
}

/// What teardown hands back
struct Teardown {
    sink: ChunkSink,
    report: EncoderReport,
    duration_ms: f64,
}

impl ActivePipeline {
    /// Release everything in order: encoder, pending chunks, draw loop,
    /// audio graph, surface. A failing step does not stop the later ones.
    async fn teardown(mut self) -> Teardown {
        let report = self.encoder.stop().await;

        let sink = match self.collector.await {
            Ok(sink) => sink,
            Err(e) => {
                tracing::error!("[{}] Chunk collector failed: {}", self.id, e);
                ChunkSink::new(self.mime.as_str())
            }
        };

        if let Err(e) = self.compositor.stop().await {
            tracing::warn!("[{}] {}", self.id, e);
        }

        if let Err(e) = self.mixer.release() {
            tracing::warn!("[{}] Failed to release audio graph: {}", self.id, e);
        }

        self.surface.write().release();

        Teardown {
            sink,
            report,
            duration_ms: self.started_at.elapsed().as_secs_f64() * 1000.0,
        }
    }
}

/// A local participant's recording
pub struct RecordingSession {
    config: RecordingConfig,
    provider: Arc<dyn SessionProvider>,
    encoders: Arc<dyn EncoderFactory>,
    audio_graphs: Arc<dyn AudioGraphFactory>,
    delivery: Arc<dyn PayloadDelivery>,
    state: Arc<RwLock<RecordingState>>,
    active: Option<ActivePipeline>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl RecordingSession {
    pub fn new(
        config: RecordingConfig,
        provider: Arc<dyn SessionProvider>,
        encoders: Arc<dyn EncoderFactory>,
        delivery: Arc<dyn PayloadDelivery>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            config,
            provider,
            encoders,
            audio_graphs: Arc::new(SoftwareAudioGraphFactory),
            delivery,
            state: Arc::new(RwLock::new(RecordingState::Idle)),
            active: None,
            event_tx,
        }
    }

    /// Use a different audio graph implementation
    pub fn with_audio_graph_factory(mut self, factory: Arc<dyn AudioGraphFactory>) -> Self {
        self.audio_graphs = factory;
        self
    }

    pub fn config(&self) -> &RecordingConfig {
        &self.config
    }

    /// Current state. Reports `Stopped` as soon as the encoder has stopped
    /// on its own, even before `stop()` collects the recording.
    pub fn state(&self) -> RecordingState {
        let state = *self.state.read();
        match (&self.active, state) {
            (Some(active), RecordingState::Recording)
                if active.encoder.state() == EncoderState::Stopped =>
            {
                RecordingState::Stopped
            }
            _ => state,
        }
    }

    /// Id of the recording in progress
    pub fn session_id(&self) -> Option<Uuid> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.event_tx.subscribe()
    }

    /// Chunks and bytes captured so far
    pub fn progress(&self) -> ProgressSnapshot {
        self.active
            .as_ref()
            .map(|a| a.progress.snapshot())
            .unwrap_or_default()
    }

    /// Composite surface dimensions while recording
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.active.as_ref().map(|a| {
            let surface = a.surface.read();
            (surface.width(), surface.height())
        })
    }

    /// Completed draw passes while recording
    pub fn frames_composited(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| a.compositor.passes())
            .unwrap_or(0)
    }

    /// Milliseconds since recording started
    pub fn duration_ms(&self) -> f64 {
        self.active
            .as_ref()
            .map(|a| a.started_at.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }

    /// Start recording.
    ///
    /// A no-op while a recording is active. On error the session stays idle.
    pub async fn start(&mut self) -> RecorderResult<()> {
        if let Some(active) = &self.active {
            if active.encoder.state() == EncoderState::Stopped {
                tracing::warn!(
                    "[{}] Encoder has stopped; call stop() to collect the recording",
                    active.id
                );
            } else {
                tracing::debug!("[{}] Already recording; ignoring start", active.id);
            }
            return Ok(());
        }

        // Everything that can fail without side effects happens first
        self.config
            .validate()
            .map_err(|e| RecorderError::InvalidConfig(e.to_string()))?;
        let sources = TrackSourceRegistry::new(self.provider.clone())
            .include_screen_audio(self.config.include_screen_audio)
            .resolve()?;
        let mime = negotiate_mime_type(
            self.encoders.as_ref(),
            &self.config.encoder.mime_type,
            &self.config.fallback_mime_types,
        )?;

        let id = Uuid::new_v4();
        tracing::info!("[{}] Starting recording as {}", id, mime);

        let video_sources = sources.video_sources();
        let surface = CompositeSurface::create(&video_sources).into_shared();
        {
            let surface = surface.read();
            tracing::info!(
                "[{}] Composite surface {}x{} for {} video source(s)",
                id,
                surface.width(),
                surface.height(),
                video_sources.len()
            );
        }

        let mut compositor = FrameCompositor::start(
            surface.clone(),
            video_sources,
            refresh_interval(self.config.refresh_rate_hz),
        );

        let mut mixer = match AudioMixer::build(
            self.audio_graphs.create_graph(),
            sources.audio_sources.as_slice(),
        ) {
            Ok(mixer) => mixer,
            Err(e) => {
                abandon_start(id, &mut compositor, None, &surface).await;
                return Err(e);
            }
        };

        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let mut encoder = StreamEncoder::new(
            self.config.encoder.with_mime_type(mime.as_str()),
            self.config.timeslice(),
        )
        .with_events(self.event_tx.clone());
        let stream = MediaStream::new(SurfaceCapture::new(surface.clone()), mixer.output());
        if let Err(e) = encoder.start(self.encoders.as_ref(), stream, chunk_tx) {
            abandon_start(id, &mut compositor, Some(&mut mixer), &surface).await;
            return Err(e);
        }

        let progress = Arc::new(SinkProgress::default());
        let collector = tokio::spawn(collect_chunks(
            chunk_rx,
            ChunkSink::new(mime.as_str()),
            progress.clone(),
            self.event_tx.clone(),
        ));

        self.active = Some(ActivePipeline {
            id,
            mime,
            started_at: Instant::now(),
            surface,
            compositor,
            mixer,
            encoder,
            collector,
            progress,
        });
        *self.state.write() = RecordingState::Recording;
        let _ = self.event_tx.send(RecordingEvent::Started);

        tracing::info!("[{}] Recording started", id);
        Ok(())
    }

    /// Stop recording and hand the assembled payload to the delivery
    /// collaborator.
    ///
    /// Without an active recording this returns an empty payload and
    /// delivers nothing. Delivery failures are reported on the output rather
    /// than discarding the payload.
    pub async fn stop(&mut self) -> RecorderResult<RecordingOutput> {
        let Some(active) = self.active.take() else {
            tracing::debug!("No active recording; ignoring stop");
            return Ok(RecordingOutput::empty(
                self.config.default_filename(),
                &self.config.encoder.mime_type,
            ));
        };

        let id = active.id;
        let filename = self.config.filename_for(&active.mime);
        tracing::info!("[{}] Stopping recording", id);

        let Teardown {
            sink,
            report,
            duration_ms,
        } = active.teardown().await;
        let payload = sink.finalize();
        *self.state.write() = RecordingState::Stopped;

        let encode_failure = report.failure.map(|e| e.to_string());
        if let Some(failure) = &encode_failure {
            tracing::warn!(
                "[{}] Recording ended early ({}); keeping {} captured chunk(s)",
                id,
                failure,
                payload.chunks.len()
            );
        }

        let delivered = match self.delivery.deliver(&filename, &payload).await {
            Ok(()) => true,
            Err(e) => {
                let err = RecorderError::Delivery(format!("{:#}", e));
                tracing::error!("[{}] {}", id, err);
                let _ = self.event_tx.send(RecordingEvent::Error(err.to_string()));
                false
            }
        };

        let _ = self.event_tx.send(RecordingEvent::Stopped);
        tracing::info!(
            "[{}] Recording stopped. Duration: {:.0}ms, {} chunk(s), {} bytes",
            id,
            duration_ms,
            payload.chunks.len(),
            payload.len()
        );

        Ok(RecordingOutput {
            session_id: Some(id),
            filename,
            payload,
            duration_ms,
            encode_failure,
            delivered,
        })
    }
}

/// Undo a partially completed start
async fn abandon_start(
    id: Uuid,
    compositor: &mut FrameCompositor,
    mixer: Option<&mut AudioMixer>,
    surface: &SharedSurface,
) {
    tracing::warn!("[{}] Start failed; releasing resources", id);
    if let Err(e) = compositor.stop().await {
        tracing::warn!("[{}] {}", id, e);
    }
    if let Some(mixer) = mixer {
        if let Err(e) = mixer.release() {
            tracing::warn!("[{}] Failed to release audio graph: {}", id, e);
        }
    }
    surface.write().release();
}
