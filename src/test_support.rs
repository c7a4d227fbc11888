//! In-memory capture handles, encoders and delivery for unit tests

use crate::capture::traits::{AudioTrack, SessionProvider, TrackSettings, VideoFrame, VideoTrack};
use crate::delivery::PayloadDelivery;
use crate::encoder::backend::{EncoderBackend, EncoderFactory, MediaStream};
use crate::encoder::types::{EncoderOptions, DEFAULT_MIME_TYPE};
use crate::recorder::sink::ContainerPayload;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Video track producing solid-color frames
pub struct FakeVideoTrack {
    id: String,
    width: u32,
    height: u32,
    color: Mutex<[u8; 4]>,
    ended: AtomicBool,
    producing: AtomicBool,
}

impl FakeVideoTrack {
    pub fn new(id: &str, width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            width,
            height,
            color: Mutex::new([128, 128, 128, 255]),
            ended: AtomicBool::new(false),
            producing: AtomicBool::new(true),
        })
    }

    pub fn with_color(self: Arc<Self>, rgba: [u8; 4]) -> Arc<Self> {
        *self.color.lock() = rgba;
        self
    }

    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }

    /// Simulate a track that temporarily has no frame available
    pub fn set_producing(&self, producing: bool) {
        self.producing.store(producing, Ordering::SeqCst);
    }
}

impl VideoTrack for FakeVideoTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn settings(&self) -> TrackSettings {
        TrackSettings {
            width: self.width,
            height: self.height,
            frame_rate: Some(30.0),
        }
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        if self.is_ended() || !self.producing.load(Ordering::SeqCst) {
            return None;
        }
        Some(VideoFrame::solid(self.width, self.height, *self.color.lock()))
    }
}

/// Audio track emitting a constant level
pub struct FakeAudioTrack {
    id: String,
    level: f32,
    ended: AtomicBool,
}

impl FakeAudioTrack {
    pub fn constant(id: &str, level: f32) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            level,
            ended: AtomicBool::new(false),
        })
    }

    pub fn end(&self) {
        self.ended.store(true, Ordering::SeqCst);
    }
}

impl AudioTrack for FakeAudioTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_ended(&self) -> bool {
        self.ended.load(Ordering::SeqCst)
    }

    fn read_samples(&self, out: &mut [f32]) -> usize {
        if self.is_ended() {
            return 0;
        }
        out.fill(self.level);
        out.len()
    }
}

/// Call session with a fixed set of local tracks
pub struct FakeProvider {
    camera: Option<Arc<FakeVideoTrack>>,
    microphone: Option<Arc<FakeAudioTrack>>,
    screen: Option<Arc<FakeVideoTrack>>,
    screen_audio: Option<Arc<FakeAudioTrack>>,
    sharing: AtomicBool,
}

impl FakeProvider {
    pub fn new(camera: Option<Arc<FakeVideoTrack>>, microphone: Option<Arc<FakeAudioTrack>>) -> Self {
        Self {
            camera,
            microphone,
            screen: None,
            screen_audio: None,
            sharing: AtomicBool::new(false),
        }
    }

    /// Add a screen-share track and mark the participant as sharing
    pub fn with_screen(mut self, screen: Arc<FakeVideoTrack>) -> Self {
        self.screen = Some(screen);
        self.sharing.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_screen_audio(mut self, track: Arc<FakeAudioTrack>) -> Self {
        self.screen_audio = Some(track);
        self
    }

    pub fn set_sharing(&self, sharing: bool) {
        self.sharing.store(sharing, Ordering::SeqCst);
    }
}

impl SessionProvider for FakeProvider {
    fn local_video(&self) -> Option<Arc<dyn VideoTrack>> {
        self.camera.clone().map(|t| t as Arc<dyn VideoTrack>)
    }

    fn local_audio(&self) -> Option<Arc<dyn AudioTrack>> {
        self.microphone.clone().map(|t| t as Arc<dyn AudioTrack>)
    }

    fn screen_video(&self) -> Option<Arc<dyn VideoTrack>> {
        self.screen.clone().map(|t| t as Arc<dyn VideoTrack>)
    }

    fn screen_audio(&self) -> Option<Arc<dyn AudioTrack>> {
        self.screen_audio.clone().map(|t| t as Arc<dyn AudioTrack>)
    }

    fn is_sharing_screen(&self) -> bool {
        self.sharing.load(Ordering::SeqCst)
    }
}

/// Encoder that flushes a fixed number of zero bytes per slice
pub struct FakeEncoderFactory {
    supported: Vec<String>,
    chunk_len: usize,
    tail: Vec<u8>,
    fail_after: Option<usize>,
    fail_finish: bool,
    fail_create: AtomicBool,
    created: Arc<AtomicUsize>,
    last: Mutex<Option<(MediaStream, EncoderOptions)>>,
}

impl FakeEncoderFactory {
    pub fn new(supported: &[&str]) -> Self {
        Self {
            supported: supported.iter().map(|s| s.to_string()).collect(),
            chunk_len: 64,
            tail: Vec::new(),
            fail_after: None,
            fail_finish: false,
            fail_create: AtomicBool::new(false),
            created: Arc::new(AtomicUsize::new(0)),
            last: Mutex::new(None),
        }
    }

    pub fn webm() -> Self {
        Self::new(&[DEFAULT_MIME_TYPE, "video/webm"])
    }

    pub fn with_chunk_len(mut self, len: usize) -> Self {
        self.chunk_len = len;
        self
    }

    pub fn with_tail(mut self, tail: Vec<u8>) -> Self {
        self.tail = tail;
        self
    }

    /// Fail every flush after the first `n`
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Fail the final flush when the encoder is stopped
    pub fn fail_finish(mut self) -> Self {
        self.fail_finish = true;
        self
    }

    /// Fail the first backend creation only
    pub fn fail_create(self) -> Self {
        self.fail_create.store(true, Ordering::SeqCst);
        self
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Current frame of the most recently created encoder's input
    pub fn last_frame(&self) -> Option<VideoFrame> {
        self.last.lock().as_ref().and_then(|(stream, _)| stream.video.grab_frame())
    }

    pub fn last_audio(&self) -> Option<Arc<dyn AudioTrack>> {
        self.last.lock().as_ref().map(|(stream, _)| stream.audio.clone())
    }

    pub fn last_options(&self) -> Option<EncoderOptions> {
        self.last.lock().as_ref().map(|(_, options)| options.clone())
    }
}

impl EncoderFactory for FakeEncoderFactory {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.iter().any(|s| s == mime_type)
    }

    fn create(
        &self,
        stream: MediaStream,
        options: &EncoderOptions,
    ) -> anyhow::Result<Box<dyn EncoderBackend>> {
        if self.fail_create.swap(false, Ordering::SeqCst) {
            anyhow::bail!("encoder unavailable");
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        *self.last.lock() = Some((stream.clone(), options.clone()));
        Ok(Box::new(FakeEncoder {
            stream,
            chunk_len: self.chunk_len,
            tail: self.tail.clone(),
            fail_after: self.fail_after,
            fail_finish: self.fail_finish,
            flushes: 0,
        }))
    }
}

struct FakeEncoder {
    stream: MediaStream,
    chunk_len: usize,
    tail: Vec<u8>,
    fail_after: Option<usize>,
    fail_finish: bool,
    flushes: usize,
}

#[async_trait]
impl EncoderBackend for FakeEncoder {
    async fn request_data(&mut self) -> anyhow::Result<Vec<u8>> {
        if self.fail_after.is_some_and(|n| self.flushes >= n) {
            anyhow::bail!("encoder crashed after {} flushes", self.flushes);
        }
        self.flushes += 1;

        // Touch both inputs the way a real encoder would
        let _ = self.stream.video.grab_frame();
        let mut samples = [0.0f32; 16];
        self.stream.audio.read_samples(&mut samples);

        Ok(vec![0; self.chunk_len])
    }

    async fn finish(&mut self) -> anyhow::Result<Vec<u8>> {
        if self.fail_finish {
            anyhow::bail!("muxer could not write the trailer");
        }
        Ok(self.tail.clone())
    }
}

/// Records deliveries instead of writing files
#[derive(Default)]
pub struct CapturingDelivery {
    deliveries: Mutex<Vec<(String, usize)>>,
    fail_next: AtomicBool,
}

impl CapturingDelivery {
    /// `(filename, payload bytes)` per successful delivery
    pub fn deliveries(&self) -> Vec<(String, usize)> {
        self.deliveries.lock().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PayloadDelivery for CapturingDelivery {
    async fn deliver(&self, filename: &str, payload: &ContainerPayload) -> anyhow::Result<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            anyhow::bail!("download was blocked");
        }
        self.deliveries.lock().push((filename.to_string(), payload.len()));
        Ok(())
    }
}
