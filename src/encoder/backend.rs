//! Encoder primitive
//!
//! The platform encoder sits behind these traits. It receives the combined
//! stream once and is then asked to flush encoded bytes at every time slice.

use super::types::EncoderOptions;
use crate::capture::traits::AudioTrack;
use crate::compositor::surface::SurfaceCapture;
use async_trait::async_trait;
use std::sync::Arc;

/// Composite video plus mixed audio, handed to the encoder as one stream
#[derive(Clone)]
pub struct MediaStream {
    pub video: SurfaceCapture,
    pub audio: Arc<dyn AudioTrack>,
}

impl MediaStream {
    pub fn new(video: SurfaceCapture, audio: Arc<dyn AudioTrack>) -> Self {
        Self { video, audio }
    }
}

/// A running encoder instance
#[async_trait]
pub trait EncoderBackend: Send {
    /// Flush everything encoded since the previous flush
    async fn request_data(&mut self) -> anyhow::Result<Vec<u8>>;

    /// Finish encoding and return any trailing bytes
    async fn finish(&mut self) -> anyhow::Result<Vec<u8>>;
}

/// Creates encoder instances
pub trait EncoderFactory: Send + Sync {
    /// Whether `mime_type` can be produced by this platform
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create an encoder reading from `stream`
    fn create(
        &self,
        stream: MediaStream,
        options: &EncoderOptions,
    ) -> anyhow::Result<Box<dyn EncoderBackend>>;
}
