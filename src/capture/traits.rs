//! Capture trait definitions
//!
//! Platform-agnostic traits for the capture handles the recorder consumes.
//! The call session owns the actual devices; the recorder only reads from them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Settings reported by a live video track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSettings {
    /// Native width in pixels
    pub width: u32,

    /// Native height in pixels
    pub height: u32,

    /// Frame rate in Hz (if known)
    pub frame_rate: Option<f64>,
}

impl TrackSettings {
    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }
}

/// A single decoded video frame, tightly packed RGBA8
#[derive(Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl VideoFrame {
    /// Create a frame filled with a single RGBA color
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixels * 4);
        for _ in 0..pixels {
            data.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Bytes a well-formed frame of these dimensions must hold
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }

    pub fn is_well_formed(&self) -> bool {
        self.data.len() >= self.expected_len()
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A live video capture handle (camera or screen-share)
pub trait VideoTrack: Send + Sync {
    /// Unique track ID
    fn id(&self) -> &str;

    /// Current track settings
    fn settings(&self) -> TrackSettings;

    /// Whether the track has ended (e.g. screen-share stopped)
    fn is_ended(&self) -> bool;

    /// The most recent frame, or `None` if nothing is available yet
    fn current_frame(&self) -> Option<VideoFrame>;
}

/// A live audio capture handle, or the mixed output of an audio graph
pub trait AudioTrack: Send + Sync {
    fn id(&self) -> &str;

    fn is_ended(&self) -> bool {
        false
    }

    /// Pull interleaved f32 samples into `out`.
    ///
    /// Returns the number of samples written; the rest of `out` is untouched.
    fn read_samples(&self, out: &mut [f32]) -> usize;
}

/// The call session the recorder attaches to
///
/// Exposes the local participant's capture handles. Everything about call
/// membership and signaling stays behind this trait.
pub trait SessionProvider: Send + Sync {
    /// Local camera track
    fn local_video(&self) -> Option<Arc<dyn VideoTrack>>;

    /// Local microphone track
    fn local_audio(&self) -> Option<Arc<dyn AudioTrack>>;

    /// Screen-share video track, if one exists
    fn screen_video(&self) -> Option<Arc<dyn VideoTrack>>;

    /// Screen-share audio track, if one exists
    fn screen_audio(&self) -> Option<Arc<dyn AudioTrack>> {
        None
    }

    /// Whether the local participant is currently sharing their screen
    fn is_sharing_screen(&self) -> bool;
}
