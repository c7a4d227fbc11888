//! Track source resolution
//!
//! Resolves the capture handles a recording needs from the session provider.
//! Resolution happens once per recording; the result is never re-queried.

use super::traits::{AudioTrack, Resolution, SessionProvider, VideoTrack};
use crate::utils::error::{RecorderError, RecorderResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Fixed layout position of a video input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceSlot {
    /// Local camera
    Primary,
    /// Screen-share
    Screen,
}

impl SourceSlot {
    pub fn index(&self) -> usize {
        match self {
            SourceSlot::Primary => 0,
            SourceSlot::Screen => 1,
        }
    }
}

/// A video input captured at recording start
///
/// Dimensions are snapshotted from the track settings and never re-read.
#[derive(Clone)]
pub struct VideoSource {
    pub slot: SourceSlot,
    pub track: Arc<dyn VideoTrack>,
    pub width: u32,
    pub height: u32,
}

impl VideoSource {
    pub fn new(slot: SourceSlot, track: Arc<dyn VideoTrack>) -> Self {
        let Resolution { width, height } = track.settings().resolution();
        Self {
            slot,
            track,
            width,
            height,
        }
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.width,
            height: self.height,
        }
    }

    fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl fmt::Debug for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoSource")
            .field("slot", &self.slot)
            .field("track", &self.track.id())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A collection guaranteed to hold at least one element
#[derive(Clone)]
pub struct NonEmpty<T> {
    items: Vec<T>,
}

impl<T> NonEmpty<T> {
    pub fn new(first: T) -> Self {
        Self { items: vec![first] }
    }

    /// Returns `None` for an empty vector
    pub fn from_vec(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            None
        } else {
            Some(Self { items })
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn first(&self) -> &T {
        &self.items[0]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

/// Capture handles for one recording
#[derive(Clone)]
pub struct ResolvedSources {
    pub primary_video: VideoSource,
    pub screen_video: Option<VideoSource>,
    pub audio_sources: NonEmpty<Arc<dyn AudioTrack>>,
}

impl ResolvedSources {
    /// Video sources in slot order
    pub fn video_sources(&self) -> Vec<VideoSource> {
        let mut sources = vec![self.primary_video.clone()];
        if let Some(screen) = &self.screen_video {
            sources.push(screen.clone());
        }
        sources
    }
}

/// Resolves capture handles from the call session
pub struct TrackSourceRegistry {
    provider: Arc<dyn SessionProvider>,
    include_screen_audio: bool,
}

impl TrackSourceRegistry {
    pub fn new(provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            provider,
            include_screen_audio: true,
        }
    }

    /// Whether screen-share audio is mixed in alongside the microphone
    pub fn include_screen_audio(mut self, include: bool) -> Self {
        self.include_screen_audio = include;
        self
    }

    /// Resolve the current capture handles
    pub fn resolve(&self) -> RecorderResult<ResolvedSources> {
        let camera = self
            .provider
            .local_video()
            .ok_or_else(|| RecorderError::SourceUnavailable("camera".to_string()))?;
        let primary_video = VideoSource::new(SourceSlot::Primary, camera);
        if !primary_video.has_area() {
            return Err(RecorderError::SourceUnavailable(format!(
                "camera track {} reports {}x{}",
                primary_video.track.id(),
                primary_video.width,
                primary_video.height
            )));
        }

        let microphone = self
            .provider
            .local_audio()
            .ok_or_else(|| RecorderError::SourceUnavailable("microphone".to_string()))?;
        let mut audio_sources = NonEmpty::new(microphone);

        let sharing = self.provider.is_sharing_screen();
        let screen_video = if sharing {
            match self.provider.screen_video() {
                Some(track) => {
                    let source = VideoSource::new(SourceSlot::Screen, track);
                    if source.has_area() {
                        Some(source)
                    } else {
                        tracing::warn!(
                            "Ignoring screen-share track {} with empty dimensions",
                            source.track.id()
                        );
                        None
                    }
                }
                None => {
                    tracing::warn!("Screen sharing is on but no screen video track is present");
                    None
                }
            }
        } else {
            None
        };

        if sharing && self.include_screen_audio {
            if let Some(track) = self.provider.screen_audio() {
                audio_sources.push(track);
            }
        }

        tracing::debug!(
            "Resolved sources: camera {}x{}, screen {:?}, {} audio source(s)",
            primary_video.width,
            primary_video.height,
            screen_video.as_ref().map(|s| (s.width, s.height)),
            audio_sources.len()
        );

        Ok(ResolvedSources {
            primary_video,
            screen_video,
            audio_sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeAudioTrack, FakeProvider, FakeVideoTrack};

    #[test]
    fn test_resolve_camera_only() {
        let provider = FakeProvider::new(
            Some(FakeVideoTrack::new("cam", 640, 480)),
            Some(FakeAudioTrack::constant("mic", 0.1)),
        );
        let sources = TrackSourceRegistry::new(Arc::new(provider)).resolve().unwrap();

        assert_eq!(sources.primary_video.slot, SourceSlot::Primary);
        assert_eq!(
            sources.primary_video.resolution(),
            Resolution { width: 640, height: 480 }
        );
        assert!(sources.screen_video.is_none());
        assert_eq!(sources.audio_sources.len(), 1);
        assert_eq!(sources.video_sources().len(), 1);
    }

    #[test]
    fn test_missing_camera_is_source_unavailable() {
        let provider = FakeProvider::new(None, Some(FakeAudioTrack::constant("mic", 0.1)));
        let err = TrackSourceRegistry::new(Arc::new(provider)).resolve().err().unwrap();
        assert!(matches!(err, RecorderError::SourceUnavailable(_)));
    }

    #[test]
    fn test_missing_microphone_is_source_unavailable() {
        let provider = FakeProvider::new(Some(FakeVideoTrack::new("cam", 640, 480)), None);
        let err = TrackSourceRegistry::new(Arc::new(provider)).resolve().err().unwrap();
        assert!(matches!(err, RecorderError::SourceUnavailable(ref what) if what == "microphone"));
    }

    #[test]
    fn test_zero_sized_camera_is_rejected() {
        let provider = FakeProvider::new(
            Some(FakeVideoTrack::new("cam", 0, 0)),
            Some(FakeAudioTrack::constant("mic", 0.1)),
        );
        assert!(TrackSourceRegistry::new(Arc::new(provider)).resolve().is_err());
    }

    #[test]
    fn test_screen_share_only_when_sharing() {
        let provider = FakeProvider::new(
            Some(FakeVideoTrack::new("cam", 640, 480)),
            Some(FakeAudioTrack::constant("mic", 0.1)),
        )
        .with_screen(FakeVideoTrack::new("screen", 1280, 720));
        provider.set_sharing(false);
        let provider = Arc::new(provider);

        let sources = TrackSourceRegistry::new(provider.clone()).resolve().unwrap();
        assert!(sources.screen_video.is_none());

        provider.set_sharing(true);
        let sources = TrackSourceRegistry::new(provider).resolve().unwrap();
        let screen = sources.screen_video.as_ref().unwrap();
        assert_eq!(screen.slot, SourceSlot::Screen);
        assert_eq!((screen.width, screen.height), (1280, 720));
        assert_eq!(sources.video_sources()[1].slot, SourceSlot::Screen);
    }

    #[test]
    fn test_screen_audio_is_mixed_when_enabled() {
        let provider = Arc::new(
            FakeProvider::new(
                Some(FakeVideoTrack::new("cam", 640, 480)),
                Some(FakeAudioTrack::constant("mic", 0.1)),
            )
            .with_screen(FakeVideoTrack::new("screen", 1280, 720))
            .with_screen_audio(FakeAudioTrack::constant("screen-audio", 0.2)),
        );

        let sources = TrackSourceRegistry::new(provider.clone()).resolve().unwrap();
        assert_eq!(sources.audio_sources.len(), 2);
        assert_eq!(sources.audio_sources.first().id(), "mic");

        let sources = TrackSourceRegistry::new(provider)
            .include_screen_audio(false)
            .resolve()
            .unwrap();
        assert_eq!(sources.audio_sources.len(), 1);
    }

    #[test]
    fn test_non_empty_from_vec() {
        assert!(NonEmpty::<u8>::from_vec(vec![]).is_none());
        let items = NonEmpty::from_vec(vec![1, 2]).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(*items.first(), 1);
    }
}
