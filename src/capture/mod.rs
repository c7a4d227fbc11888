//! Capture handles and source resolution
//!
//! The call session owns the devices. This module describes the handles the
//! recorder reads from and decides which of them take part in a recording.

pub mod registry;
pub mod traits;

pub use registry::{NonEmpty, ResolvedSources, SourceSlot, TrackSourceRegistry, VideoSource};
pub use traits::{AudioTrack, Resolution, SessionProvider, TrackSettings, VideoFrame, VideoTrack};
