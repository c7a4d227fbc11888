//! Call Recorder - local recording of a call participant's media.
//!
//! Captures the local camera (and screen-share, when present) onto one
//! composite surface, mixes microphone and screen audio into one track,
//! encodes both in fixed time slices and assembles the chunks into a single
//! downloadable file when the recording stops.

pub mod audio;
pub mod capture;
pub mod compositor;
pub mod delivery;
pub mod encoder;
pub mod recorder;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use capture::{AudioTrack, SessionProvider, VideoTrack};
pub use delivery::{DirectoryDelivery, PayloadDelivery};
pub use encoder::{EncoderBackend, EncoderFactory, MediaStream};
pub use recorder::{RecordingConfig, RecordingEvent, RecordingOutput, RecordingSession, RecordingState};
pub use utils::{RecorderError, RecorderResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the default tracing subscriber.
///
/// Honors `RUST_LOG`; falls back to debug output for this crate. Does nothing
/// if the host already installed a subscriber.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_recorder=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("Call Recorder v{}", env!("CARGO_PKG_VERSION"));
    }
}
