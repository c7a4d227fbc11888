//! Recording session
//!
//! This module ties the pipeline together:
//! - RecordingSession owns every resource of one local recording
//! - ChunkSink accumulates encoded chunks and assembles the payload
//! - RecordingConfig holds the user-tunable knobs

pub mod config;
pub mod session;
pub mod sink;
pub mod state;

pub use config::{load_config, save_config, ConfigError, RecordingConfig};
pub use session::RecordingSession;
pub use sink::{ChunkSink, ChunkSpan, ContainerPayload, ProgressSnapshot};
pub use state::{RecordingEvent, RecordingOutput, RecordingState};
