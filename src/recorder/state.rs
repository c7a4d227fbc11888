//! Recording state management
//!
//! Defines the recording state machine, lifecycle events, and the result of
//! a completed recording.

use super::sink::ContainerPayload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current state of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    /// No recording in progress
    Idle,
    /// Currently recording
    Recording,
    /// Recording ended (stopped by the caller or by an encoder failure)
    Stopped,
}

impl Default for RecordingState {
    fn default() -> Self {
        Self::Idle
    }
}

/// Events emitted during recording
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordingEvent {
    /// Recording started
    Started,
    /// A chunk reached the sink
    ChunkCaptured { sequence: u64, bytes: usize },
    /// Recording stopped and the payload was assembled
    Stopped,
    /// Error occurred
    Error(String),
}

/// Result of a completed recording
#[derive(Debug, Clone)]
pub struct RecordingOutput {
    /// Recording this output belongs to (`None` when nothing was recorded)
    pub session_id: Option<Uuid>,

    /// Suggested download filename
    pub filename: String,

    /// Assembled container payload
    pub payload: ContainerPayload,

    /// Wall-clock recording duration in milliseconds
    pub duration_ms: f64,

    /// Encoder error that ended the recording early, if any
    pub encode_failure: Option<String>,

    /// Whether the payload was handed to the delivery collaborator
    pub delivered: bool,
}

impl RecordingOutput {
    /// Output of a stop with nothing recorded
    pub fn empty(filename: String, mime_type: &str) -> Self {
        Self {
            session_id: None,
            filename,
            payload: ContainerPayload::empty(mime_type),
            duration_ms: 0.0,
            encode_failure: None,
            delivered: false,
        }
    }

    /// True when the encoder failed and the payload may be truncated
    pub fn is_truncated(&self) -> bool {
        self.encode_failure.is_some()
    }
}
