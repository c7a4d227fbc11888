//! Error types and handling
//!
//! Common error types used across the recording pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum RecorderError {
    /// A required capture handle (camera or microphone) is missing
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No audio source available to mix")]
    NoAudioSource,

    /// The requested container/codec is not supported by the encoder
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// The encoder failed after capture began
    #[error("Encode failure: {0}")]
    EncodeFailure(String),

    #[error("Audio graph error: {0}")]
    AudioGraph(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    /// A background task panicked or was aborted
    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RecorderError {
    /// Stable machine-readable code for this error
    pub fn code(&self) -> &'static str {
        match self {
            RecorderError::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            RecorderError::NoAudioSource => "NO_AUDIO_SOURCE",
            RecorderError::UnsupportedCodec(_) => "UNSUPPORTED_CODEC",
            RecorderError::EncodeFailure(_) => "ENCODE_FAILURE",
            RecorderError::AudioGraph(_) => "AUDIO_GRAPH_ERROR",
            RecorderError::Delivery(_) => "DELIVERY_ERROR",
            RecorderError::Task(_) => "TASK_FAILED",
            RecorderError::InvalidConfig(_) => "INVALID_CONFIG",
            RecorderError::Io(_) => "IO_ERROR",
            RecorderError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }
}

/// Error response for callers across a process boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<RecorderError> for ErrorResponse {
    fn from(error: RecorderError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result type alias using RecorderError
pub type RecorderResult<T> = Result<T, RecorderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response: ErrorResponse = RecorderError::NoAudioSource.into();
        assert_eq!(response.code, "NO_AUDIO_SOURCE");

        let response: ErrorResponse =
            RecorderError::UnsupportedCodec("video/x-unknown".to_string()).into();
        assert_eq!(response.code, "UNSUPPORTED_CODEC");
        assert!(response.message.contains("video/x-unknown"));
    }

    #[test]
    fn test_io_error_converts() {
        let err: RecorderError = std::io::Error::new(std::io::ErrorKind::Other, "disk").into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
