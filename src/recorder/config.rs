//! Recording configuration
//!
//! Configuration is plain JSON. Every field has a default, so a partial file
//! (or `{}`) is a valid configuration.

use crate::encoder::types::{EncoderOptions, MimeType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for a recording session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordingConfig {
    /// Options handed to the encoder
    pub encoder: EncoderOptions,

    /// Identifiers tried in order when `encoder.mime_type` is unsupported
    pub fallback_mime_types: Vec<String>,

    /// Wall-clock interval between encoded chunks
    pub timeslice_ms: u64,

    /// Draw loop frequency
    pub refresh_rate_hz: u32,

    /// Suggested filename without extension
    pub filename_stem: String,

    /// Mix the screen-share's audio track in when one exists
    pub include_screen_audio: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            encoder: EncoderOptions::default(),
            fallback_mime_types: Vec::new(),
            timeslice_ms: 5000,
            refresh_rate_hz: 60,
            filename_stem: "recorded-video".to_string(),
            include_screen_audio: true,
        }
    }
}

impl RecordingConfig {
    pub fn timeslice(&self) -> Duration {
        Duration::from_millis(self.timeslice_ms)
    }

    /// `<stem>.<extension of the container>`
    pub fn filename_for(&self, mime: &MimeType) -> String {
        format!("{}.{}", self.filename_stem, mime.extension())
    }

    /// Filename for the configured identifier, before negotiation
    pub fn default_filename(&self) -> String {
        match MimeType::parse(&self.encoder.mime_type) {
            Ok(mime) => self.filename_for(&mime),
            Err(_) => format!("{}.bin", self.filename_stem),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeslice_ms == 0 {
            return Err(ConfigError::Invalid("timesliceMs must be greater than zero".to_string()));
        }
        if !(1..=240).contains(&self.refresh_rate_hz) {
            return Err(ConfigError::Invalid(format!(
                "refreshRateHz must be within 1..=240, got {}",
                self.refresh_rate_hz
            )));
        }
        if self.encoder.video_bits_per_second == 0 || self.encoder.audio_bits_per_second == 0 {
            return Err(ConfigError::Invalid("bitrates must be greater than zero".to_string()));
        }
        if self.filename_stem.trim().is_empty() {
            return Err(ConfigError::Invalid("filenameStem must not be empty".to_string()));
        }
        if self.filename_stem.contains(['/', '\\']) || self.filename_stem.contains("..") {
            return Err(ConfigError::Invalid(format!(
                "filenameStem must be a plain file name, got {:?}",
                self.filename_stem
            )));
        }
        Ok(())
    }
}

/// Read a configuration file
pub fn load_config(path: &Path) -> Result<RecordingConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RecordingConfig = serde_json::from_str(&content)?;
    config.validate()?;

    tracing::debug!("Loaded recording config from {:?}", path);

    Ok(config)
}

/// Write a configuration file, creating parent directories as needed
pub fn save_config(config: &RecordingConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content)?;

    Ok(())
}
