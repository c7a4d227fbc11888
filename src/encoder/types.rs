//! Encoder types and configuration
//!
//! This module defines the encoder options record, container/codec
//! identifiers, and the chunks the encoder emits.

use crate::utils::error::{RecorderError, RecorderResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default container/codec identifier
pub const DEFAULT_MIME_TYPE: &str = "video/webm;codecs=\"vp9,opus\"";

/// Encoder options record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EncoderOptions {
    /// Container/codec identifier, e.g. `video/webm;codecs="vp9,opus"`
    pub mime_type: String,

    pub video_bits_per_second: u32,

    pub audio_bits_per_second: u32,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            mime_type: DEFAULT_MIME_TYPE.to_string(),
            video_bits_per_second: 2_000_000,
            audio_bits_per_second: 48_000,
        }
    }
}

impl EncoderOptions {
    /// Same options with a different container/codec identifier
    pub fn with_mime_type(&self, mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            ..self.clone()
        }
    }
}

/// Parsed container/codec identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    raw: String,
    media_type: String,
    subtype: String,
    codecs: Vec<String>,
}

impl MimeType {
    /// Parse `type/subtype[;codecs="a,b"]`.
    ///
    /// Malformed identifiers are reported as `UnsupportedCodec`.
    pub fn parse(raw: &str) -> RecorderResult<Self> {
        let mut parts = raw.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (media_type, subtype) = essence
            .split_once('/')
            .filter(|(t, s)| !t.trim().is_empty() && !s.trim().is_empty())
            .ok_or_else(|| RecorderError::UnsupportedCodec(raw.to_string()))?;

        let mut codecs = Vec::new();
        for param in parts {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            if key.trim().eq_ignore_ascii_case("codecs") {
                codecs = value
                    .trim()
                    .trim_matches('"')
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect();
            }
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            media_type: media_type.trim().to_ascii_lowercase(),
            subtype: subtype.trim().to_ascii_lowercase(),
            codecs,
        })
    }

    /// The identifier as given
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// `type/subtype` without parameters
    pub fn essence(&self) -> String {
        format!("{}/{}", self.media_type, self.subtype)
    }

    pub fn container(&self) -> &str {
        &self.subtype
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    /// File extension for the container
    pub fn extension(&self) -> &'static str {
        match self.subtype.as_str() {
            "webm" => "webm",
            "mp4" => "mp4",
            "x-matroska" => "mkv",
            "ogg" => "ogg",
            _ => "bin",
        }
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Encoder lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncoderState {
    #[default]
    Idle,
    Recording,
    /// Terminal
    Stopped,
}

/// One unit of encoded media emitted at a time-slice boundary
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedChunk {
    /// Monotonic from 0 within a recording
    pub sequence: u64,
    pub data: Vec<u8>,
    /// Wall-clock arrival time
    pub captured_at: DateTime<Utc>,
    /// Milliseconds since the encoder started
    pub offset_ms: u64,
}

impl EncodedChunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for EncodedChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedChunk")
            .field("sequence", &self.sequence)
            .field("bytes", &self.data.len())
            .field("captured_at", &self.captured_at)
            .field("offset_ms", &self.offset_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_mime_type() {
        let mime = MimeType::parse(DEFAULT_MIME_TYPE).unwrap();
        assert_eq!(mime.essence(), "video/webm");
        assert_eq!(mime.container(), "webm");
        assert_eq!(mime.codecs(), &["vp9".to_string(), "opus".to_string()]);
        assert_eq!(mime.extension(), "webm");
        assert_eq!(mime.as_str(), DEFAULT_MIME_TYPE);
    }

    #[test]
    fn test_parse_without_codecs() {
        let mime = MimeType::parse("video/mp4").unwrap();
        assert!(mime.codecs().is_empty());
        assert_eq!(mime.extension(), "mp4");

        let mime = MimeType::parse("video/x-matroska; codecs=avc1").unwrap();
        assert_eq!(mime.codecs(), &["avc1".to_string()]);
        assert_eq!(mime.extension(), "mkv");
    }

    #[test]
    fn test_unknown_container_extension() {
        assert_eq!(MimeType::parse("video/quicktime").unwrap().extension(), "bin");
    }

    #[test]
    fn test_malformed_mime_type_is_unsupported() {
        for raw in ["", "webm", "video/", "/webm", ";codecs=vp8"] {
            let err = MimeType::parse(raw).err().unwrap();
            assert!(matches!(err, RecorderError::UnsupportedCodec(_)), "{raw:?}");
        }
    }

    #[test]
    fn test_options_serde_field_names() {
        let json = serde_json::to_value(EncoderOptions::default()).unwrap();
        assert_eq!(json["mimeType"], DEFAULT_MIME_TYPE);
        assert_eq!(json["videoBitsPerSecond"], 2_000_000);
        assert_eq!(json["audioBitsPerSecond"], 48_000);

        let parsed: EncoderOptions =
            serde_json::from_str(r#"{"mimeType":"video/webm;codecs=\"vp8,opus\""}"#).unwrap();
        assert_eq!(parsed.video_bits_per_second, 2_000_000);
        assert!(parsed.mime_type.contains("vp8"));
    }
}
