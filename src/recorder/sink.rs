//! Chunk accumulation and payload assembly
//!
//! The sink is fed from a single producer (the encoder's chunk channel) and
//! is finalized exactly once, after that producer has closed.

use crate::encoder::types::EncodedChunk;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use super::state::RecordingEvent;

/// Where one chunk landed inside the payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSpan {
    pub sequence: u64,
    pub offset: usize,
    pub len: usize,
    pub offset_ms: u64,
}

/// Final concatenation of all chunks: one playable media file
#[derive(Clone, PartialEq, Eq)]
pub struct ContainerPayload {
    pub mime_type: String,
    pub data: Vec<u8>,
    pub chunks: Vec<ChunkSpan>,
}

impl ContainerPayload {
    /// Well-formed payload with no media
    pub fn empty(mime_type: &str) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: Vec::new(),
            chunks: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn sequences(&self) -> Vec<u64> {
        self.chunks.iter().map(|c| c.sequence).collect()
    }
}

impl fmt::Debug for ContainerPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerPayload")
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("chunks", &self.chunks.len())
            .finish()
    }
}

/// Ordered accumulation of encoded chunks
pub struct ChunkSink {
    mime_type: String,
    chunks: Vec<EncodedChunk>,
}

impl ChunkSink {
    pub fn new(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            chunks: Vec::new(),
        }
    }

    /// Append in arrival order. Nothing is reordered or dropped.
    pub fn append(&mut self, chunk: EncodedChunk) {
        let expected = self.chunks.last().map(|c| c.sequence + 1).unwrap_or(0);
        if chunk.sequence != expected {
            tracing::warn!(
                "Chunk arrived with sequence {} (expected {}); keeping arrival order",
                chunk.sequence,
                expected
            );
        }
        self.chunks.push(chunk);
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.chunks.iter().map(|c| c.data.len()).sum()
    }

    /// Concatenate every chunk into one payload. Consumes the sink.
    pub fn finalize(self) -> ContainerPayload {
        let mut data = Vec::with_capacity(self.total_bytes());
        let mut spans = Vec::with_capacity(self.chunks.len());
        for chunk in self.chunks {
            spans.push(ChunkSpan {
                sequence: chunk.sequence,
                offset: data.len(),
                len: chunk.data.len(),
                offset_ms: chunk.offset_ms,
            });
            data.extend_from_slice(&chunk.data);
        }

        tracing::debug!("Assembled {} chunk(s) into {} bytes", spans.len(), data.len());

        ContainerPayload {
            mime_type: self.mime_type,
            data,
            chunks: spans,
        }
    }
}

/// Live counters for a sink being filled
#[derive(Debug, Default)]
pub struct SinkProgress {
    chunks: AtomicU64,
    bytes: AtomicU64,
}

/// Point-in-time copy of [`SinkProgress`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub chunks: u64,
    pub bytes: u64,
}

impl SinkProgress {
    fn record(&self, chunk: &EncodedChunk) {
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(chunk.data.len() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

/// Drain the chunk channel into `sink` until the producer closes it
pub async fn collect_chunks(
    mut rx: mpsc::UnboundedReceiver<EncodedChunk>,
    mut sink: ChunkSink,
    progress: Arc<SinkProgress>,
    events: broadcast::Sender<RecordingEvent>,
) -> ChunkSink {
    while let Some(chunk) = rx.recv().await {
        progress.record(&chunk);
        let _ = events.send(RecordingEvent::ChunkCaptured {
            sequence: chunk.sequence,
            bytes: chunk.data.len(),
        });
        sink.append(chunk);
    }
    sink
}
