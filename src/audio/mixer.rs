//! Audio mixer
//!
//! Fans every audio source of a recording into one destination node and
//! exposes the destination's track as the recording's audio.

use super::graph::{AudioGraph, NodeId};
use crate::capture::traits::AudioTrack;
use crate::utils::error::{RecorderError, RecorderResult};
use std::sync::Arc;

/// A built audio graph plus its mixed output
pub struct AudioMixer {
    graph: Box<dyn AudioGraph>,
    destination: NodeId,
    sources: Vec<NodeId>,
    mixed: Arc<dyn AudioTrack>,
    released: bool,
}

impl AudioMixer {
    /// Connect every source into a single destination.
    ///
    /// All sources are connected before the output track is taken; the set
    /// is fixed for the life of the mixer.
    pub fn build(
        mut graph: Box<dyn AudioGraph>,
        sources: &[Arc<dyn AudioTrack>],
    ) -> RecorderResult<Self> {
        if sources.is_empty() {
            return Err(RecorderError::NoAudioSource);
        }

        let destination = graph.create_destination()?;
        let mut nodes = Vec::with_capacity(sources.len());
        for track in sources {
            let node = graph.create_source(track.clone())?;
            graph.connect(node, destination)?;
            nodes.push(node);
        }
        let mixed = graph.output_track(destination)?;

        tracing::debug!("Audio mixer built with {} source(s)", nodes.len());

        Ok(Self {
            graph,
            destination,
            sources: nodes,
            mixed,
            released: false,
        })
    }

    /// The mixed output track
    pub fn output(&self) -> Arc<dyn AudioTrack> {
        self.mixed.clone()
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    /// Close the underlying graph. Safe to call more than once.
    pub fn release(&mut self) -> RecorderResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.graph.close()
    }
}

impl Drop for AudioMixer {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.graph.close() {
                tracing::warn!("Failed to close audio graph on drop: {}", e);
            }
        }
    }
}
