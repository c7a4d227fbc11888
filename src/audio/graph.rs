//! Audio graph primitive
//!
//! A minimal node graph: source nodes wrap capture tracks, destination nodes
//! sum whatever is connected to them and expose the sum as a track.

use crate::capture::traits::AudioTrack;
use crate::utils::error::{RecorderError, RecorderResult};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Handle to a node inside an [`AudioGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Audio graph primitive the mixer builds on
pub trait AudioGraph: Send + Sync {
    /// Create a destination node that sums its inputs
    fn create_destination(&mut self) -> RecorderResult<NodeId>;

    /// Create a source node reading from `track`
    fn create_source(&mut self, track: Arc<dyn AudioTrack>) -> RecorderResult<NodeId>;

    /// Connect a source node into a destination node
    fn connect(&mut self, source: NodeId, destination: NodeId) -> RecorderResult<()>;

    /// Capturable output track of a destination node
    fn output_track(&self, destination: NodeId) -> RecorderResult<Arc<dyn AudioTrack>>;

    /// Release every node. The output track reads silence afterwards.
    fn close(&mut self) -> RecorderResult<()>;
}

/// Creates a fresh graph for each recording
pub trait AudioGraphFactory: Send + Sync {
    fn create_graph(&self) -> Box<dyn AudioGraph>;
}

impl<F> AudioGraphFactory for F
where
    F: Fn() -> Box<dyn AudioGraph> + Send + Sync,
{
    fn create_graph(&self) -> Box<dyn AudioGraph> {
        self()
    }
}

/// Factory for [`SoftwareAudioGraph`]
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareAudioGraphFactory;

impl AudioGraphFactory for SoftwareAudioGraphFactory {
    fn create_graph(&self) -> Box<dyn AudioGraph> {
        Box::new(SoftwareAudioGraph::new())
    }
}

type Inputs = Arc<RwLock<Vec<Arc<dyn AudioTrack>>>>;

enum Node {
    Source(Arc<dyn AudioTrack>),
    Destination(Inputs),
}

/// In-process graph that mixes by summing interleaved f32 samples
pub struct SoftwareAudioGraph {
    nodes: Vec<Node>,
    closed: bool,
}

impl SoftwareAudioGraph {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> RecorderResult<()> {
        if self.closed {
            Err(RecorderError::AudioGraph("graph is closed".to_string()))
        } else {
            Ok(())
        }
    }

    fn node(&self, id: NodeId) -> RecorderResult<&Node> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| RecorderError::AudioGraph(format!("unknown node {}", id.0)))
    }
}

impl Default for SoftwareAudioGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioGraph for SoftwareAudioGraph {
    fn create_destination(&mut self) -> RecorderResult<NodeId> {
        self.ensure_open()?;
        self.nodes
            .push(Node::Destination(Arc::new(RwLock::new(Vec::new()))));
        Ok(NodeId(self.nodes.len() - 1))
    }

    fn create_source(&mut self, track: Arc<dyn AudioTrack>) -> RecorderResult<NodeId> {
        self.ensure_open()?;
        self.nodes.push(Node::Source(track));
        Ok(NodeId(self.nodes.len() - 1))
    }

    fn connect(&mut self, source: NodeId, destination: NodeId) -> RecorderResult<()> {
        self.ensure_open()?;
        let track = match self.node(source)? {
            Node::Source(track) => track.clone(),
            Node::Destination(_) => {
                return Err(RecorderError::AudioGraph(format!(
                    "node {} is not a source",
                    source.0
                )))
            }
        };
        match self.node(destination)? {
            Node::Destination(inputs) => {
                inputs.write().push(track);
                Ok(())
            }
            Node::Source(_) => Err(RecorderError::AudioGraph(format!(
                "node {} is not a destination",
                destination.0
            ))),
        }
    }

    fn output_track(&self, destination: NodeId) -> RecorderResult<Arc<dyn AudioTrack>> {
        self.ensure_open()?;
        match self.node(destination)? {
            Node::Destination(inputs) => Ok(Arc::new(MixedTrack {
                id: format!("mix-{}", destination.0),
                inputs: inputs.clone(),
                scratch: Mutex::new(Vec::new()),
            })),
            Node::Source(_) => Err(RecorderError::AudioGraph(format!(
                "node {} is not a destination",
                destination.0
            ))),
        }
    }

    fn close(&mut self) -> RecorderResult<()> {
        if self.closed {
            return Ok(());
        }
        for node in &self.nodes {
            if let Node::Destination(inputs) = node {
                inputs.write().clear();
            }
        }
        self.nodes.clear();
        self.closed = true;
        Ok(())
    }
}

/// Output of a destination node
struct MixedTrack {
    id: String,
    inputs: Inputs,
    scratch: Mutex<Vec<f32>>,
}

impl AudioTrack for MixedTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn read_samples(&self, out: &mut [f32]) -> usize {
        out.fill(0.0);

        let inputs = self.inputs.read();
        let mut scratch = self.scratch.lock();
        scratch.resize(out.len(), 0.0);

        for input in inputs.iter().filter(|t| !t.is_ended()) {
            scratch.fill(0.0);
            let read = input.read_samples(&mut scratch[..]).min(out.len());
            for (mixed, sample) in out.iter_mut().zip(&scratch[..read]) {
                *mixed += *sample;
            }
        }

        // Soft clip anything the sum pushed past full scale
        for sample in out.iter_mut() {
            if *sample > 1.0 || *sample < -1.0 {
                *sample = sample.tanh();
            }
        }

        out.len()
    }
}
