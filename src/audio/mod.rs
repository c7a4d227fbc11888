//! Audio mixing
//!
//! Sums every audio source of a recording into one track.

pub mod graph;
pub mod mixer;

pub use graph::{AudioGraph, AudioGraphFactory, NodeId, SoftwareAudioGraph, SoftwareAudioGraphFactory};
pub use mixer::AudioMixer;
