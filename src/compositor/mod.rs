//! Video compositing
//!
//! Lays out the recording's video sources on one surface and keeps that
//! surface repainted while recording.

pub mod frame_loop;
pub mod surface;

pub use frame_loop::{composite_pass, refresh_interval, FrameCompositor};
pub use surface::{CompositeSurface, Region, SharedSurface, SurfaceCapture, SurfaceLayout};
