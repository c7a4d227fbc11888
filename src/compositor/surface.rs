//! Composite surface and layout
//!
//! Video sources are laid out side by side in slot order: the surface is as
//! wide as all sources together and as tall as the tallest one. Each slot
//! owns a fixed region starting at the cumulative width of the slots before it.

use crate::capture::registry::{SourceSlot, VideoSource};
use crate::capture::traits::VideoFrame;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A rectangle on the composite surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }
}

/// Surface dimensions plus the region assigned to each slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceLayout {
    pub width: u32,
    pub height: u32,
    pub regions: Vec<(SourceSlot, Region)>,
}

impl SurfaceLayout {
    /// Compute the side-by-side layout for a set of sources.
    ///
    /// Sources are placed in slot order regardless of input order.
    pub fn compute(sources: &[VideoSource]) -> Self {
        let mut ordered: Vec<&VideoSource> = sources.iter().collect();
        ordered.sort_by_key(|s| s.slot);

        let mut regions = Vec::with_capacity(ordered.len());
        let mut x = 0u32;
        let mut height = 0u32;
        for source in ordered {
            let size = source.resolution();
            regions.push((
                source.slot,
                Region {
                    x,
                    y: 0,
                    width: size.width,
                    height: size.height,
                },
            ));
            x += size.width;
            height = height.max(size.height);
        }

        Self {
            width: x,
            height,
            regions,
        }
    }

    pub fn region(&self, slot: SourceSlot) -> Option<Region> {
        self.regions
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, r)| *r)
    }
}

/// Off-screen RGBA8 canvas holding the composited frame
pub struct CompositeSurface {
    layout: SurfaceLayout,
    pixels: Vec<u8>,
    released: bool,
}

/// Surface shared between the draw loop (sole writer) and the encoder
pub type SharedSurface = Arc<RwLock<CompositeSurface>>;

impl CompositeSurface {
    /// Allocate a surface sized for `sources`
    pub fn create(sources: &[VideoSource]) -> Self {
        Self::from_layout(SurfaceLayout::compute(sources))
    }

    pub fn from_layout(layout: SurfaceLayout) -> Self {
        let len = (layout.width as usize) * (layout.height as usize) * 4;
        Self {
            layout,
            pixels: vec![0u8; len],
            released: false,
        }
    }

    pub fn into_shared(self) -> SharedSurface {
        Arc::new(RwLock::new(self))
    }

    pub fn width(&self) -> u32 {
        self.layout.width
    }

    pub fn height(&self) -> u32 {
        self.layout.height
    }

    pub fn layout(&self) -> &SurfaceLayout {
        &self.layout
    }

    pub fn region(&self, slot: SourceSlot) -> Option<Region> {
        self.layout.region(slot)
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Reset every pixel to transparent black
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    /// Draw `frame` at native resolution into the region of `slot`.
    ///
    /// Anything beyond the region is clipped. Returns false when nothing was
    /// drawn (unknown slot, malformed frame, released surface).
    pub fn draw(&mut self, slot: SourceSlot, frame: &VideoFrame) -> bool {
        if self.released {
            return false;
        }
        let Some(region) = self.layout.region(slot) else {
            return false;
        };
        if !frame.is_well_formed() {
            tracing::warn!(
                "Skipping malformed {:?} frame: {} bytes for {}x{}",
                slot,
                frame.data.len(),
                frame.width,
                frame.height
            );
            return false;
        }

        let copy_width = frame.width.min(region.width).min(self.layout.width - region.x) as usize;
        let copy_height = frame.height.min(region.height).min(self.layout.height) as usize;
        if copy_width == 0 || copy_height == 0 {
            return false;
        }

        let surface_stride = self.layout.width as usize * 4;
        let frame_stride = frame.width as usize * 4;
        let row_bytes = copy_width * 4;
        for row in 0..copy_height {
            let src = row * frame_stride;
            let dst = (region.y as usize + row) * surface_stride + region.x as usize * 4;
            self.pixels[dst..dst + row_bytes].copy_from_slice(&frame.data[src..src + row_bytes]);
        }
        true
    }

    /// RGBA value at (x, y), or `None` outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.layout.width || y >= self.layout.height || self.released {
            return None;
        }
        let idx = ((y as usize) * (self.layout.width as usize) + x as usize) * 4;
        let mut rgba = [0u8; 4];
        rgba.copy_from_slice(&self.pixels[idx..idx + 4]);
        Some(rgba)
    }

    /// Copy of the current surface contents
    pub fn capture(&self) -> VideoFrame {
        VideoFrame {
            width: self.layout.width,
            height: self.layout.height,
            data: self.pixels.clone(),
        }
    }

    /// Free the pixel buffer. Later draws are ignored.
    pub fn release(&mut self) {
        self.pixels = Vec::new();
        self.released = true;
    }
}

/// Live output stream of a composite surface
///
/// Readers see whatever the draw loop last wrote; there is no back-pressure.
#[derive(Clone)]
pub struct SurfaceCapture {
    surface: SharedSurface,
}

impl SurfaceCapture {
    pub fn new(surface: SharedSurface) -> Self {
        Self { surface }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let surface = self.surface.read();
        (surface.width(), surface.height())
    }

    /// Snapshot of the current frame, `None` once the surface is released
    pub fn grab_frame(&self) -> Option<VideoFrame> {
        let surface = self.surface.read();
        if surface.is_released() {
            None
        } else {
            Some(surface.capture())
        }
    }
}
