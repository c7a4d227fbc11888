//! Draw loop
//!
//! Repaints the composite surface once per refresh tick until cancelled.
//! The loop is the only writer of the surface and never waits on the encoder.

use super::surface::{CompositeSurface, SharedSurface};
use crate::capture::registry::{SourceSlot, VideoSource};
use crate::utils::error::{RecorderError, RecorderResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Interval between passes for a display refresh rate
pub fn refresh_interval(refresh_rate_hz: u32) -> Duration {
    Duration::from_nanos(1_000_000_000 / refresh_rate_hz.max(1) as u64)
}

/// Run one composite pass: clear, then draw every source that has a frame.
///
/// Sources whose track ended or that have no frame are skipped and recorded
/// in `stalled`; they are logged once when they stall and once when they
/// recover. Returns the number of sources drawn.
pub fn composite_pass(
    surface: &mut CompositeSurface,
    sources: &[VideoSource],
    stalled: &mut HashSet<SourceSlot>,
) -> usize {
    surface.clear();

    let mut drawn = 0;
    for source in sources {
        let frame = if source.track.is_ended() {
            None
        } else {
            source.track.current_frame()
        };

        match frame {
            Some(frame) => {
                if surface.draw(source.slot, &frame) {
                    drawn += 1;
                }
                if stalled.remove(&source.slot) {
                    tracing::info!("{:?} source {} is producing frames again", source.slot, source.track.id());
                }
            }
            None => {
                if stalled.insert(source.slot) {
                    tracing::warn!(
                        "{:?} source {} has no frame; leaving its region blank",
                        source.slot,
                        source.track.id()
                    );
                }
            }
        }
    }
    drawn
}

/// Continuous compositor over a shared surface
pub struct FrameCompositor {
    cancel_flag: Arc<AtomicBool>,
    passes: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl FrameCompositor {
    /// Spawn the draw loop. Must be called from within a tokio runtime.
    pub fn start(surface: SharedSurface, sources: Vec<VideoSource>, interval: Duration) -> Self {
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let passes = Arc::new(AtomicU64::new(0));

        tracing::debug!(
            "Starting draw loop for {} source(s) every {:?}",
            sources.len(),
            interval
        );

        let task = tokio::spawn(draw_loop(
            surface,
            sources,
            interval,
            cancel_flag.clone(),
            passes.clone(),
        ));

        Self {
            cancel_flag,
            passes,
            task: Some(task),
        }
    }

    /// Number of completed composite passes
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Cancel the loop and wait for it to exit.
    ///
    /// Once this returns no further draws happen. Calling it again is a no-op.
    pub async fn stop(&mut self) -> RecorderResult<u64> {
        self.cancel_flag.store(true, Ordering::Relaxed);
        if let Some(task) = self.task.take() {
            task.await.map_err(|e| {
                RecorderError::Task(format!("draw loop terminated abnormally: {}", e))
            })?;
            tracing::debug!("Draw loop stopped after {} passes", self.passes());
        }
        Ok(self.passes())
    }
}

impl Drop for FrameCompositor {
    fn drop(&mut self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }
}

async fn draw_loop(
    surface: SharedSurface,
    sources: Vec<VideoSource>,
    interval: Duration,
    cancel_flag: Arc<AtomicBool>,
    passes: Arc<AtomicU64>,
) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stalled = HashSet::new();

    loop {
        ticker.tick().await;
        if cancel_flag.load(Ordering::Relaxed) {
            break;
        }

        {
            let mut surface = surface.write();
            if surface.is_released() {
                break;
            }
            composite_pass(&mut surface, &sources, &mut stalled);
        }
        passes.fetch_add(1, Ordering::Relaxed);
    }
}
