//! Progress indicator shown while a lookup runs
//!
//! Runs as its own tokio task, independent of the search: it only draws frames
//! until told to stop.

use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Frames in one animation cycle
pub const FRAME_COUNT: u64 = 23;

/// Time each frame stays up
pub const FRAME_MS: u64 = 60;

/// Redraw interval
pub const TICK: Duration = Duration::from_millis(10);

/// Frame to show `elapsed` after the animation started
pub fn frame_at(elapsed: Duration) -> usize {
    let ms = elapsed.as_millis() as u64;
    ((ms + FRAME_MS / 2) / FRAME_MS % FRAME_COUNT) as usize
}

pub struct ProgressIndicator {
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressIndicator {
    /// Spawn the animation; `on_frame` is called on every tick
    pub fn start<F>(mut on_frame: F) -> Self
    where
        F: FnMut(usize) + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(TICK);

            loop {
                tokio::select! {
                    // Also fires when the indicator is dropped without stop()
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => on_frame(frame_at(started.elapsed())),
                }
            }
        });

        Self { stop_tx, handle }
    }

    /// Stop the animation, wait for the last frame, then run `on_stop`
    pub async fn stop<C>(self, on_stop: C)
    where
        C: FnOnce(),
    {
        let _ = self.stop_tx.send(());
        if let Err(e) = self.handle.await {
            log::warn!("progress indicator task failed: {}", e);
        }
        on_stop();
    }
}
