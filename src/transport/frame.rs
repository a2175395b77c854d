//! Deferred attachment scheduling.
//!
//! Fallback units are not attached synchronously in `start`; attachment is
//! pushed to the next frame tick so constructing a pool never pays for
//! process spawning inline.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// One frame at 60 Hz, truncated to whole milliseconds.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);

// ============================================================================
// Types
// ============================================================================

/// Callback run once on the next frame.
pub type FrameCallback = Box<dyn FnOnce() + Send + 'static>;

// ============================================================================
// FrameScheduler
// ============================================================================

/// Runs a callback once, on or before the next frame.
///
/// Implementations must run the callback at least once and never
/// synchronously inside `schedule_after_next_frame`. The callback must run
/// within a Tokio runtime context: fallback attachment spawns the child
/// process and its I/O tasks from it, which panics outside a runtime.
pub trait FrameScheduler: Send + Sync {
    /// Schedules `callback` for the next frame.
    fn schedule_after_next_frame(&self, callback: FrameCallback);
}

// ============================================================================
// IntervalFrameScheduler
// ============================================================================

/// Frame scheduler driven by the Tokio timer.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalFrameScheduler {
    interval: Duration,
}

impl IntervalFrameScheduler {
    /// Creates a scheduler with the given frame interval.
    #[inline]
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Returns the frame interval.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for IntervalFrameScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameScheduler for IntervalFrameScheduler {
    fn schedule_after_next_frame(&self, callback: FrameCallback) {
        let interval = self.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            callback();
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
