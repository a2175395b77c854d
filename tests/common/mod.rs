//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing_subscriber::EnvFilter;
use worker_pool::transport::FrameCallback;
use worker_pool::{FrameScheduler, PoolStatus, UnitProgram, WorkerPool};

/// Upper bound for any wait in these tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Installs a subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Polls the pool status until `condition` holds.
pub async fn wait_until<F>(pool: &WorkerPool, condition: F) -> PoolStatus
where
    F: Fn(&PoolStatus) -> bool,
{
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        let status = pool.status();
        if condition(&status) {
            return status;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached, last status: {status:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Echo program whose boot and replies wait for permits.
#[derive(Clone)]
pub struct GatedEcho {
    /// One permit per unit allowed to finish booting.
    pub boot: Arc<Semaphore>,
    /// One permit per reply allowed out.
    pub replies: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl GatedEcho {
    /// Both gates start closed.
    pub fn closed() -> Self {
        Self {
            boot: Arc::new(Semaphore::new(0)),
            replies: Arc::new(Semaphore::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Units boot immediately; replies are gated.
    pub fn booted() -> Self {
        let gated = Self::closed();
        gated.boot.add_permits(1024);
        gated
    }

    /// Highest number of payloads handled at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UnitProgram for GatedEcho {
    async fn boot(&self) {
        if let Ok(permit) = self.boot.acquire().await {
            permit.forget();
        }
    }

    async fn handle(&self, payload: Value) -> Value {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Ok(permit) = self.replies.acquire().await {
            permit.forget();
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        payload
    }
}

/// Frame scheduler that only runs callbacks when told to.
#[derive(Default)]
pub struct ManualFrames {
    pending: Mutex<Vec<FrameCallback>>,
}

impl ManualFrames {
    /// Number of callbacks waiting for a frame.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Runs every pending callback. Returns how many ran.
    pub fn fire(&self) -> usize {
        let callbacks = std::mem::take(&mut *self.pending.lock());
        let count = callbacks.len();
        for callback in callbacks {
            callback();
        }
        count
    }
}

impl FrameScheduler for ManualFrames {
    fn schedule_after_next_frame(&self, callback: FrameCallback) {
        self.pending.lock().push(callback);
    }
}
