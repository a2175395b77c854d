//! Worker pool.
//!
//! A fixed set of execution units fed from one FIFO job queue.
//!
//! # Architecture
//!
//! ```text
//!  submit ─► ┌──────────────────────────────┐  send   ┌──────────────┐
//!            │ Mutex<Scheduler>             │────────►│ unit-0 .. N  │
//!            │  units (construction order)  │         │ (Transport)  │
//!            │  job queue (FIFO)            │         └──────┬───────┘
//!            └──────────────▲───────────────┘                │ Inbox
//!                           │ on_event                        │
//!                    ┌──────┴────────┐    mpsc<UnitEvent>     │
//!                    │ event loop    │◄───────────────────────┘
//!                    └───────────────┘
//! ```
//!
//! Scheduler state is touched only under its lock. Unit messages are
//! applied one at a time by a single event-loop task. Completion callbacks
//! always run after the lock is released, so they may submit more work.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use worker_pool::{WorkerPool, program_fn};
//!
//! # async fn example() -> worker_pool::Result<()> {
//! let pool = WorkerPool::builder()
//!     .units(2)
//!     .unit_source("double")
//!     .program("double", program_fn(|v| json!(v.as_i64().unwrap_or(0) * 2)))
//!     .build()?;
//!
//! let reply = pool.run(json!(21))?.await?;
//! assert_eq!(reply, json!(42));
//!
//! pool.destroy();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

mod builder;
mod handle;
mod options;
mod queue;
mod scheduler;
mod status;
mod unit;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::{JobId, UnitId};
use crate::program::ProgramRegistry;
use crate::transport::{
    FallbackTransport, FrameScheduler, Inbox, NativeTransport, Transport, TransportKind,
    UnitEvent,
};

use self::queue::Job;
use self::scheduler::{Delivery, Handled, Scheduler};
use self::unit::ExecutionUnit;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::PoolBuilder;
pub use handle::JobHandle;
pub use options::{DecodePolicy, PoolOptions, TransportMode};
pub use queue::Completion;
pub use status::PoolStatus;

// ============================================================================
// Shared
// ============================================================================

/// State shared between the pool handle and its event loop.
struct Shared {
    scheduler: Mutex<Scheduler>,
}

impl Shared {
    /// Queues `job` and tries to dispatch it.
    fn submit(&self, job: Job) -> Result<JobId> {
        let id = job.id;

        let mut scheduler = self.scheduler.lock();
        let failed = match scheduler.enqueue(job) {
            Ok(()) => scheduler.attempt_dequeue(),
            Err(rejected) => {
                drop(scheduler);
                drop(rejected);
                warn!(job = %id, "Submit after destroy rejected");
                return Err(Error::PoolDestroyed);
            }
        };
        drop(scheduler);

        deliver(failed);
        Ok(id)
    }

    /// Applies one unit message.
    fn on_event(&self, event: UnitEvent) {
        let handled = self.scheduler.lock().handle(event);

        match handled {
            Handled::Ignored => return,
            Handled::Ready => {}
            Handled::Completed(delivery) => deliver(vec![delivery]),
        }

        let failed = self.scheduler.lock().attempt_dequeue();
        deliver(failed);
    }
}

/// Invokes completion callbacks. Must be called without the scheduler lock.
fn deliver(deliveries: Vec<Delivery>) {
    for (on_complete, result) in deliveries {
        if catch_unwind(AssertUnwindSafe(move || on_complete(result))).is_err() {
            error!("Completion callback panicked");
        }
    }
}

/// Drains unit messages until every unit is gone or the pool is dropped.
async fn run_event_loop(shared: Weak<Shared>, mut events: mpsc::UnboundedReceiver<UnitEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.on_event(event);
    }

    debug!("Pool event loop terminated");
}

// ============================================================================
// WorkerPool
// ============================================================================

/// A fixed-size pool of execution units.
///
/// Units are created eagerly and begin their handshake at construction.
/// The unit set never changes size. Dropping the pool destroys it.
pub struct WorkerPool {
    shared: Arc<Shared>,
    kind: TransportKind,
    units: usize,
    event_loop: Mutex<Option<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a builder.
    #[inline]
    #[must_use]
    pub fn builder() -> PoolBuilder {
        PoolBuilder::new()
    }

    /// Creates a pool of `unit_count` units with no registered programs.
    ///
    /// With an empty registry the transport resolves to fallback, so every
    /// unit runs `fallback_resource`. Use [`WorkerPool::builder`] to run
    /// in-process programs. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// See [`PoolBuilder::build`].
    pub fn new(
        unit_count: usize,
        unit_source: impl Into<String>,
        fallback_resource: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::builder()
            .units(unit_count)
            .unit_source(unit_source)
            .fallback_resource(fallback_resource)
            .build()
    }

    /// Creates and starts every unit, then spawns the event loop.
    fn start(
        options: PoolOptions,
        kind: TransportKind,
        registry: &ProgramRegistry,
        frames: Arc<dyn FrameScheduler>,
    ) -> Result<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let program = registry.get(&options.unit_source);

        let mut units = Vec::with_capacity(options.units);
        for index in 0..options.units {
            let id = UnitId::new(u32::try_from(index).map_err(|_| {
                Error::config(format!("unit count {} exceeds {}", options.units, u32::MAX))
            })?);

            let mut transport: Box<dyn Transport> = match (kind, &program) {
                (TransportKind::Native, Some(program)) => {
                    Box::new(NativeTransport::new(id, Arc::clone(program)))
                }
                (TransportKind::Native, None) => {
                    return Err(Error::program_not_found(&options.unit_source));
                }
                (TransportKind::Fallback, _) => Box::new(FallbackTransport::new(
                    id,
                    options.fallback_resource.clone(),
                    options.fallback_args.clone(),
                    Arc::clone(&frames),
                )),
            };

            transport.start(Inbox::new(id, events_tx.clone()))?;
            units.push(ExecutionUnit::new(id, transport));
        }
        drop(events_tx);

        let shared = Arc::new(Shared {
            scheduler: Mutex::new(Scheduler::new(units, options.decode_policy)),
        });
        let event_loop = tokio::spawn(run_event_loop(Arc::downgrade(&shared), events_rx));

        info!(
            units = options.units,
            transport = %kind,
            source = %options.unit_source,
            "Worker pool started"
        );

        Ok(Self {
            shared,
            kind,
            units: options.units,
            event_loop: Mutex::new(Some(event_loop)),
        })
    }

    /// Submits a job. `on_complete` receives the unit's reply.
    ///
    /// Never blocks; the queue is unbounded. If the pool is destroyed before
    /// the job completes, `on_complete` is dropped without being called.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolDestroyed`] after [`destroy`](Self::destroy).
    pub fn submit<F>(&self, payload: impl Into<Value>, on_complete: F) -> Result<JobId>
    where
        F: FnOnce(Result<Value>) + Send + 'static,
    {
        self.shared
            .submit(Job::new(payload.into(), Box::new(on_complete)))
    }

    /// Submits a job and returns a future of its reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PoolDestroyed`] after [`destroy`](Self::destroy).
    /// The handle itself resolves to [`Error::JobAbandoned`] if the pool is
    /// destroyed first.
    pub fn run(&self, payload: impl Into<Value>) -> Result<JobHandle> {
        let job_id = JobId::next();
        let (handle, on_complete) = JobHandle::channel(job_id);

        self.shared.submit(Job {
            id: job_id,
            payload: payload.into(),
            on_complete,
        })?;

        Ok(handle)
    }

    /// Terminates every unit and discards all queued and in-flight jobs.
    ///
    /// Their callbacks are never invoked. Idempotent.
    pub fn destroy(&self) {
        let abandoned = self.shared.scheduler.lock().destroy();

        if let Some(event_loop) = self.event_loop.lock().take() {
            event_loop.abort();
        }

        drop(abandoned);
    }

    /// Returns `true` once [`destroy`](Self::destroy) has run.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shared.scheduler.lock().is_destroyed()
    }

    /// Returns a snapshot of the pool.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        self.shared.scheduler.lock().status()
    }

    /// Returns the transport variant backing every unit.
    #[inline]
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.kind
    }

    /// Returns the unit count fixed at construction.
    ///
    /// Unaffected by [`destroy`](Self::destroy); use
    /// [`status`](Self::status) for the live unit count, which drops to zero.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.units
    }

    /// Returns `true` if the pool was built with no units. Built pools
    /// always have one, so this stays `false` after
    /// [`destroy`](Self::destroy).
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units == 0
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("kind", &self.kind)
            .field("units", &self.units)
            .field("status", &self.status())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
