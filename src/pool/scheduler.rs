//! Dispatch scheduler.
//!
//! Owns the units and the job queue. Every method runs under the pool's
//! scheduler lock, so no two dispatch decisions ever interleave.
//!
//! Callbacks are never invoked here: methods hand back [`Delivery`] values
//! and the caller fires them after releasing the lock.
//!
//! # Dispatch
//!
//! `attempt_dequeue` runs after every submission, handshake completion and
//! job completion:
//!
//! 1. Pick the first unit (construction order) that is ready, idle and not
//!    faulted
//! 2. Pop the head of the queue
//! 3. Store the job in the unit's in-flight slot and send its payload

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::protocol::UnitMessage;
use crate::transport::UnitEvent;

use super::options::DecodePolicy;
use super::queue::{Completion, Job, JobQueue};
use super::status::PoolStatus;
use super::unit::{ExecutionUnit, InFlight};

// ============================================================================
// Types
// ============================================================================

/// A callback together with the result it must receive.
pub type Delivery = (Completion, Result<Value>);

/// Outcome of handling one unit message.
pub enum Handled {
    /// Nothing changed.
    Ignored,
    /// A unit completed its handshake.
    Ready,
    /// A unit replied; the reply is routed to its job.
    Completed(Delivery),
}

/// Work dropped by `destroy`. Dropped by the caller outside the lock.
#[derive(Debug, Default)]
pub struct Abandoned {
    pub queued: Vec<Job>,
    pub in_flight: Vec<InFlight>,
}

// ============================================================================
// Scheduler
// ============================================================================

#[derive(Debug)]
pub struct Scheduler {
    units: Vec<ExecutionUnit>,
    queue: JobQueue,
    decode_policy: DecodePolicy,
    destroyed: bool,
    submitted: u64,
    dispatched: u64,
    completed: u64,
}

impl Scheduler {
    pub fn new(units: Vec<ExecutionUnit>, decode_policy: DecodePolicy) -> Self {
        Self {
            units,
            queue: JobQueue::new(),
            decode_policy,
            destroyed: false,
            submitted: 0,
            dispatched: 0,
            completed: 0,
        }
    }

    #[inline]
    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Appends `job` to the queue tail. Hands the job back once destroyed.
    pub fn enqueue(&mut self, job: Job) -> std::result::Result<(), Job> {
        if self.destroyed {
            return Err(job);
        }

        trace!(job = %job.id, queued = self.queue.len(), "Job queued");
        self.queue.push(job);
        self.submitted += 1;
        Ok(())
    }

    /// Dispatches the head job to the first available unit, if any.
    ///
    /// Returns the callbacks of jobs whose payload could not be delivered.
    /// Each failed send faults its unit and the scan is repeated.
    pub fn attempt_dequeue(&mut self) -> Vec<Delivery> {
        let mut failed = Vec::new();

        while !self.destroyed && !self.queue.is_empty() {
            let Some(index) = self.units.iter().position(ExecutionUnit::is_available) else {
                break;
            };
            let Some(job) = self.queue.pop() else {
                break;
            };

            let job_id = job.id;
            let unit = &mut self.units[index];

            match unit.dispatch(job) {
                Ok(()) => {
                    self.dispatched += 1;
                    debug!(unit = %unit.id(), job = %job_id, "Job dispatched");
                    break;
                }
                Err((on_complete, e)) => {
                    warn!(unit = %unit.id(), job = %job_id, error = %e, "Dispatch failed");
                    failed.push((on_complete, Err(e)));
                }
            }
        }

        failed
    }

    /// Applies one message from a unit.
    pub fn handle(&mut self, event: UnitEvent) -> Handled {
        let UnitEvent { unit, message } = event;

        if self.destroyed {
            trace!(unit = %unit, "Message after destroy ignored");
            return Handled::Ignored;
        }

        let Some(slot) = self.units.get_mut(unit.index()) else {
            warn!(unit = %unit, "Message from unknown unit");
            return Handled::Ignored;
        };

        let reply = match message {
            UnitMessage::Ack if slot.mark_ready() => {
                info!(unit = %unit, "Unit ready");
                return Handled::Ready;
            }
            UnitMessage::Ack => {
                debug!(unit = %unit, "Duplicate acknowledgment ignored");
                return Handled::Ignored;
            }
            UnitMessage::Reply(value) => Ok(value),
            UnitMessage::Undecodable(raw) => Err(raw),
        };

        if !slot.is_ready() {
            warn!(unit = %unit, "Message before handshake ignored");
            return Handled::Ignored;
        }

        let Some(in_flight) = slot.take_reply() else {
            warn!(unit = %unit, "Reply with no job in flight");
            return Handled::Ignored;
        };

        let result = reply.or_else(|raw| self.decode_policy.apply(unit, raw));

        self.completed += 1;
        debug!(unit = %unit, job = %in_flight.job, ok = result.is_ok(), "Job completed");

        Handled::Completed((in_flight.on_complete, result))
    }

    /// Terminates every unit and drops all queued work.
    ///
    /// Idempotent: a second call finds empty collections.
    pub fn destroy(&mut self) -> Abandoned {
        self.destroyed = true;

        let queued = self.queue.drain();
        let in_flight: Vec<_> = self
            .units
            .iter_mut()
            .filter_map(ExecutionUnit::terminate)
            .collect();
        let units = self.units.len();
        self.units.clear();

        if units > 0 || !queued.is_empty() {
            info!(
                units,
                queued = queued.len(),
                in_flight = in_flight.len(),
                "Pool destroyed"
            );
        }

        Abandoned { queued, in_flight }
    }

    pub fn status(&self) -> PoolStatus {
        let count = |pred: fn(&ExecutionUnit) -> bool| self.units.iter().filter(|&u| pred(u)).count();

        PoolStatus {
            units: self.units.len(),
            ready_units: count(ExecutionUnit::is_ready),
            running_units: count(ExecutionUnit::is_running),
            idle_units: count(ExecutionUnit::is_available),
            faulted_units: count(ExecutionUnit::is_faulted),
            queued_jobs: self.queue.len(),
            submitted: self.submitted,
            dispatched: self.dispatched,
            completed: self.completed,
            destroyed: self.destroyed,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
