//! Execution units as seen by the scheduler.
//!
//! A unit is eligible for dispatch iff its handshake is complete, it has no
//! job in flight and it has not faulted.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::Error;
use crate::identifiers::{JobId, UnitId};
use crate::transport::{Transport, TransportKind};

use super::queue::{Completion, Job};

// ============================================================================
// Handshake
// ============================================================================

/// Readiness of a unit. `Booting → Ready`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// Waiting for the acknowledgment.
    Booting,
    /// Acknowledgment observed.
    Ready,
}

// ============================================================================
// InFlight
// ============================================================================

/// The job a unit is currently executing.
pub struct InFlight {
    /// Job number, for logging.
    pub job: JobId,
    /// Callback the unit's reply is routed to.
    pub on_complete: Completion,
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("job", &self.job)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// ExecutionUnit
// ============================================================================

/// One unit owned by the pool.
pub struct ExecutionUnit {
    id: UnitId,
    transport: Box<dyn Transport>,
    handshake: Handshake,
    current: Option<InFlight>,
    faulted: bool,
}

impl ExecutionUnit {
    /// Wraps a started transport. The unit begins in [`Handshake::Booting`].
    #[must_use]
    pub fn new(id: UnitId, transport: Box<dyn Transport>) -> Self {
        Self {
            id,
            transport,
            handshake: Handshake::Booting,
            current: None,
            faulted: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.handshake == Handshake::Ready
    }

    #[inline]
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.current.is_some()
    }

    #[inline]
    #[must_use]
    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Returns `true` if the scheduler may dispatch to this unit.
    #[inline]
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.is_ready() && !self.is_running() && !self.faulted
    }

    /// Completes the handshake. Returns `false` if it already was.
    pub fn mark_ready(&mut self) -> bool {
        let transitioned = self.handshake == Handshake::Booting;
        self.handshake = Handshake::Ready;
        transitioned
    }

    /// Sends `job` to the unit and remembers it as in flight.
    ///
    /// On failure the job's callback is handed back with the error. A unit
    /// that refused the payload is faulted and never eligible again.
    pub fn dispatch(&mut self, job: Job) -> Result<(), (Completion, Error)> {
        let Job {
            id,
            payload,
            on_complete,
        } = job;

        match self.transport.send(payload) {
            Ok(()) => {
                self.current = Some(InFlight {
                    job: id,
                    on_complete,
                });
                Ok(())
            }
            Err(e) => {
                if e.is_unit_error() {
                    self.faulted = true;
                }
                Err((on_complete, e))
            }
        }
    }

    /// Clears the in-flight slot on reply.
    pub fn take_reply(&mut self) -> Option<InFlight> {
        self.current.take()
    }

    /// Terminates the transport. Returns the abandoned in-flight job.
    pub fn terminate(&mut self) -> Option<InFlight> {
        self.transport.terminate();
        self.current.take()
    }
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("id", &self.id)
            .field("kind", &self.kind())
            .field("handshake", &self.handshake)
            .field("current", &self.current)
            .field("faulted", &self.faulted)
            .finish()
    }
}
