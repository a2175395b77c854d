//! In-process execution units.
//!
//! Each unit is a Tokio task running a [`UnitProgram`]. Payloads are moved
//! across an unbounded channel as structured values, never re-encoded.
//!
//! # Unit Task
//!
//! The task:
//!
//! 1. Runs [`UnitProgram::boot`]
//! 2. Delivers `UnitMessage::Ack`
//! 3. Handles payloads one at a time, delivering one `Reply` each
//!
//! A panicking program stops its unit. The scheduler does not detect this;
//! the job in flight never completes and the next send marks the unit
//! faulted.

// ============================================================================
// Imports
// ============================================================================

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace};

use crate::error::{Error, Result};
use crate::identifiers::UnitId;
use crate::program::UnitProgram;
use crate::protocol::UnitMessage;

use super::{Inbox, Transport, TransportKind};

// ============================================================================
// NativeState
// ============================================================================

/// Lifecycle of the underlying task.
enum NativeState {
    /// Not started yet.
    Idle,
    /// Task spawned.
    Running {
        payload_tx: mpsc::UnboundedSender<Value>,
        task: JoinHandle<()>,
    },
    /// Terminated; the handle is inert.
    Terminated,
}

// ============================================================================
// NativeTransport
// ============================================================================

/// Transport for an in-process unit.
pub struct NativeTransport {
    /// Unit this transport serves.
    unit: UnitId,
    /// Program run by the unit task.
    program: Arc<dyn UnitProgram>,
    /// Task state.
    state: NativeState,
}

impl NativeTransport {
    /// Creates a transport that will run `program` once started.
    #[must_use]
    pub fn new(unit: UnitId, program: Arc<dyn UnitProgram>) -> Self {
        Self {
            unit,
            program,
            state: NativeState::Idle,
        }
    }

    /// Returns `true` once [`Transport::terminate`] has run.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, NativeState::Terminated)
    }

    /// Body of the unit task.
    async fn run_unit(
        program: Arc<dyn UnitProgram>,
        mut payload_rx: mpsc::UnboundedReceiver<Value>,
        inbox: Inbox,
    ) {
        let unit = inbox.unit();

        if AssertUnwindSafe(program.boot()).catch_unwind().await.is_err() {
            error!(unit = %unit, "Unit program panicked while booting");
            return;
        }

        if !inbox.deliver(UnitMessage::Ack) {
            return;
        }
        debug!(unit = %unit, "Native unit booted");

        while let Some(payload) = payload_rx.recv().await {
            match AssertUnwindSafe(program.handle(payload)).catch_unwind().await {
                Ok(reply) => {
                    if !inbox.deliver(UnitMessage::Reply(reply)) {
                        break;
                    }
                }
                Err(_) => {
                    error!(unit = %unit, "Unit program panicked, unit stopped");
                    return;
                }
            }
        }

        trace!(unit = %unit, "Native unit task finished");
    }
}

impl Transport for NativeTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Native
    }

    fn start(&mut self, inbox: Inbox) -> Result<()> {
        match self.state {
            NativeState::Idle => {}
            NativeState::Running { .. } => {
                debug!(unit = %self.unit, "Native unit already started");
                return Ok(());
            }
            NativeState::Terminated => return Err(Error::unit_terminated(self.unit)),
        }

        let (payload_tx, payload_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(Self::run_unit(
            Arc::clone(&self.program),
            payload_rx,
            inbox,
        ));

        self.state = NativeState::Running { payload_tx, task };
        Ok(())
    }

    fn send(&mut self, payload: Value) -> Result<()> {
        match &self.state {
            NativeState::Running { payload_tx, .. } => payload_tx
                .send(payload)
                .map_err(|_| Error::unit_unavailable(self.unit)),
            NativeState::Idle => Err(Error::unit_unavailable(self.unit)),
            NativeState::Terminated => Err(Error::unit_terminated(self.unit)),
        }
    }

    fn terminate(&mut self) {
        if let NativeState::Running { task, .. } =
            std::mem::replace(&mut self.state, NativeState::Terminated)
        {
            task.abort();
            debug!(unit = %self.unit, "Native unit terminated");
        }
    }
}

impl Drop for NativeTransport {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ============================================================================
// Tests
// ============================================================================
