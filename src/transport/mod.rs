//! Execution unit transports.
//!
//! A transport wraps one execution unit and hides whether it runs
//! in-process or out-of-process.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   send(payload)    ┌──────────────────────────┐
//! │                 │───────────────────►│ NativeTransport          │
//! │   Scheduler     │                    │  Tokio task + channel    │
//! │                 │                    ├──────────────────────────┤
//! │                 │◄───────────────────│ FallbackTransport        │
//! └─────────────────┘  Inbox → UnitEvent │  child process, JSON/NDJ │
//!                                        └──────────────────────────┘
//! ```
//!
//! # Unit Lifecycle
//!
//! 1. `Transport::start` - instantiate the unit and hand it its [`Inbox`]
//! 2. Unit boots and delivers `UnitMessage::Ack`
//! 3. `Transport::send` - one payload per dispatch, one reply each
//! 4. `Transport::terminate` - stop the unit; the handle becomes inert
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `native` | In-process unit on a Tokio task |
//! | `fallback` | Child-process unit speaking the text wire protocol |
//! | `frame` | Deferred attachment scheduling |

// ============================================================================
// Submodules
// ============================================================================

/// In-process transport.
pub mod native;

/// Out-of-process text transport.
pub mod fallback;

/// Frame scheduling helper for deferred attachment.
pub mod frame;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::identifiers::UnitId;
use crate::protocol::UnitMessage;

// ============================================================================
// Re-exports
// ============================================================================

pub use fallback::FallbackTransport;
pub use frame::{FrameCallback, FrameScheduler, IntervalFrameScheduler};
pub use native::NativeTransport;

// ============================================================================
// TransportKind
// ============================================================================

/// Which transport variant backs the units of a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process unit.
    Native,
    /// Child-process unit.
    Fallback,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => f.write_str("native"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

// ============================================================================
// UnitEvent
// ============================================================================

/// A message from a unit, tagged with the unit it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitEvent {
    /// Sending unit.
    pub unit: UnitId,
    /// Decoded message.
    pub message: UnitMessage,
}

// ============================================================================
// Inbox
// ============================================================================

/// The single listener a unit delivers its messages to.
///
/// Handed to [`Transport::start`]; every message the unit produces for its
/// whole lifetime goes through it.
#[derive(Debug, Clone)]
pub struct Inbox {
    unit: UnitId,
    tx: mpsc::UnboundedSender<UnitEvent>,
}

impl Inbox {
    /// Creates an inbox that tags messages with `unit`.
    #[inline]
    #[must_use]
    pub fn new(unit: UnitId, tx: mpsc::UnboundedSender<UnitEvent>) -> Self {
        Self { unit, tx }
    }

    /// Returns the unit this inbox belongs to.
    #[inline]
    #[must_use]
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    /// Delivers one message.
    ///
    /// Returns `false` once the pool stopped listening.
    pub fn deliver(&self, message: UnitMessage) -> bool {
        self.tx
            .send(UnitEvent {
                unit: self.unit,
                message,
            })
            .is_ok()
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Uniform view of one execution unit.
pub trait Transport: Send {
    /// Returns the variant.
    fn kind(&self) -> TransportKind;

    /// Instantiates the unit. Messages it produces go to `inbox`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnitTerminated`](crate::Error::UnitTerminated) if
    /// the transport was already terminated.
    fn start(&mut self, inbox: Inbox) -> Result<()>;

    /// Delivers exactly one payload to the unit.
    ///
    /// # Errors
    ///
    /// - [`Error::UnitUnavailable`](crate::Error::UnitUnavailable) if the
    ///   unit is not running
    /// - [`Error::UnitTerminated`](crate::Error::UnitTerminated) after
    ///   [`Transport::terminate`]
    fn send(&mut self, payload: Value) -> Result<()>;

    /// Stops the unit immediately, discarding in-flight work.
    ///
    /// Idempotent.
    fn terminate(&mut self);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbox_tags_messages() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let inbox = Inbox::new(UnitId::new(4), tx);

        assert!(inbox.deliver(UnitMessage::Ack));

        let event = rx.try_recv().expect("event");
        assert_eq!(event.unit, UnitId::new(4));
        assert!(event.message.is_ack());
    }

    #[test]
    fn test_inbox_reports_closed_listener() {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbox = Inbox::new(UnitId::new(0), tx);
        drop(rx);

        assert!(!inbox.deliver(UnitMessage::Ack));
    }

    #[test]
    fn test_transport_kind_serde() {
        let kind: TransportKind = serde_json::from_str("\"fallback\"").unwrap();
        assert_eq!(kind, TransportKind::Fallback);
        assert_eq!(TransportKind::Native.to_string(), "native");
    }
}
