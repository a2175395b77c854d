//! Messages delivered from execution units to the pool.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

use super::Envelope;

// ============================================================================
// UnitMessage
// ============================================================================

/// A message received from an execution unit, after decoding.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitMessage {
    /// Handshake acknowledgment.
    Ack,
    /// Reply to the job currently in flight on the unit.
    Reply(Value),
    /// Text that did not decode as a wire envelope, kept verbatim.
    Undecodable(String),
}

impl UnitMessage {
    /// Decodes one text line received from a fallback unit.
    ///
    /// Never fails: anything that is not an `ack` or `result` envelope is
    /// returned as [`UnitMessage::Undecodable`] so the scheduler can apply
    /// its decode policy.
    #[must_use]
    pub fn from_line(line: &str) -> Self {
        match Envelope::decode(line) {
            Ok(Envelope::Ack) => Self::Ack,
            Ok(Envelope::Reply { data }) => Self::Reply(data),
            Ok(Envelope::Job { .. }) | Err(_) => {
                Self::Undecodable(line.trim_end_matches(['\r', '\n']).to_string())
            }
        }
    }

    /// Returns `true` for the handshake acknowledgment.
    #[inline]
    #[must_use]
    pub fn is_ack(&self) -> bool {
        matches!(self, Self::Ack)
    }
}

// ============================================================================
// Tests
// ============================================================================
