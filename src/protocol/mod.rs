//! Unit message protocol.
//!
//! This module defines what travels between the pool (local end) and an
//! execution unit (remote end).
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `ack` | Unit → Pool | One-time readiness handshake |
//! | `job` | Pool → Unit | Job payload |
//! | `result` | Unit → Pool | Job reply |
//!
//! Native units exchange these as structured values over a channel.
//! Fallback units exchange them as newline-delimited JSON text:
//!
//! ```text
//! {"type":"ack"}
//! {"type":"job","data":{"x":1}}
//! {"type":"result","data":{"x":1}}
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | Text wire envelope |
//! | `message` | Decoded unit messages |

// ============================================================================
// Submodules
// ============================================================================

/// Text wire envelope for fallback units.
pub mod envelope;

/// Messages delivered from units to the pool.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::Envelope;
pub use message::UnitMessage;
