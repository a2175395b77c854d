//! Error types for the worker pool.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use worker_pool::{Result, WorkerPool};
//! use serde_json::json;
//!
//! async fn example(pool: &WorkerPool) -> Result<()> {
//!     let reply = pool.run(json!({ "x": 1 }))?.await?;
//!     println!("{reply}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::ProgramNotFound`] |
//! | Lifecycle | [`Error::PoolDestroyed`], [`Error::JobAbandoned`] |
//! | Unit | [`Error::UnitUnavailable`], [`Error::UnitTerminated`] |
//! | Wire | [`Error::Decode`] |
//! | External | [`Error::Io`], [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::{JobId, UnitId};

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when pool options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// No in-process program is registered for the unit source path.
    ///
    /// Returned when the native transport is forced but the source path
    /// cannot be resolved.
    #[error("No unit program registered for source: {source_path}")]
    ProgramNotFound {
        /// The unit source path that was looked up.
        source_path: String,
    },

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The pool has been destroyed.
    ///
    /// Returned by `submit` after `destroy`. Destroyed pools never dispatch.
    #[error("Worker pool destroyed")]
    PoolDestroyed,

    /// The job was dropped by `destroy` before it produced a reply.
    ///
    /// Only observable through a `JobHandle`; plain completion callbacks
    /// are never invoked for abandoned jobs.
    #[error("Job {job} abandoned")]
    JobAbandoned {
        /// The abandoned job.
        job: JobId,
    },

    // ========================================================================
    // Unit Errors
    // ========================================================================
    /// A payload could not be delivered to a unit.
    ///
    /// The unit is marked faulted and never selected again.
    #[error("Unit {unit} unavailable")]
    UnitUnavailable {
        /// The unit that refused the payload.
        unit: UnitId,
    },

    /// The unit's transport was already terminated.
    #[error("Unit {unit} terminated")]
    UnitTerminated {
        /// The terminated unit.
        unit: UnitId,
    },

    // ========================================================================
    // Wire Errors
    // ========================================================================
    /// A fallback unit replied with text that is not a wire envelope.
    ///
    /// Only surfaced under the strict decode policy.
    #[error("Undecodable reply from {unit}: {raw}")]
    Decode {
        /// The unit that sent the text.
        unit: UnitId,
        /// The raw text line as received.
        raw: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a program not found error.
    #[inline]
    pub fn program_not_found(source_path: impl Into<String>) -> Self {
        Self::ProgramNotFound {
            source_path: source_path.into(),
        }
    }

    /// Creates a job abandoned error.
    #[inline]
    pub fn job_abandoned(job: JobId) -> Self {
        Self::JobAbandoned { job }
    }

    /// Creates a unit unavailable error.
    #[inline]
    pub fn unit_unavailable(unit: UnitId) -> Self {
        Self::UnitUnavailable { unit }
    }

    /// Creates a unit terminated error.
    #[inline]
    pub fn unit_terminated(unit: UnitId) -> Self {
        Self::UnitTerminated { unit }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(unit: UnitId, raw: impl Into<String>) -> Self {
        Self::Decode {
            unit,
            raw: raw.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a decode error.
    #[inline]
    #[must_use]
    pub fn is_decode_error(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::Json(_))
    }

    /// Returns `true` if the error comes from a unit that can no longer
    /// take work.
    #[inline]
    #[must_use]
    pub fn is_unit_error(&self) -> bool {
        matches!(
            self,
            Self::UnitUnavailable { .. } | Self::UnitTerminated { .. }
        )
    }

    /// Returns `true` if the error is a consequence of `destroy`.
    #[inline]
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        matches!(self, Self::PoolDestroyed | Self::JobAbandoned { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    #[test]
    fn test_error_display() {
        let err = Error::config("unit count must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: unit count must be positive"
        );
    }

    #[test]
    fn test_decode_error_display() {
        let err = Error::decode(UnitId::new(2), "garbage");
        assert_eq!(err.to_string(), "Undecodable reply from unit-2: garbage");
        assert!(err.is_decode_error());
        assert!(!err.is_unit_error());
    }

    #[test]
    fn test_is_unit_error() {
        assert!(Error::unit_unavailable(UnitId::new(0)).is_unit_error());
        assert!(Error::unit_terminated(UnitId::new(1)).is_unit_error());
        assert!(!Error::PoolDestroyed.is_unit_error());
    }

    #[test]
    fn test_is_destroyed() {
        assert!(Error::PoolDestroyed.is_destroyed());
        assert!(Error::job_abandoned(JobId::from_raw(7)).is_destroyed());
        assert!(!Error::config("x").is_destroyed());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.is_decode_error());
    }
}
