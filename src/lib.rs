//! Worker Pool - FIFO job dispatch over a fixed set of execution units.
//!
//! This library spins up N execution units and distributes a queue of jobs
//! across them as they become available.
//!
//! # Architecture
//!
//! The pool follows a scheduler/unit model:
//!
//! - **Scheduler (pool)**: Owns the job queue, tracks unit readiness, routes
//!   each reply to the job that produced it
//! - **Units**: Run a program, acknowledge once booted, answer one payload at
//!   a time
//!
//! Key design principles:
//!
//! - Units are first-fit in construction order; the queue is strict FIFO
//! - A unit receives work only after its `ack` handshake
//! - At most one job in flight per unit
//! - Two transports behind one trait: in-process Tokio tasks (native) and
//!   child processes speaking newline-delimited JSON (fallback)
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use worker_pool::{Result, WorkerPool, program_fn};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let pool = WorkerPool::builder()
//!         .units(4)
//!         .unit_source("echo")
//!         .program("echo", program_fn(|payload| payload))
//!         .build()?;
//!
//!     let reply = pool.run(json!({"x": 1}))?.await?;
//!     println!("Reply: {}", reply);
//!
//!     pool.destroy();
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`pool`] | [`WorkerPool`], builder, options and status |
//! | [`program`] | Unit programs and the fallback unit runtime |
//! | [`transport`] | Native and fallback unit transports |
//! | [`protocol`] | Text wire format of fallback units |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for units and jobs.
pub mod identifiers;

/// The pool and its scheduler.
///
/// Use [`WorkerPool::builder()`] to create a configured pool.
pub mod pool;

/// Unit programs.
///
/// Programs run in-process for native units, or behind
/// [`serve_stdio`](program::serve_stdio) inside a fallback executable.
pub mod program;

/// Fallback wire protocol.
pub mod protocol;

/// Execution unit transports.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Pool types
pub use pool::{
    Completion, DecodePolicy, JobHandle, PoolBuilder, PoolOptions, PoolStatus, TransportMode,
    WorkerPool,
};

// Program types
pub use program::{ProgramRegistry, UnitProgram, program_fn, serve, serve_stdio};

// Transport types
pub use transport::{FrameScheduler, IntervalFrameScheduler, TransportKind};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{JobId, UnitId};
