//! Unit programs: the code that runs inside an execution unit.
//!
//! Native units run a [`UnitProgram`] on a Tokio task. The program is found
//! through a [`ProgramRegistry`] keyed by the pool's unit source path.
//!
//! Fallback units are separate executables. [`serve_stdio`] turns any
//! [`UnitProgram`] into such an executable: it acknowledges readiness and
//! answers `job` lines with `result` lines on stdout.
//!
//! # Example
//!
//! ```ignore
//! use worker_pool::program::{program_fn, ProgramRegistry};
//!
//! let mut registry = ProgramRegistry::new();
//! registry.register("echo", program_fn(|payload| payload));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::Envelope;

// ============================================================================
// UnitProgram
// ============================================================================

/// Application logic executed by one unit.
///
/// A unit handles one payload at a time; the pool never sends a second
/// payload before the first reply.
#[async_trait]
pub trait UnitProgram: Send + Sync + 'static {
    /// Runs once before the unit acknowledges readiness.
    async fn boot(&self) {}

    /// Handles one job payload and returns its reply.
    async fn handle(&self, payload: Value) -> Value;
}

// ============================================================================
// FnProgram
// ============================================================================

/// Adapter running a plain closure as a [`UnitProgram`].
pub struct FnProgram<F> {
    handler: F,
}

#[async_trait]
impl<F> UnitProgram for FnProgram<F>
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    async fn handle(&self, payload: Value) -> Value {
        (self.handler)(payload)
    }
}

/// Wraps a synchronous closure as a shareable program.
#[must_use]
pub fn program_fn<F>(handler: F) -> Arc<dyn UnitProgram>
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    Arc::new(FnProgram { handler })
}

// ============================================================================
// ProgramRegistry
// ============================================================================

/// In-process programs available to native units, keyed by source path.
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: FxHashMap<String, Arc<dyn UnitProgram>>,
}

impl ProgramRegistry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `program` under `source`, replacing any previous entry.
    pub fn register(&mut self, source: impl Into<String>, program: Arc<dyn UnitProgram>) {
        self.programs.insert(source.into(), program);
    }

    /// Looks up the program for `source`.
    #[inline]
    #[must_use]
    pub fn get(&self, source: &str) -> Option<Arc<dyn UnitProgram>> {
        self.programs.get(source).cloned()
    }

    /// Returns `true` if a program is registered for `source`.
    #[inline]
    #[must_use]
    pub fn contains(&self, source: &str) -> bool {
        self.programs.contains_key(source)
    }

    /// Returns the number of registered programs.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    /// Returns `true` if nothing is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("sources", &self.programs.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Fallback Unit Runtime
// ============================================================================

/// Serves `program` over stdin/stdout using the text wire protocol.
///
/// Intended as the body of a fallback unit executable. Returns when stdin
/// closes.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if stdin or stdout fails.
pub async fn serve_stdio(program: Arc<dyn UnitProgram>) -> Result<()> {
    serve(
        program,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await
}

/// Serves `program` over an arbitrary line-oriented reader/writer pair.
///
/// Sends the `ack` envelope once [`UnitProgram::boot`] returns, then answers
/// every `job` line with a `result` line. Blank and undecodable lines are
/// skipped.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) on read or write failure.
pub async fn serve<R, W>(program: Arc<dyn UnitProgram>, reader: R, mut writer: W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    program.boot().await;
    write_envelope(&mut writer, &Envelope::Ack).await?;

    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        match Envelope::decode(&line) {
            Ok(Envelope::Job { data }) => {
                let reply = program.handle(data).await;
                write_envelope(&mut writer, &Envelope::reply(reply)).await?;
            }
            Ok(other) => warn!(?other, "Unexpected envelope sent to unit"),
            Err(e) => warn!(error = %e, "Undecodable job line"),
        }
    }

    debug!("Unit input closed");
    Ok(())
}

/// Writes one envelope followed by a newline and flushes.
async fn write_envelope<W>(writer: &mut W, envelope: &Envelope) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = envelope.encode()?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
