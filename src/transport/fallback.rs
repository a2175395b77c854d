//! Out-of-process execution units.
//!
//! A fallback unit is a child process spawned from a resource path. It
//! speaks the text wire protocol over its standard streams: one JSON
//! envelope per line on stdin (jobs) and stdout (ack, results).
//!
//! # Attachment
//!
//! `start` does not spawn the process. It registers a callback with the
//! [`FrameScheduler`] and the process is attached on the next frame. Until
//! then no message can flow. A unit terminated before its frame fires is
//! never spawned.
//!
//! ```text
//! Detached ──start──► Pending ──frame──► Attached ──terminate──► Terminated
//!                        │
//!                        └──spawn error──► Failed
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::UnitId;
use crate::protocol::{Envelope, UnitMessage};

use super::{FrameScheduler, Inbox, Transport, TransportKind};

// ============================================================================
// AttachedUnit
// ============================================================================

/// A spawned child process and its I/O tasks.
struct AttachedUnit {
    /// Encoded lines waiting to be written to stdin.
    line_tx: mpsc::UnboundedSender<String>,
    /// Child process handle (killed on drop).
    child: Child,
    /// Task reading stdout.
    reader: JoinHandle<()>,
    /// Task writing stdin.
    writer: JoinHandle<()>,
}

impl AttachedUnit {
    /// Stops I/O and kills the process.
    fn shutdown(mut self, unit: UnitId) {
        self.reader.abort();
        self.writer.abort();

        if let Err(e) = self.child.start_kill() {
            debug!(unit = %unit, error = %e, "Failed to send kill signal");
        }
    }
}

// ============================================================================
// FallbackState
// ============================================================================

/// Attachment state, shared with the deferred frame callback.
enum FallbackState {
    Detached,
    Pending,
    Attached(AttachedUnit),
    Failed,
    Terminated,
}

impl fmt::Debug for FallbackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Detached => "Detached",
            Self::Pending => "Pending",
            Self::Attached(_) => "Attached",
            Self::Failed => "Failed",
            Self::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

// ============================================================================
// FallbackTransport
// ============================================================================

/// Transport for a child-process unit.
pub struct FallbackTransport {
    /// Unit this transport serves.
    unit: UnitId,
    /// Executable to spawn.
    resource: PathBuf,
    /// Arguments passed to the executable.
    args: Vec<String>,
    /// Defers attachment to the next frame.
    frames: Arc<dyn FrameScheduler>,
    /// Attachment state.
    state: Arc<Mutex<FallbackState>>,
}

impl FallbackTransport {
    /// Creates a transport for the executable at `resource`.
    #[must_use]
    pub fn new(
        unit: UnitId,
        resource: impl Into<PathBuf>,
        args: Vec<String>,
        frames: Arc<dyn FrameScheduler>,
    ) -> Self {
        Self {
            unit,
            resource: resource.into(),
            args,
            frames,
            state: Arc::new(Mutex::new(FallbackState::Detached)),
        }
    }

    /// Returns `true` once the child process is running.
    #[inline]
    #[must_use]
    pub fn is_attached(&self) -> bool {
        matches!(*self.state.lock(), FallbackState::Attached(_))
    }

    /// Returns `true` once [`Transport::terminate`] has run.
    #[inline]
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(*self.state.lock(), FallbackState::Terminated)
    }

    /// Frame callback: spawns the process unless terminated meanwhile.
    fn attach(
        unit: UnitId,
        resource: &Path,
        args: &[String],
        state: &Mutex<FallbackState>,
        inbox: Inbox,
    ) {
        let mut guard = state.lock();
        if !matches!(*guard, FallbackState::Pending) {
            debug!(unit = %unit, state = ?*guard, "Skipping attach");
            return;
        }

        match Self::spawn_unit(unit, resource, args, inbox) {
            Ok(attached) => {
                info!(unit = %unit, path = %resource.display(), "Fallback unit attached");
                *guard = FallbackState::Attached(attached);
            }
            Err(e) => {
                error!(
                    unit = %unit,
                    path = %resource.display(),
                    error = %e,
                    "Failed to spawn fallback unit"
                );
                *guard = FallbackState::Failed;
            }
        }
    }

    /// Spawns the child process and its I/O tasks.
    fn spawn_unit(
        unit: UnitId,
        resource: &Path,
        args: &[String],
        inbox: Inbox,
    ) -> Result<AttachedUnit> {
        let mut child = Command::new(resource)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::unit_unavailable(unit))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::unit_unavailable(unit))?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let writer = tokio::spawn(Self::write_lines(unit, stdin, line_rx));
        let reader = tokio::spawn(Self::read_lines(stdout, inbox));

        Ok(AttachedUnit {
            line_tx,
            child,
            reader,
            writer,
        })
    }

    /// Writes queued lines to the unit's stdin.
    async fn write_lines(
        unit: UnitId,
        mut stdin: ChildStdin,
        mut line_rx: mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(mut line) = line_rx.recv().await {
            line.push('\n');

            if let Err(e) = stdin.write_all(line.as_bytes()).await {
                warn!(unit = %unit, error = %e, "Failed to write to fallback unit");
                break;
            }
            if let Err(e) = stdin.flush().await {
                warn!(unit = %unit, error = %e, "Failed to flush fallback unit stdin");
                break;
            }
        }

        trace!(unit = %unit, "Fallback writer finished");
    }

    /// Decodes stdout lines and delivers them to the inbox.
    ///
    /// Every line is delivered, including blank lines and lines that are not
    /// valid UTF-8 (converted lossily), so the scheduler's decode policy
    /// decides what the job receives. Reading stops on EOF or I/O failure.
    async fn read_lines(stdout: ChildStdout, inbox: Inbox) {
        let unit = inbox.unit();
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => {
                    debug!(unit = %unit, "Fallback unit closed its output");
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    if !inbox.deliver(UnitMessage::from_line(&line)) {
                        break;
                    }
                }
                Err(e) => {
                    warn!(unit = %unit, error = %e, "Failed to read from fallback unit");
                    break;
                }
            }
        }
    }
}

impl Transport for FallbackTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Fallback
    }

    fn start(&mut self, inbox: Inbox) -> Result<()> {
        {
            let mut guard = self.state.lock();
            match *guard {
                FallbackState::Detached => *guard = FallbackState::Pending,
                FallbackState::Terminated => return Err(Error::unit_terminated(self.unit)),
                _ => {
                    debug!(unit = %self.unit, state = ?*guard, "Fallback unit already started");
                    return Ok(());
                }
            }
        }

        let unit = self.unit;
        let resource = self.resource.clone();
        let args = self.args.clone();
        let state = Arc::clone(&self.state);

        self.frames.schedule_after_next_frame(Box::new(move || {
            Self::attach(unit, &resource, &args, &state, inbox);
        }));

        debug!(unit = %unit, "Fallback unit attach scheduled");
        Ok(())
    }

    fn send(&mut self, payload: Value) -> Result<()> {
        let line = Envelope::job(payload).encode()?;

        match &*self.state.lock() {
            FallbackState::Attached(attached) => attached
                .line_tx
                .send(line)
                .map_err(|_| Error::unit_unavailable(self.unit)),
            FallbackState::Terminated => Err(Error::unit_terminated(self.unit)),
            _ => Err(Error::unit_unavailable(self.unit)),
        }
    }

    fn terminate(&mut self) {
        let previous = std::mem::replace(&mut *self.state.lock(), FallbackState::Terminated);

        match previous {
            FallbackState::Attached(attached) => {
                attached.shutdown(self.unit);
                debug!(unit = %self.unit, "Fallback unit terminated");
            }
            FallbackState::Terminated => {}
            other => trace!(unit = %self.unit, state = ?other, "Fallback unit terminated before attach"),
        }
    }
}

impl Drop for FallbackTransport {
    fn drop(&mut self) {
        self.terminate();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::transport::FrameCallback;

    /// Frame scheduler that only fires when told to.
    #[derive(Default)]
    struct ManualFrames {
        pending: Mutex<Vec<FrameCallback>>,
    }

    impl ManualFrames {
        fn fire(&self) -> usize {
            let callbacks: Vec<_> = self.pending.lock().drain(..).collect();
            let count = callbacks.len();
            for callback in callbacks {
                callback();
            }
            count
        }
    }

    impl FrameScheduler for ManualFrames {
        fn schedule_after_next_frame(&self, callback: FrameCallback) {
            self.pending.lock().push(callback);
        }
    }

    fn transport(resource: &str, frames: Arc<ManualFrames>) -> FallbackTransport {
        FallbackTransport::new(UnitId::new(0), resource, Vec::new(), frames)
    }

    #[tokio::test]
    async fn test_start_defers_attach_to_frame() {
        let frames = Arc::new(ManualFrames::default());
        let mut transport = transport("/definitely/not/a/unit", Arc::clone(&frames));
        let (tx, _rx) = mpsc::unbounded_channel();

        transport.start(Inbox::new(UnitId::new(0), tx)).unwrap();
        assert!(!transport.is_attached());
        assert!(matches!(
            transport.send(json!(1)),
            Err(Error::UnitUnavailable { .. })
        ));

        assert_eq!(frames.fire(), 1);
        // Spawn fails for a missing executable; unit stays unavailable.
        assert!(!transport.is_attached());
    }

    #[tokio::test]
    async fn test_terminate_before_frame_skips_spawn() {
        let frames = Arc::new(ManualFrames::default());
        let mut transport = transport("/definitely/not/a/unit", Arc::clone(&frames));
        let (tx, _rx) = mpsc::unbounded_channel();

        transport.start(Inbox::new(UnitId::new(0), tx)).unwrap();
        transport.terminate();
        frames.fire();

        assert!(transport.is_terminated());
        assert!(matches!(
            transport.send(json!(1)),
            Err(Error::UnitTerminated { .. })
        ));
    }

    #[tokio::test]
    async fn test_start_after_terminate_fails() {
        let frames = Arc::new(ManualFrames::default());
        let mut transport = transport("unit", frames);
        transport.terminate();

        let (tx, _rx) = mpsc::unbounded_channel();
        assert!(transport.start(Inbox::new(UnitId::new(0), tx)).is_err());
    }
}
