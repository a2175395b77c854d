//! Builder pattern for pool configuration.
//!
//! Provides a fluent API for configuring and creating [`WorkerPool`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use worker_pool::{WorkerPool, program_fn};
//!
//! # async fn example() -> worker_pool::Result<()> {
//! let pool = WorkerPool::builder()
//!     .units(4)
//!     .unit_source("echo")
//!     .program("echo", program_fn(|payload| payload))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::program::{ProgramRegistry, UnitProgram};
use crate::transport::{FrameScheduler, IntervalFrameScheduler};

use super::WorkerPool;
use super::options::{DecodePolicy, PoolOptions, TransportMode};

// ============================================================================
// PoolBuilder
// ============================================================================

/// Builder for configuring a [`WorkerPool`].
///
/// Use [`WorkerPool::builder()`] to create a new builder.
#[derive(Default)]
pub struct PoolBuilder {
    /// Plain options.
    options: PoolOptions,
    /// Programs available to native units.
    registry: ProgramRegistry,
    /// Frame scheduler override for fallback units.
    frames: Option<Arc<dyn FrameScheduler>>,
}

// ============================================================================
// PoolBuilder Implementation
// ============================================================================

impl PoolBuilder {
    /// Creates a builder with default options and no programs.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of execution units.
    #[inline]
    #[must_use]
    pub fn units(mut self, count: usize) -> Self {
        self.options.units = count;
        self
    }

    /// Sets the unit program source path.
    ///
    /// Native units look it up in the registry.
    #[inline]
    #[must_use]
    pub fn unit_source(mut self, source: impl Into<String>) -> Self {
        self.options.unit_source = source.into();
        self
    }

    /// Sets the executable spawned for each fallback unit.
    #[inline]
    #[must_use]
    pub fn fallback_resource(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.fallback_resource = path.into();
        self
    }

    /// Sets the arguments passed to the fallback executable.
    #[must_use]
    pub fn fallback_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.fallback_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Forces or relaxes the transport choice.
    #[inline]
    #[must_use]
    pub fn transport(mut self, mode: TransportMode) -> Self {
        self.options.transport = mode;
        self
    }

    /// Sets how undecodable fallback replies are reported.
    #[inline]
    #[must_use]
    pub fn decode_policy(mut self, policy: DecodePolicy) -> Self {
        self.options.decode_policy = policy;
        self
    }

    /// Sets the frame interval of the default frame scheduler.
    ///
    /// Sub-millisecond parts are dropped; intervals beyond `u64::MAX`
    /// milliseconds saturate.
    #[inline]
    #[must_use]
    pub fn frame_interval(mut self, interval: Duration) -> Self {
        self.options.frame_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Replaces all plain options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: PoolOptions) -> Self {
        self.options = options;
        self
    }

    /// Registers a program for native units under `source`.
    #[must_use]
    pub fn program(mut self, source: impl Into<String>, program: Arc<dyn UnitProgram>) -> Self {
        self.registry.register(source, program);
        self
    }

    /// Replaces the program registry.
    #[inline]
    #[must_use]
    pub fn registry(mut self, registry: ProgramRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Sets the frame scheduler used to defer fallback attachment.
    #[inline]
    #[must_use]
    pub fn frame_scheduler(mut self, frames: Arc<dyn FrameScheduler>) -> Self {
        self.frames = Some(frames);
        self
    }

    /// Builds the pool and starts every unit.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the unit count is invalid
    ///   or there is nothing to run
    /// - [`Error::ProgramNotFound`](crate::Error::ProgramNotFound) if native
    ///   units are forced without a registered program
    pub fn build(self) -> Result<WorkerPool> {
        self.options.validate()?;
        let kind = self.options.resolve_transport(&self.registry)?;

        let frames = self.frames.unwrap_or_else(|| {
            Arc::new(IntervalFrameScheduler::new(self.options.frame_interval()))
        });

        WorkerPool::start(self.options, kind, &self.registry, frames)
    }
}

impl fmt::Debug for PoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuilder")
            .field("options", &self.options)
            .field("registry", &self.registry)
            .field("custom_frames", &self.frames.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::Error;
    use crate::program::program_fn;
    use crate::transport::TransportKind;

    #[test]
    fn test_setters() {
        let builder = PoolBuilder::new()
            .units(3)
            .unit_source("echo")
            .fallback_resource("/bin/unit")
            .fallback_args(["--raw"])
            .transport(TransportMode::Fallback)
            .decode_policy(DecodePolicy::Lenient)
            .frame_interval(Duration::from_millis(5));

        assert_eq!(builder.options.units, 3);
        assert_eq!(builder.options.unit_source, "echo");
        assert_eq!(builder.options.fallback_resource, PathBuf::from("/bin/unit"));
        assert_eq!(builder.options.fallback_args, vec!["--raw".to_string()]);
        assert_eq!(builder.options.transport, TransportMode::Fallback);
        assert_eq!(builder.options.decode_policy, DecodePolicy::Lenient);
        assert_eq!(builder.options.frame_interval_ms, 5);
    }

    #[test]
    fn test_frame_interval_saturates() {
        let builder = PoolBuilder::new().frame_interval(Duration::MAX);
        assert_eq!(builder.options.frame_interval_ms, u64::MAX);
    }

    #[test]
    fn test_program_registers() {
        let builder = PoolBuilder::new().program("echo", program_fn(|p| p));
        assert!(builder.registry.contains("echo"));
    }

    #[test]
    fn test_build_rejects_zero_units() {
        let err = PoolBuilder::new()
            .units(0)
            .unit_source("echo")
            .program("echo", program_fn(|p| p))
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_without_anything_to_run() {
        let err = PoolBuilder::new().units(1).build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_build_native() {
        let pool = PoolBuilder::new()
            .units(2)
            .unit_source("echo")
            .program("echo", program_fn(|p| p))
            .build()
            .unwrap();

        assert_eq!(pool.transport_kind(), TransportKind::Native);
        assert_eq!(pool.len(), 2);
        pool.destroy();
    }
}
