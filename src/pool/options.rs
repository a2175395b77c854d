//! Pool configuration.
//!
//! [`PoolOptions`] is plain data: it can be built in code, through
//! [`PoolBuilder`](super::PoolBuilder), or loaded from JSON.
//!
//! # Example
//!
//! ```ignore
//! use worker_pool::PoolOptions;
//!
//! let options = PoolOptions::from_json(r#"{
//!     "units": 4,
//!     "fallback_resource": "/usr/local/bin/echo-unit",
//!     "decode_policy": "lenient"
//! }"#)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::identifiers::UnitId;
use crate::program::ProgramRegistry;
use crate::transport::TransportKind;
use crate::transport::frame::DEFAULT_FRAME_INTERVAL;

// ============================================================================
// Constants
// ============================================================================

/// Unit count used when the host parallelism cannot be queried.
const FALLBACK_UNIT_COUNT: usize = 4;

// ============================================================================
// TransportMode
// ============================================================================

/// How the transport variant is chosen at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// Native when a program is registered for the unit source,
    /// fallback otherwise.
    #[default]
    Auto,
    /// Always native.
    Native,
    /// Always fallback.
    Fallback,
}

// ============================================================================
// DecodePolicy
// ============================================================================

/// What a job's callback receives when a fallback unit replies with text
/// that is not a wire envelope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodePolicy {
    /// `Err(Error::Decode)`.
    #[default]
    Strict,
    /// `Ok(Value::String(raw))`.
    Lenient,
}

impl DecodePolicy {
    /// Turns an undecodable reply into the job's result.
    pub(crate) fn apply(self, unit: UnitId, raw: String) -> Result<Value> {
        match self {
            Self::Strict => Err(Error::decode(unit, raw)),
            Self::Lenient => {
                warn!(unit = %unit, raw = %raw, "Passing undecodable reply through");
                Ok(Value::String(raw))
            }
        }
    }
}

// ============================================================================
// PoolOptions
// ============================================================================

/// Pool construction parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Number of execution units. Fixed for the pool's lifetime.
    pub units: usize,

    /// Source path of the unit program (registry key for native units).
    pub unit_source: String,

    /// Executable spawned for each fallback unit.
    pub fallback_resource: PathBuf,

    /// Arguments passed to the fallback executable.
    pub fallback_args: Vec<String>,

    /// Transport selection.
    pub transport: TransportMode,

    /// Handling of undecodable fallback replies.
    pub decode_policy: DecodePolicy,

    /// Frame interval for deferred fallback attachment, in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for PoolOptions {
    fn default() -> Self {
        let units = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(FALLBACK_UNIT_COUNT);

        Self {
            units,
            unit_source: String::new(),
            fallback_resource: PathBuf::new(),
            fallback_args: Vec::new(),
            transport: TransportMode::Auto,
            decode_policy: DecodePolicy::Strict,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL.as_millis() as u64,
        }
    }
}

impl PoolOptions {
    /// Parses options from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the text is not valid options.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Returns the frame interval.
    #[inline]
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Checks the options that do not depend on the program registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the unit count is zero or does not fit
    /// a unit index.
    pub fn validate(&self) -> Result<()> {
        if self.units == 0 {
            return Err(Error::config("unit count must be positive"));
        }
        if u32::try_from(self.units).is_err() {
            return Err(Error::config(format!(
                "unit count {} exceeds {}",
                self.units,
                u32::MAX
            )));
        }
        Ok(())
    }

    /// Picks the transport variant, once, for the whole pool.
    ///
    /// # Errors
    ///
    /// - [`Error::ProgramNotFound`] if native is forced and no program is
    ///   registered for `unit_source`
    /// - [`Error::Config`] if fallback is needed and no resource is set
    pub fn resolve_transport(&self, registry: &ProgramRegistry) -> Result<TransportKind> {
        let has_program = registry.contains(&self.unit_source);
        let has_resource = !self.fallback_resource.as_os_str().is_empty();

        match self.transport {
            TransportMode::Native if has_program => Ok(TransportKind::Native),
            TransportMode::Native => Err(Error::program_not_found(&self.unit_source)),
            TransportMode::Auto if has_program => Ok(TransportKind::Native),
            TransportMode::Auto | TransportMode::Fallback if has_resource => {
                Ok(TransportKind::Fallback)
            }
            TransportMode::Auto => Err(Error::config(format!(
                "no program registered for '{}' and no fallback resource set",
                self.unit_source
            ))),
            TransportMode::Fallback => Err(Error::config("fallback resource path is required")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::program::program_fn;

    fn registry_with(source: &str) -> ProgramRegistry {
        let mut registry = ProgramRegistry::new();
        registry.register(source, program_fn(|payload| payload));
        registry
    }

    #[test]
    fn test_defaults() {
        let options = PoolOptions::default();
        assert!(options.units > 0);
        assert_eq!(options.transport, TransportMode::Auto);
        assert_eq!(options.decode_policy, DecodePolicy::Strict);
        assert_eq!(options.frame_interval(), Duration::from_millis(16));
    }

    #[test]
    fn test_from_json_partial() {
        let options = PoolOptions::from_json(
            r#"{"units": 2, "fallback_resource": "/bin/unit", "decode_policy": "lenient"}"#,
        )
        .unwrap();

        assert_eq!(options.units, 2);
        assert_eq!(options.fallback_resource, PathBuf::from("/bin/unit"));
        assert_eq!(options.decode_policy, DecodePolicy::Lenient);
        assert_eq!(options.transport, TransportMode::Auto);
    }

    #[test]
    fn test_from_json_rejects_unknown_mode() {
        assert!(PoolOptions::from_json(r#"{"transport": "carrier-pigeon"}"#).is_err());
    }

    #[test]
    fn test_validate_zero_units() {
        let options = PoolOptions {
            units: 0,
            ..Default::default()
        };
        let err = options.validate().unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn test_auto_prefers_native() {
        let options = PoolOptions {
            unit_source: "echo".into(),
            fallback_resource: "/bin/unit".into(),
            ..Default::default()
        };
        assert_eq!(
            options.resolve_transport(&registry_with("echo")).unwrap(),
            TransportKind::Native
        );
        assert_eq!(
            options.resolve_transport(&ProgramRegistry::new()).unwrap(),
            TransportKind::Fallback
        );
    }

    #[test]
    fn test_forced_native_without_program() {
        let options = PoolOptions {
            unit_source: "missing".into(),
            transport: TransportMode::Native,
            ..Default::default()
        };
        let err = options.resolve_transport(&ProgramRegistry::new()).unwrap_err();
        assert!(matches!(err, Error::ProgramNotFound { .. }));
    }

    #[test]
    fn test_forced_fallback_ignores_registry() {
        let options = PoolOptions {
            unit_source: "echo".into(),
            fallback_resource: "/bin/unit".into(),
            transport: TransportMode::Fallback,
            ..Default::default()
        };
        assert_eq!(
            options.resolve_transport(&registry_with("echo")).unwrap(),
            TransportKind::Fallback
        );
    }

    #[test]
    fn test_nothing_to_run() {
        let options = PoolOptions::default();
        assert!(options.resolve_transport(&ProgramRegistry::new()).is_err());
    }

    #[test]
    fn test_decode_policy_apply() {
        let unit = UnitId::new(0);
        assert!(DecodePolicy::Strict.apply(unit, "x".into()).is_err());
        assert_eq!(
            DecodePolicy::Lenient.apply(unit, "x".into()).unwrap(),
            Value::String("x".into())
        );
    }
}
