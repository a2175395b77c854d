//! Text wire envelope.
//!
//! Every line exchanged with a fallback unit is one JSON object carrying a
//! `type` discriminant. Job payloads and results are opaque JSON values
//! nested under `data`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_str, to_string};

use crate::error::Result;

// ============================================================================
// Envelope
// ============================================================================

/// One wire message.
///
/// # Format
///
/// ```json
/// { "type": "ack" }
/// { "type": "job", "data": { ... } }
/// { "type": "result", "data": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Envelope {
    /// Readiness acknowledgment, sent once by the unit after booting.
    Ack,

    /// Job payload sent to the unit.
    Job {
        /// Opaque payload.
        data: Value,
    },

    /// Job reply sent by the unit.
    #[serde(rename = "result")]
    Reply {
        /// Opaque result.
        data: Value,
    },
}

impl Envelope {
    /// Wraps a payload for sending to a unit.
    #[inline]
    #[must_use]
    pub fn job(data: Value) -> Self {
        Self::Job { data }
    }

    /// Wraps a result for sending back to the pool.
    #[inline]
    #[must_use]
    pub fn reply(data: Value) -> Self {
        Self::Reply { data }
    }

    /// Encodes the envelope as a single line of JSON (without newline).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the payload cannot be
    /// serialized.
    pub fn encode(&self) -> Result<String> {
        Ok(to_string(self)?)
    }

    /// Decodes one line of text.
    ///
    /// Trailing whitespace (including `\r`) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if the text is not an
    /// envelope.
    pub fn decode(text: &str) -> Result<Self> {
        Ok(from_str(text.trim_end())?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_ack_format() {
        assert_eq!(Envelope::Ack.encode().unwrap(), r#"{"type":"ack"}"#);
    }

    #[test]
    fn test_job_format() {
        let line = Envelope::job(json!({"x": 1})).encode().unwrap();
        assert_eq!(line, r#"{"type":"job","data":{"x":1}}"#);
    }

    #[test]
    fn test_decode_result() {
        let envelope = Envelope::decode("{\"type\":\"result\",\"data\":[1,2]}\r\n").unwrap();
        assert_eq!(envelope, Envelope::reply(json!([1, 2])));
    }

    #[test]
    fn test_decode_rejects_plain_text() {
        assert!(Envelope::decode("hello").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        assert!(Envelope::decode(r#"{"type":"ping"}"#).is_err());
    }

    #[test]
    fn test_encoded_line_has_no_newline() {
        let line = Envelope::job(json!("multi\nline")).encode().unwrap();
        assert!(!line.contains('\n'));
    }
}
