use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::ProtocolError;
use crate::message_types;

pub const PROTOCOL_VERSION: &str = "1.0";

/// Inbound lines longer than this are rejected before parsing.
pub const MAX_LINE_BYTES: usize = 100_000;

/// Versioned wrapper carrying every protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default = "empty_payload")]
    pub payload: Value,
}

fn empty_payload() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Envelope {
    /// Builds an envelope with a fresh v4 id stamped with the current time.
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self::with_id(message_type, payload, Uuid::new_v4().to_string())
    }

    pub fn with_id(message_type: impl Into<String>, payload: Value, id: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            message_type: message_type.into(),
            id: id.into(),
            timestamp: unix_timestamp(),
            payload,
        }
    }

    /// One-shot receipt acknowledgement for `message_id`.
    pub fn ack_for(message_id: &str, ok: bool, error: impl Into<String>) -> Self {
        let payload = serde_json::json!({
            "ack_id": message_id,
            "ok": ok,
            "error": error.into(),
        });
        Self::new(message_types::EVENT_ACK, payload)
    }

    pub fn is_ack(&self) -> bool {
        self.message_type == message_types::EVENT_ACK
    }

    /// Typed view of the payload. Missing optional fields fall back to their
    /// serde defaults.
    pub fn payload_as<T>(&self) -> Result<T, ProtocolError>
    where
        T: serde::de::DeserializeOwned,
    {
        serde_json::from_value(self.payload.clone()).map_err(ProtocolError::from)
    }
}

pub fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Parses and validates one inbound line.
pub fn decode_line(line: &str) -> Result<Envelope, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::LineTooLarge {
            limit: MAX_LINE_BYTES,
            actual: trimmed.len(),
        });
    }
    let mut envelope: Envelope = serde_json::from_str(trimmed)?;
    if envelope.version != PROTOCOL_VERSION {
        return Err(ProtocolError::VersionMismatch(envelope.version));
    }
    if envelope.message_type.trim().is_empty() {
        return Err(ProtocolError::MissingType);
    }
    envelope.id = envelope.id.trim().to_string();
    if envelope.payload.is_null() {
        envelope.payload = empty_payload();
    }
    Ok(envelope)
}

/// Serializes an envelope as a single line without the trailing newline.
pub fn encode_line(envelope: &Envelope) -> Result<String, ProtocolError> {
    serde_json::to_string(envelope).map_err(ProtocolError::from)
}
