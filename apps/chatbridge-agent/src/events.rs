//! Outbound event helpers. Every event here is tracked for acknowledgement.

use chatbridge_protocol::{
    AgentErrorPayload, AgentStatusPayload, DeliveryTracker, ErrorCode, InputResultPayload,
    message_types,
};
use serde::Serialize;

pub fn emit_event<T: Serialize>(tracker: &mut DeliveryTracker, message_type: &str, payload: &T) {
    if let Err(error) = tracker.send_payload_with_ack(message_type, payload) {
        tracing::warn!(error = %error, message_type, "failed to serialize outbound event");
    }
}

pub fn emit_status(tracker: &mut DeliveryTracker, state: &str, detail: impl Into<String>) {
    let payload = AgentStatusPayload {
        state: state.to_string(),
        detail: detail.into(),
    };
    emit_event(tracker, message_types::AGENT_STATUS, &payload);
}

/// Reports a recoverable error. Nothing the agent does is fatal to the
/// process.
pub fn emit_error(tracker: &mut DeliveryTracker, code: ErrorCode, message: impl Into<String>) {
    let message = message.into();
    tracing::warn!(code = code.as_str(), message = %message, "agent error");
    let payload = AgentErrorPayload {
        code,
        message,
        recoverable: true,
    };
    emit_event(tracker, message_types::AGENT_ERROR, &payload);
}

pub fn emit_input_result(tracker: &mut DeliveryTracker, result: &InputResultPayload) {
    emit_event(tracker, message_types::INPUT_RESULT, result);
}
