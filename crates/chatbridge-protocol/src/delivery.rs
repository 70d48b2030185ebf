use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::ProtocolError;
use crate::sink::EnvelopeSink;

/// Acknowledgement timing for tracked envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub ack_timeout: Duration,
    pub max_retries: u32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_secs(3),
            max_retries: 3,
        }
    }
}

/// An emitted envelope still waiting for its `event.ack`.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    pub envelope: Envelope,
    pub sent_at: Instant,
    pub retries: u32,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub retried: Vec<String>,
    pub dropped: Vec<String>,
}

/// At-least-once delivery over an [`EnvelopeSink`].
///
/// Tracked envelopes are re-emitted with the same id after each timeout until
/// the host acknowledges them or `max_retries` re-sends have happened, after
/// which they are dropped without further notice.
pub struct DeliveryTracker {
    sink: Box<dyn EnvelopeSink>,
    pending: HashMap<String, PendingMessage>,
    policy: DeliveryPolicy,
}

impl DeliveryTracker {
    pub fn new(sink: Box<dyn EnvelopeSink>, policy: DeliveryPolicy) -> Self {
        Self {
            sink,
            pending: HashMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// Emits a new envelope and registers it as pending. Returns its id.
    pub fn send_with_ack(&mut self, message_type: &str, payload: Value) -> String {
        self.send_with_ack_at(message_type, payload, Instant::now())
    }

    pub fn send_with_ack_at(&mut self, message_type: &str, payload: Value, now: Instant) -> String {
        let envelope = Envelope::new(message_type, payload);
        let id = envelope.id.clone();
        self.emit_logged(&envelope);
        self.pending.insert(
            id.clone(),
            PendingMessage {
                envelope,
                sent_at: now,
                retries: 0,
            },
        );
        id
    }

    /// Serializes a typed payload and tracks it like [`Self::send_with_ack`].
    pub fn send_payload_with_ack<T: Serialize>(
        &mut self,
        message_type: &str,
        payload: &T,
    ) -> Result<String, ProtocolError> {
        let value = serde_json::to_value(payload)?;
        Ok(self.send_with_ack(message_type, value))
    }

    /// Fire-and-forget receipt acknowledgement; never tracked.
    pub fn send_ack(&mut self, ack_id: &str, ok: bool, error: &str) {
        let envelope = Envelope::ack_for(ack_id, ok, error);
        self.emit_logged(&envelope);
    }

    /// Emits an envelope without tracking it.
    pub fn send_untracked(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        self.sink.emit(envelope)
    }

    /// Clears the pending entry for `ack_id`. Returns whether one existed.
    pub fn acknowledge(&mut self, ack_id: &str) -> bool {
        let removed = self.pending.remove(ack_id).is_some();
        if !removed {
            tracing::debug!(ack_id, "ack for unknown or expired message");
        }
        removed
    }

    pub fn sweep(&mut self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// Re-emits timed-out entries and drops those that exhausted the budget.
    pub fn sweep_at(&mut self, now: Instant) -> SweepReport {
        let mut report = SweepReport::default();
        let timeout = self.policy.ack_timeout;
        let max_retries = self.policy.max_retries;

        let mut due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, pending)| now.saturating_duration_since(pending.sent_at) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        due.sort();

        for id in due {
            let Some(pending) = self.pending.get_mut(&id) else {
                continue;
            };
            if pending.retries >= max_retries {
                tracing::debug!(
                    id = %id,
                    message_type = %pending.envelope.message_type,
                    "dropping unacknowledged message after retry budget"
                );
                self.pending.remove(&id);
                report.dropped.push(id);
                continue;
            }
            pending.sent_at = now;
            pending.retries += 1;
            let envelope = pending.envelope.clone();
            self.emit_logged(&envelope);
            report.retried.push(id);
        }
        report
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self, id: &str) -> Option<&PendingMessage> {
        self.pending.get(id)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    fn emit_logged(&mut self, envelope: &Envelope) {
        if let Err(error) = self.sink.emit(envelope) {
            tracing::warn!(
                error = %error,
                id = %envelope.id,
                message_type = %envelope.message_type,
                "failed to emit envelope"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use serde_json::json;

    fn tracker(sink: &RecordingSink) -> DeliveryTracker {
        DeliveryTracker::new(Box::new(sink.clone()), DeliveryPolicy::default())
    }

    #[test]
    fn send_with_ack_emits_and_tracks() {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        let id = tracker.send_with_ack("agent.status", json!({"state": "idle"}));

        assert!(tracker.is_pending(&id));
        let emitted = sink.envelopes();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].id, id);
    }

    #[test]
    fn typed_payloads_are_tracked() -> anyhow::Result<()> {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        let id = tracker.send_payload_with_ack(
            "input.result",
            &crate::payloads::InputResultPayload::failure("no window"),
        )?;

        assert!(tracker.is_pending(&id));
        assert_eq!(sink.envelopes()[0].payload, json!({"ok": false, "error": "no window"}));
        Ok(())
    }

    #[test]
    fn acks_are_not_tracked() {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        tracker.send_ack("host-1", true, "");

        assert_eq!(tracker.pending_len(), 0);
        assert_eq!(sink.of_type("event.ack").len(), 1);
    }

    #[test]
    fn acknowledge_clears_only_matching_entry() {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        let first = tracker.send_with_ack("agent.status", json!({}));
        let second = tracker.send_with_ack("agent.status", json!({}));

        assert!(tracker.acknowledge(&first));
        assert!(!tracker.acknowledge(&first));
        assert!(!tracker.is_pending(&first));
        assert!(tracker.is_pending(&second));
    }

    #[test]
    fn sweep_leaves_fresh_entries_alone() {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        let start = Instant::now();
        tracker.send_with_ack_at("agent.status", json!({}), start);

        let report = tracker.sweep_at(start + Duration::from_secs(1));
        assert!(report.retried.is_empty());
        assert_eq!(sink.envelopes().len(), 1);
    }

    #[test]
    fn sweep_resends_same_id_then_drops_after_budget() {
        let sink = RecordingSink::new();
        let mut tracker = tracker(&sink);
        let start = Instant::now();
        let id = tracker.send_with_ack_at("message.new", json!({"text": "hi"}), start);

        let mut now = start;
        for attempt in 1..=3 {
            now += Duration::from_secs(3);
            let report = tracker.sweep_at(now);
            assert_eq!(report.retried, vec![id.clone()]);
            assert_eq!(tracker.pending(&id).map(|p| p.retries), Some(attempt));
        }

        now += Duration::from_secs(3);
        let report = tracker.sweep_at(now);
        assert_eq!(report.dropped, vec![id.clone()]);
        assert!(!tracker.is_pending(&id));

        let emitted = sink.envelopes();
        assert_eq!(emitted.len(), 4);
        assert!(emitted.iter().all(|envelope| envelope.id == id));
    }
}
