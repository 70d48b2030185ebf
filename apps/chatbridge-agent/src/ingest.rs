use std::sync::mpsc::{Receiver, TryRecvError};

use chatbridge_protocol::{ChatKind, DeliveryTracker, MessageNewPayload, message_types, unix_timestamp};

use crate::events::emit_event;
use crate::provider::{ChatMessage, IncomingMessage};
use crate::state::AgentState;

/// Dedup key for a message: explicit id, else content hash, else
/// `sender:text`. `None` when the message carries no text.
pub fn dedup_key(message: &impl ChatMessage, fallback_sender: &str) -> Option<String> {
    let text = message.text()?;
    let key = message
        .message_id()
        .or_else(|| message.content_hash())
        .map_or_else(
            || format!("{}:{text}", message.sender().unwrap_or(fallback_sender)),
            str::to_string,
        );
    Some(key)
}

/// Emits `message.new` for `incoming` unless it repeats the last key seen in
/// the same conversation. Returns whether an event was emitted.
pub fn ingest_message(
    state: &mut AgentState,
    tracker: &mut DeliveryTracker,
    incoming: &IncomingMessage,
) -> bool {
    let chat_title = incoming.chat_title.trim();
    let message = &incoming.message;
    let Some(text) = message.text() else {
        tracing::trace!(chat = chat_title, "dropping message without text");
        return false;
    };
    let Some(key) = dedup_key(message, chat_title) else {
        return false;
    };
    if state.last_message_keys.get(chat_title) == Some(&key) {
        tracing::trace!(chat = chat_title, key = %key, "suppressing duplicate delivery");
        return false;
    }
    state
        .last_message_keys
        .insert(chat_title.to_string(), key);

    let kind = state.kind_for(&incoming.session);
    let payload = MessageNewPayload {
        chat_id: chat_title.to_string(),
        chat_title: chat_title.to_string(),
        is_group: kind == ChatKind::Group,
        chat_kind: kind,
        sender_name: message.sender().unwrap_or(chat_title).to_string(),
        text: text.to_string(),
        timestamp: unix_timestamp(),
        msg_id: message.message_id().map(str::to_string),
    };
    emit_event(tracker, message_types::MESSAGE_NEW, &payload);
    true
}

/// Processes at most `batch` buffered messages. Returns how many events were
/// emitted.
pub fn drain_incoming(
    state: &mut AgentState,
    tracker: &mut DeliveryTracker,
    queue: &Receiver<IncomingMessage>,
    batch: usize,
) -> usize {
    let mut emitted = 0;
    for _ in 0..batch {
        match queue.try_recv() {
            Ok(incoming) => {
                if ingest_message(state, tracker, &incoming) {
                    emitted += 1;
                }
            }
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
    emitted
}

/// Drops everything currently buffered. Returns the number discarded.
pub fn discard_incoming(queue: &Receiver<IncomingMessage>) -> usize {
    queue.try_iter().count()
}
