use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use chatbridge_protocol::{
    ChatsListResultPayload, DeliveryTracker, Envelope, ErrorCode, EventAckPayload,
    InputResultPayload, InputWritePayload, ListenStartPayload, ListenTargetsPayload, message_types,
};
use serde_json::Value;

use crate::config::{AgentConfig, MIN_POLL_INTERVAL};
use crate::events::{emit_error, emit_event, emit_input_result, emit_status};
use crate::ingest::discard_incoming;
use crate::input::{InputDriver, write_input};
use crate::provider::{ChatSessionProvider, IncomingMessage, IncomingSender};
use crate::reconcile::{reconcile_listeners, remove_all_listeners, replace_listen_targets};
use crate::state::{AgentPhase, AgentState};
use crate::targets::normalize_listen_targets;

/// Collaborators the dispatch loop drives. Owned next to `AgentState` by the
/// loop; handlers borrow both.
pub struct AgentServices {
    pub tracker: DeliveryTracker,
    pub provider: Box<dyn ChatSessionProvider>,
    pub input: InputDriver,
    pub incoming_tx: IncomingSender,
    pub incoming_rx: Receiver<IncomingMessage>,
}

impl AgentServices {
    pub fn new(
        tracker: DeliveryTracker,
        provider: Box<dyn ChatSessionProvider>,
        input: InputDriver,
    ) -> Self {
        let (incoming_tx, incoming_rx) = mpsc::channel();
        Self {
            tracker,
            provider,
            input,
            incoming_tx,
            incoming_rx,
        }
    }
}

/// Handles one inbound command.
///
/// Receipt is acknowledged before any side effect for every command that
/// carries an id, except `event.ack` itself.
pub fn dispatch(
    state: &mut AgentState,
    services: &mut AgentServices,
    config: &AgentConfig,
    envelope: &Envelope,
) {
    if envelope.message_type == message_types::EVENT_ACK {
        handle_event_ack(services, envelope);
        return;
    }
    if !envelope.id.is_empty() {
        services.tracker.send_ack(&envelope.id, true, "");
    }

    tracing::debug!(
        message_type = %envelope.message_type,
        id = %envelope.id,
        phase = state.phase.label(),
        "dispatching command"
    );
    match envelope.message_type.as_str() {
        message_types::LISTEN_START | message_types::LISTEN_RESUME => {
            handle_listen_start(state, services, config, envelope);
        }
        message_types::LISTEN_PAUSE => handle_listen_pause(state, services),
        message_types::LISTEN_STOP => handle_listen_stop(state, services),
        message_types::LISTEN_TARGETS => handle_listen_targets(state, services, config, envelope),
        message_types::INPUT_WRITE => handle_input_write(services, config, envelope),
        message_types::CHATS_LIST => handle_chats_list(services),
        other => tracing::debug!(message_type = other, "ignoring unsupported command"),
    }
}

fn handle_event_ack(services: &mut AgentServices, envelope: &Envelope) {
    let ack = match envelope.payload_as::<EventAckPayload>() {
        Ok(ack) => ack,
        Err(error) => {
            tracing::debug!(error = %error, "ignoring malformed event.ack");
            return;
        }
    };
    let Some(ack_id) = ack.ack_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) else {
        tracing::debug!("event.ack without ack_id");
        return;
    };
    if !ack.ok {
        tracing::debug!(ack_id, error = %ack.error, "host reported failure for delivered event");
    }
    services.tracker.acknowledge(ack_id);
}

/// Interval from a host request, if acceptable. Values below the floor are
/// ignored.
pub fn requested_poll_interval(raw: Option<&Value>) -> Option<Duration> {
    let millis = raw?.as_f64().filter(|value| value.is_finite())?;
    let requested = Duration::from_millis(millis as u64);
    (requested >= MIN_POLL_INTERVAL).then_some(requested)
}

fn handle_listen_start(
    state: &mut AgentState,
    services: &mut AgentServices,
    config: &AgentConfig,
    envelope: &Envelope,
) {
    if let Err(error) = services.provider.ensure_ready() {
        state.phase = AgentPhase::Idle;
        emit_error(&mut services.tracker, ErrorCode::ListenFailed, error.to_string());
        emit_status(&mut services.tracker, "error", "listen initialization failed");
        return;
    }

    if !state.is_listening() {
        let discarded = discard_incoming(&services.incoming_rx);
        if discarded > 0 {
            tracing::debug!(discarded, "discarded messages buffered before listening");
        }
    }

    let payload = envelope
        .payload_as::<ListenStartPayload>()
        .unwrap_or_else(|error| {
            tracing::warn!(error = %error, "malformed listen payload; using defaults");
            ListenStartPayload::default()
        });
    if let Some(interval) = requested_poll_interval(payload.poll_interval_ms.as_ref()) {
        state.poll_interval = interval;
    }
    if let Some(raw_targets) = payload.targets {
        replace_listen_targets(
            state,
            normalize_listen_targets(&raw_targets, config.max_listen_targets),
        );
    }

    reconcile_listeners(
        state,
        services.provider.as_mut(),
        &services.incoming_tx,
        &mut services.tracker,
        true,
    );
    state.phase = AgentPhase::Listening;
    emit_status(&mut services.tracker, AgentPhase::Listening.label(), "");
}

fn handle_listen_pause(state: &mut AgentState, services: &mut AgentServices) {
    let discarded = discard_incoming(&services.incoming_rx);
    if discarded > 0 {
        tracing::debug!(discarded, "discarded buffered messages on pause");
    }
    state.phase = AgentPhase::Paused;
    emit_status(&mut services.tracker, AgentPhase::Paused.label(), "");
}

fn handle_listen_stop(state: &mut AgentState, services: &mut AgentServices) {
    discard_incoming(&services.incoming_rx);
    remove_all_listeners(state, services.provider.as_mut());
    state.phase = AgentPhase::Idle;
    emit_status(&mut services.tracker, AgentPhase::Idle.label(), "");
}

fn handle_listen_targets(
    state: &mut AgentState,
    services: &mut AgentServices,
    config: &AgentConfig,
    envelope: &Envelope,
) {
    let payload = match envelope.payload_as::<ListenTargetsPayload>() {
        Ok(payload) => payload,
        Err(error) => {
            tracing::warn!(error = %error, "malformed listen.targets payload; ignoring");
            return;
        }
    };
    replace_listen_targets(
        state,
        normalize_listen_targets(&payload.targets, config.max_listen_targets),
    );
    let allow_add = state.is_listening();
    reconcile_listeners(
        state,
        services.provider.as_mut(),
        &services.incoming_tx,
        &mut services.tracker,
        allow_add,
    );
}

fn handle_input_write(services: &mut AgentServices, config: &AgentConfig, envelope: &Envelope) {
    let payload = envelope
        .payload_as::<InputWritePayload>()
        .unwrap_or_else(|error| {
            tracing::warn!(error = %error, "malformed input.write payload");
            InputWritePayload::default()
        });
    let chat_id = payload.chat_id.trim();
    let text = payload.text.trim();
    if chat_id.is_empty() || text.is_empty() {
        emit_input_result(
            &mut services.tracker,
            &InputResultPayload::failure("chat_id or text is empty"),
        );
        return;
    }
    let restore = payload.restore_clipboard.unwrap_or(config.restore_clipboard);
    write_input(
        services.provider.as_mut(),
        &mut services.input,
        &mut services.tracker,
        chat_id,
        text,
        restore,
    );
}

fn handle_chats_list(services: &mut AgentServices) {
    let result = match services.provider.list_chats() {
        Ok(chats) => ChatsListResultPayload {
            ok: true,
            chats,
            error: String::new(),
        },
        Err(error) => {
            let message = error.to_string();
            emit_error(&mut services.tracker, ErrorCode::ChatListFailed, message.clone());
            ChatsListResultPayload {
                ok: false,
                chats: Vec::new(),
                error: message,
            }
        }
    };
    emit_event(&mut services.tracker, message_types::CHATS_LIST_RESULT, &result);
}
