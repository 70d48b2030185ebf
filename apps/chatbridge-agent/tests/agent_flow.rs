use std::collections::BTreeSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chatbridge_agent::{
    AgentConfig, AgentLoop, AgentPhase, AgentServices, ChatSessionProvider, Clipboard,
    IncomingMessage, IncomingSender, InputDriver, KeystrokeInjector, LoopControl, SessionHandle,
    spawn_line_reader,
};
use chatbridge_protocol::{
    ChatKind, ChatSummary, DeliveryTracker, Envelope, RecordingSink, message_types,
};
use serde_json::{Value, json};

#[derive(Default)]
struct Script {
    unready: bool,
    refuse: BTreeSet<String>,
    chats: Option<Vec<ChatSummary>>,
    calls: Vec<String>,
    clipboard: String,
    paste_fails: bool,
    pasted: Vec<String>,
}

#[derive(Clone, Default)]
struct Scripted(Arc<Mutex<Script>>);

impl Scripted {
    fn script(&self) -> MutexGuard<'_, Script> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }
}

impl ChatSessionProvider for Scripted {
    fn ensure_ready(&mut self) -> anyhow::Result<()> {
        if self.script().unready {
            anyhow::bail!("chat client not running");
        }
        Ok(())
    }

    fn add_listener(&mut self, name: &str, _incoming: IncomingSender) -> anyhow::Result<SessionHandle> {
        let mut script = self.script();
        script.calls.push(format!("add:{name}"));
        if script.refuse.contains(name) {
            anyhow::bail!("not in session list");
        }
        Ok(SessionHandle::new(format!("h-{name}")))
    }

    fn remove_listener(&mut self, handle: &SessionHandle) -> anyhow::Result<()> {
        self.script().calls.push(format!("remove:{handle}"));
        Ok(())
    }

    fn list_chats(&mut self) -> anyhow::Result<Vec<ChatSummary>> {
        let mut script = self.script();
        script.calls.push("list".to_string());
        script
            .chats
            .clone()
            .ok_or_else(|| anyhow::anyhow!("session list not found"))
    }

    fn activate_chat(&mut self, chat_id: &str) -> anyhow::Result<()> {
        self.script().calls.push(format!("activate:{chat_id}"));
        anyhow::bail!("activation is flaky")
    }

    fn poll(&mut self) -> anyhow::Result<()> {
        self.script().calls.push("poll".to_string());
        Ok(())
    }
}

impl Clipboard for Scripted {
    fn get_text(&mut self) -> anyhow::Result<String> {
        Ok(self.script().clipboard.clone())
    }

    fn set_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.script().clipboard = text.to_string();
        Ok(())
    }
}

impl KeystrokeInjector for Scripted {
    fn paste(&mut self) -> anyhow::Result<()> {
        let mut script = self.script();
        let current = script.clipboard.clone();
        script.pasted.push(current);
        if script.paste_fails {
            anyhow::bail!("no focused input box");
        }
        Ok(())
    }
}

struct Harness {
    agent: AgentLoop,
    commands: Sender<LoopControl>,
    incoming: IncomingSender,
    sink: RecordingSink,
    scripted: Scripted,
    shutdown: Arc<AtomicBool>,
}

impl Harness {
    fn new() -> Self {
        let scripted = Scripted::default();
        scripted.script().clipboard = "previous".to_string();
        let sink = RecordingSink::new();
        let config = AgentConfig {
            tick: Duration::from_millis(1),
            ..AgentConfig::default()
        };
        let tracker = DeliveryTracker::new(Box::new(sink.clone()), config.delivery_policy());
        let services = AgentServices::new(
            tracker,
            Box::new(scripted.clone()),
            InputDriver::new(Box::new(scripted.clone()), Box::new(scripted.clone())),
        );
        let incoming = services.incoming_tx.clone();
        let (commands, command_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let agent = AgentLoop::new(config, services, command_rx, Arc::clone(&shutdown));
        Self {
            agent,
            commands,
            incoming,
            sink,
            scripted,
            shutdown,
        }
    }

    fn send(&mut self, message_type: &str, id: &str, payload: Value) {
        let envelope = Envelope::with_id(message_type, payload, id);
        let queued = self.commands.send(LoopControl::Command(Box::new(envelope)));
        assert!(queued.is_ok());
        self.agent.run_once();
    }

    fn push_message(&self, chat: &str, raw: Value) {
        let message = IncomingMessage::from_raw(SessionHandle::new(format!("h-{chat}")), chat, &raw);
        assert!(self.incoming.send(message).is_ok());
    }

    fn types(&self) -> Vec<String> {
        self.sink
            .envelopes()
            .into_iter()
            .map(|envelope| envelope.message_type)
            .collect()
    }
}

#[test]
fn receipt_ack_precedes_side_effects() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Team A", "kind": "group"}]}),
    );

    let emitted = harness.sink.envelopes();
    assert_eq!(emitted[0].message_type, message_types::EVENT_ACK);
    assert_eq!(emitted[0].payload["ack_id"], "cmd-1");
    assert_eq!(emitted.last().map(|e| e.payload["state"].clone()), Some(json!("listening")));
    assert_eq!(harness.agent.state().phase, AgentPhase::Listening);
    assert_eq!(harness.scripted.calls(), vec!["add:Team A".to_string(), "poll".to_string()]);
}

#[test]
fn event_ack_is_consumed_without_acknowledgement() {
    let mut harness = Harness::new();
    harness.agent.announce_ready();
    let ready = harness.sink.of_type(message_types::AGENT_READY);
    assert_eq!(ready[0].payload["capabilities"], json!(["listen", "write", "chats"]));
    assert_eq!(harness.agent.services_mut().tracker.pending_len(), 1);

    harness.send(message_types::EVENT_ACK, "host-ack", json!({"ack_id": ready[0].id}));
    assert_eq!(harness.agent.services_mut().tracker.pending_len(), 0);
    assert!(harness.sink.of_type(message_types::EVENT_ACK).is_empty());
}

#[test]
fn unready_provider_reports_listen_failure_and_stays_idle() {
    let mut harness = Harness::new();
    harness.scripted.script().unready = true;
    harness.send(message_types::LISTEN_START, "cmd-1", json!({}));

    assert_eq!(harness.agent.state().phase, AgentPhase::Idle);
    let errors = harness.sink.of_type(message_types::AGENT_ERROR);
    assert_eq!(errors[0].payload["code"], "LISTEN_FAILED");
    assert_eq!(errors[0].payload["recoverable"], true);
    let statuses = harness.sink.of_type(message_types::AGENT_STATUS);
    assert_eq!(statuses[0].payload["state"], "error");
}

#[test]
fn failed_resume_drops_to_idle_and_stops_polling() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Alice"}]}),
    );
    assert_eq!(harness.agent.state().phase, AgentPhase::Listening);

    harness.scripted.script().unready = true;
    harness.send(message_types::LISTEN_RESUME, "cmd-2", json!({}));
    assert_eq!(harness.agent.state().phase, AgentPhase::Idle);

    let polls_before = harness.scripted.calls().iter().filter(|call| *call == "poll").count();
    harness.push_message("Alice", json!("still there?"));
    harness.agent.run_once();
    let polls_after = harness.scripted.calls().iter().filter(|call| *call == "poll").count();
    assert_eq!(polls_before, polls_after);
    assert!(harness.sink.of_type(message_types::MESSAGE_NEW).is_empty());

    let states: Vec<Value> = harness
        .sink
        .of_type(message_types::AGENT_STATUS)
        .into_iter()
        .map(|status| status.payload["state"].clone())
        .collect();
    assert_eq!(states, vec![json!("listening"), json!("error")]);
}

#[test]
fn per_target_failure_does_not_stop_reconciliation() {
    let mut harness = Harness::new();
    harness.scripted.script().refuse.insert("Ghost".to_string());
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Ghost"}, {"name": "Zed", "kind": "direct"}]}),
    );

    let state = harness.agent.state();
    assert!(state.active_targets.contains_key("Zed"));
    assert!(!state.active_targets.contains_key("Ghost"));
    let errors = harness.sink.of_type(message_types::AGENT_ERROR);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].payload["code"], "LISTEN_TARGET_FAILED");
}

#[test]
fn targets_are_only_added_while_listening() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_TARGETS,
        "cmd-1",
        json!({"targets": [{"name": " Team A ", "kind": "group"}, {"name": "Team A"}]}),
    );
    assert!(harness.scripted.calls().is_empty());
    assert_eq!(
        harness.agent.state().listen_targets.get("Team A"),
        Some(&ChatKind::Group)
    );

    harness.send(message_types::LISTEN_START, "cmd-2", json!({}));
    harness.send(message_types::LISTEN_TARGETS, "cmd-3", json!({"targets": [{"name": "Team A", "kind": "group"}]}));
    let adds = harness
        .scripted
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("add:"))
        .count();
    assert_eq!(adds, 1);
}

#[test]
fn duplicate_deliveries_emit_one_message_event() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Team A", "kind": "group"}]}),
    );
    harness.push_message("Team A", json!({"sender": "Bob", "text": "lunch?"}));
    harness.push_message("Team A", json!({"sender": "Bob", "text": "lunch?"}));
    harness.agent.run_once();

    let events = harness.sink.of_type(message_types::MESSAGE_NEW);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["is_group"], true);
    assert_eq!(events[0].payload["sender_name"], "Bob");
    assert_eq!(events[0].payload["text"], "lunch?");
}

#[test]
fn pause_discards_buffer_and_stop_removes_listeners() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Alice", "kind": "direct"}]}),
    );
    harness.push_message("Alice", json!("are you there"));
    harness.send(message_types::LISTEN_PAUSE, "cmd-2", json!({}));
    assert_eq!(harness.agent.state().phase, AgentPhase::Paused);

    harness.send(message_types::LISTEN_RESUME, "cmd-3", json!({}));
    harness.agent.run_once();
    assert!(harness.sink.of_type(message_types::MESSAGE_NEW).is_empty());

    harness.send(message_types::LISTEN_STOP, "cmd-4", json!({}));
    assert_eq!(harness.agent.state().phase, AgentPhase::Idle);
    assert!(harness.agent.state().active_targets.is_empty());
    assert!(harness.scripted.calls().contains(&"remove:h-Alice".to_string()));

    let states: Vec<Value> = harness
        .sink
        .of_type(message_types::AGENT_STATUS)
        .into_iter()
        .map(|status| status.payload["state"].clone())
        .collect();
    assert_eq!(
        states,
        vec![json!("listening"), json!("paused"), json!("listening"), json!("idle")]
    );
}

#[test]
fn messages_arriving_while_paused_are_never_emitted() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Alice", "kind": "direct"}]}),
    );
    harness.send(message_types::LISTEN_PAUSE, "cmd-2", json!({}));

    for index in 0..30 {
        harness.push_message("Alice", json!({"id": format!("m-{index}"), "text": "while paused"}));
        harness.agent.run_once();
    }
    harness.push_message("Alice", json!({"id": "m-last", "text": "just before resume"}));
    harness.send(message_types::LISTEN_RESUME, "cmd-3", json!({}));
    harness.agent.run_once();
    assert!(harness.sink.of_type(message_types::MESSAGE_NEW).is_empty());

    harness.push_message("Alice", json!({"id": "m-new", "text": "after resume"}));
    harness.agent.run_once();
    let events = harness.sink.of_type(message_types::MESSAGE_NEW);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].payload["msg_id"], "m-new");
}

#[test]
fn input_write_pastes_and_restores_clipboard() {
    let mut harness = Harness::new();
    harness.send(
        message_types::INPUT_WRITE,
        "cmd-1",
        json!({"chat_id": " Alice ", "text": "on my way"}),
    );

    let results = harness.sink.of_type(message_types::INPUT_RESULT);
    assert_eq!(results[0].payload, json!({"ok": true, "error": ""}));
    let script = harness.scripted.script();
    assert_eq!(script.pasted, vec!["on my way".to_string()]);
    assert_eq!(script.clipboard, "previous");
    assert_eq!(script.calls, vec!["activate:Alice".to_string()]);
}

#[test]
fn failed_paste_reports_result_and_still_restores_clipboard() {
    let mut harness = Harness::new();
    harness.scripted.script().paste_fails = true;
    harness.send(
        message_types::INPUT_WRITE,
        "cmd-1",
        json!({"chat_id": "Alice", "text": "hello", "restore_clipboard": true}),
    );

    let results = harness.sink.of_type(message_types::INPUT_RESULT);
    assert_eq!(results[0].payload["ok"], false);
    assert_eq!(results[0].payload["error"], "no focused input box");
    assert_eq!(harness.scripted.script().clipboard, "previous");
}

#[test]
fn input_write_rejects_blank_fields_and_unready_provider() {
    let mut harness = Harness::new();
    harness.send(message_types::INPUT_WRITE, "cmd-1", json!({"chat_id": "Alice", "text": "  "}));
    let results = harness.sink.of_type(message_types::INPUT_RESULT);
    assert_eq!(results[0].payload["error"], "chat_id or text is empty");

    harness.scripted.script().unready = true;
    harness.send(message_types::INPUT_WRITE, "cmd-2", json!({"chat_id": "Alice", "text": "hi"}));
    let errors = harness.sink.of_type(message_types::AGENT_ERROR);
    assert_eq!(errors[0].payload["code"], "WRITE_FAILED");
    assert_eq!(harness.sink.of_type(message_types::INPUT_RESULT).len(), 2);
    assert!(harness.scripted.script().pasted.is_empty());
}

#[test]
fn chats_list_reports_result_and_failures() {
    let mut harness = Harness::new();
    harness.send(message_types::CHATS_LIST, "cmd-1", json!({}));
    let failed = harness.sink.of_type(message_types::CHATS_LIST_RESULT);
    assert_eq!(failed[0].payload["ok"], false);
    assert_eq!(
        harness.sink.of_type(message_types::AGENT_ERROR)[0].payload["code"],
        "CHAT_LIST_FAILED"
    );

    harness.scripted.script().chats = Some(vec![ChatSummary {
        chat_id: "Team A".to_string(),
        chat_title: "Team A".to_string(),
        kind: ChatKind::Group,
    }]);
    harness.send(message_types::CHATS_LIST, "cmd-2", json!({}));
    let listed = harness.sink.of_type(message_types::CHATS_LIST_RESULT);
    assert_eq!(listed[1].payload["chats"][0]["kind"], "group");
}

#[test]
fn unknown_commands_are_acknowledged_and_ignored() {
    let mut harness = Harness::new();
    harness.send("window.minimize", "cmd-1", json!({}));
    assert_eq!(harness.types(), vec![message_types::EVENT_ACK.to_string()]);
}

#[test]
fn line_reader_drops_invalid_lines_and_signals_end_of_input() {
    let input = concat!(
        "{\"version\":\"1.0\",\"type\":\"listen.pause\",\"id\":\"a\",\"timestamp\":1,\"payload\":{}}\n",
        "not json\n",
        "\n",
        "{\"version\":\"2.0\",\"type\":\"listen.stop\",\"id\":\"b\",\"timestamp\":1,\"payload\":{}}\n",
        "{\"version\":\"1.0\",\"type\":\"chats.list\"}\n",
    );
    let (tx, rx) = mpsc::channel();
    let reader = spawn_line_reader(Cursor::new(input.as_bytes().to_vec()), tx);
    let Ok(reader) = reader else {
        panic!("reader thread failed to start");
    };
    assert!(reader.join().is_ok());

    let received: Vec<LoopControl> = rx.try_iter().collect();
    assert_eq!(received.len(), 3);
    let LoopControl::Command(first) = &received[0] else {
        panic!("expected a command first");
    };
    assert_eq!(first.message_type, message_types::LISTEN_PAUSE);
    let LoopControl::Command(second) = &received[1] else {
        panic!("expected a second command");
    };
    assert_eq!(second.message_type, message_types::CHATS_LIST);
    assert!(second.id.is_empty());
    assert!(matches!(received[2], LoopControl::InputClosed));
}

#[test]
fn shutdown_removes_active_listeners() {
    let mut harness = Harness::new();
    harness.send(
        message_types::LISTEN_START,
        "cmd-1",
        json!({"targets": [{"name": "Alice"}]}),
    );
    harness.shutdown.store(true, Ordering::Relaxed);
    harness.agent.run();

    assert!(harness.agent.state().active_targets.is_empty());
    assert!(harness.scripted.calls().contains(&"remove:h-Alice".to_string()));
}
