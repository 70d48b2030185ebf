use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Instant;

use chatbridge_protocol::{AgentReadyPayload, ErrorCode, Envelope, decode_line, message_types};

use crate::config::AgentConfig;
use crate::dispatcher::{AgentServices, dispatch};
use crate::events::{emit_error, emit_event};
use crate::ingest::{discard_incoming, drain_incoming};
use crate::reconcile::remove_all_listeners;
use crate::state::AgentState;

pub const CAPABILITIES: [&str; 3] = ["listen", "write", "chats"];

/// What the reader thread hands to the loop.
#[derive(Debug)]
pub enum LoopControl {
    Command(Box<Envelope>),
    InputClosed,
}

/// Spawns the single inbound reader. Each non-blank line is decoded; lines
/// that fail validation are dropped without a response.
pub fn spawn_line_reader<R>(reader: R, commands: Sender<LoopControl>) -> std::io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    std::thread::Builder::new()
        .name("chatbridge-stdin".to_string())
        .spawn(move || read_lines(reader, &commands))
}

fn read_lines<R: BufRead>(reader: R, commands: &Sender<LoopControl>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(error) => {
                tracing::warn!(error = %error, "inbound read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok(envelope) => {
                if commands.send(LoopControl::Command(Box::new(envelope))).is_err() {
                    return;
                }
            }
            Err(error) => tracing::debug!(error = %error, "dropping inbound line"),
        }
    }
    let _ = commands.send(LoopControl::InputClosed);
}

/// The single-threaded dispatch loop.
///
/// Each iteration waits at most one tick for a command and dispatches it,
/// polls the provider when due, drains up to one batch of buffered messages
/// while listening (or discards them when not), then runs the retry sweep.
pub struct AgentLoop {
    state: AgentState,
    services: AgentServices,
    config: AgentConfig,
    commands: Receiver<LoopControl>,
    shutdown: Arc<AtomicBool>,
    last_poll: Option<Instant>,
    input_closed: bool,
}

impl AgentLoop {
    pub fn new(
        config: AgentConfig,
        services: AgentServices,
        commands: Receiver<LoopControl>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state: AgentState::new(config.poll_interval),
            services,
            config,
            commands,
            shutdown,
            last_poll: None,
            input_closed: false,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn services_mut(&mut self) -> &mut AgentServices {
        &mut self.services
    }

    pub fn announce_ready(&mut self) {
        let payload = AgentReadyPayload {
            platform: std::env::consts::OS.to_string(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            capabilities: CAPABILITIES.iter().map(|capability| (*capability).to_string()).collect(),
            supports_clipboard_restore: true,
        };
        emit_event(&mut self.services.tracker, message_types::AGENT_READY, &payload);
    }

    /// Runs until the shutdown flag is raised, then removes active listeners.
    pub fn run(&mut self) {
        tracing::info!(
            tick_ms = self.config.tick.as_millis() as u64,
            batch = self.config.message_batch,
            "agent loop started"
        );
        while !self.shutdown.load(Ordering::Relaxed) {
            self.run_once();
        }
        remove_all_listeners(&mut self.state, self.services.provider.as_mut());
        tracing::info!(pending = self.services.tracker.pending_len(), "agent loop stopped");
    }

    pub fn run_once(&mut self) {
        self.run_once_at(Instant::now());
    }

    pub fn run_once_at(&mut self, now: Instant) {
        match self.commands.recv_timeout(self.config.tick) {
            Ok(LoopControl::Command(envelope)) => {
                dispatch(&mut self.state, &mut self.services, &self.config, &envelope);
            }
            Ok(LoopControl::InputClosed) => {
                self.input_closed = true;
                tracing::info!("inbound channel closed; waiting for shutdown signal");
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if !self.input_closed {
                    self.input_closed = true;
                    tracing::info!("inbound reader gone; waiting for shutdown signal");
                }
                std::thread::sleep(self.config.tick);
            }
        }

        if self.state.is_listening() {
            self.poll_if_due(now);
            drain_incoming(
                &mut self.state,
                &mut self.services.tracker,
                &self.services.incoming_rx,
                self.config.message_batch,
            );
        } else {
            let discarded = discard_incoming(&self.services.incoming_rx);
            if discarded > 0 {
                tracing::trace!(
                    discarded,
                    phase = self.state.phase.label(),
                    "dropping messages received while not listening"
                );
            }
        }

        let report = self.services.tracker.sweep_at(now);
        if !report.dropped.is_empty() {
            tracing::debug!(dropped = report.dropped.len(), "gave up on unacknowledged events");
        }
    }

    fn poll_if_due(&mut self, now: Instant) {
        let due = self
            .last_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= self.state.poll_interval);
        if !due {
            return;
        }
        self.last_poll = Some(now);
        if let Err(error) = self.services.provider.poll() {
            emit_error(
                &mut self.services.tracker,
                ErrorCode::ListenFailed,
                format!("fetch messages failed: {error}"),
            );
        }
    }
}
