//! Local agent bridging a host controller to a desktop chat client.
//!
//! The host speaks line-delimited JSON envelopes on stdin/stdout. A reader
//! thread decodes inbound lines into a queue; one dispatch loop owns
//! [`AgentState`] and every collaborator, so no state is shared across
//! threads except the two hand-off queues.

pub mod agent_loop;
pub mod config;
pub mod desktop;
pub mod dispatcher;
mod events;
pub mod ingest;
pub mod input;
pub mod provider;
pub mod reconcile;
pub mod state;
pub mod targets;
#[cfg(windows)]
pub mod windows_desktop;

pub use agent_loop::{AgentLoop, CAPABILITIES, LoopControl, spawn_line_reader};
pub use config::{AgentConfig, ConfigError, MIN_POLL_INTERVAL, load_layout_labels};
pub use desktop::{DesktopSession, LayoutSessionProvider};
pub use dispatcher::{AgentServices, dispatch};
pub use input::{
    ArboardClipboard, Clipboard, ClipboardGuard, InputDriver, KeystrokeInjector,
    UnavailableKeystrokeInjector, write_input,
};
pub use provider::{
    ChatMessage, ChatSessionProvider, IncomingMessage, IncomingSender, NormalizedMessage,
    SessionHandle, UnavailableSessionProvider,
};
pub use state::{AgentPhase, AgentState};
pub use targets::{ListenTarget, normalize_listen_targets};
#[cfg(windows)]
pub use windows_desktop::{SendInputPaste, UiaControl, UiaDesktop};
