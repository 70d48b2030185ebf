use std::collections::BTreeMap;
use std::time::Duration;

use chatbridge_protocol::ChatKind;

use crate::provider::SessionHandle;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AgentPhase {
    #[default]
    Idle,
    Listening,
    Paused,
}

impl AgentPhase {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Paused => "paused",
        }
    }
}

/// Everything the dispatch loop mutates. Owned by the loop and passed to each
/// handler; never shared across threads.
#[derive(Clone, Debug)]
pub struct AgentState {
    pub phase: AgentPhase,
    pub poll_interval: Duration,
    /// Conversation title to the last dedup key emitted for it.
    pub last_message_keys: BTreeMap<String, String>,
    /// Desired listen targets: name to declared kind.
    pub listen_targets: BTreeMap<String, ChatKind>,
    /// Desired name to the handle the provider resolved for it.
    pub active_targets: BTreeMap<String, SessionHandle>,
    pub active_kinds: BTreeMap<SessionHandle, ChatKind>,
}

impl AgentState {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            phase: AgentPhase::Idle,
            poll_interval,
            last_message_keys: BTreeMap::new(),
            listen_targets: BTreeMap::new(),
            active_targets: BTreeMap::new(),
            active_kinds: BTreeMap::new(),
        }
    }

    pub fn is_listening(&self) -> bool {
        self.phase == AgentPhase::Listening
    }

    /// Kind recorded for the active target whose handle is `handle`.
    pub fn kind_for(&self, handle: &SessionHandle) -> ChatKind {
        self.active_kinds.get(handle).copied().unwrap_or_default()
    }

    pub fn forget_active(&mut self, name: &str) -> Option<SessionHandle> {
        let handle = self.active_targets.remove(name)?;
        self.active_kinds.remove(&handle);
        Some(handle)
    }
}
