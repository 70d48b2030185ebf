//! Typed payloads for the envelope `payload` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Conversation classification carried on listen targets and events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Direct,
    Group,
    #[default]
    Unknown,
}

impl ChatKind {
    /// Lenient parse: anything other than `direct`/`group` folds to `Unknown`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("direct") => Self::Direct,
            Some("group") => Self::Group,
            _ => Self::Unknown,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
            Self::Unknown => "unknown",
        }
    }
}

/// Error codes reported through `agent.error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ListenFailed,
    ListenTargetFailed,
    WriteFailed,
    ChatListFailed,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ListenFailed => "LISTEN_FAILED",
            Self::ListenTargetFailed => "LISTEN_TARGET_FAILED",
            Self::WriteFailed => "WRITE_FAILED",
            Self::ChatListFailed => "CHAT_LIST_FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReadyPayload {
    pub platform: String,
    pub agent_version: String,
    pub capabilities: Vec<String>,
    pub supports_clipboard_restore: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusPayload {
    pub state: String,
    #[serde(default)]
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentErrorPayload {
    pub code: ErrorCode,
    pub message: String,
    pub recoverable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAckPayload {
    #[serde(default)]
    pub ack_id: Option<String>,
    #[serde(default = "default_true")]
    pub ok: bool,
    #[serde(default)]
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageNewPayload {
    pub chat_id: String,
    pub chat_title: String,
    pub is_group: bool,
    pub chat_kind: ChatKind,
    pub sender_name: String,
    pub text: String,
    pub timestamp: i64,
    pub msg_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResultPayload {
    pub ok: bool,
    #[serde(default)]
    pub error: String,
}

impl InputResultPayload {
    pub fn success() -> Self {
        Self {
            ok: true,
            error: String::new(),
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSummary {
    pub chat_id: String,
    pub chat_title: String,
    pub kind: ChatKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatsListResultPayload {
    pub ok: bool,
    pub chats: Vec<ChatSummary>,
    #[serde(default)]
    pub error: String,
}

/// `listen.start` / `listen.resume`. Targets stay raw JSON so a malformed
/// entry drops only itself during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenStartPayload {
    #[serde(default)]
    pub poll_interval_ms: Option<Value>,
    #[serde(default)]
    pub targets: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListenTargetsPayload {
    #[serde(default)]
    pub targets: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputWritePayload {
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub restore_clipboard: Option<bool>,
}

fn default_true() -> bool {
    true
}
