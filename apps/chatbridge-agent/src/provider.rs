//! The chat-session provider seam and the message boundary adapter.
//!
//! Providers wrap whatever automation library talks to the chat client. They
//! hand incoming messages to the agent through an [`IncomingSender`]; the
//! agent never lets a provider touch `AgentState` directly.

use std::fmt;
use std::sync::mpsc::Sender;

use anyhow::Result;
use chatbridge_protocol::ChatSummary;
use serde_json::Value;

/// The provider's own identifier for a conversation it listens to. May
/// differ from the name the host asked for.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct SessionHandle(String);

impl SessionHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fixed accessor set every message source is reduced to.
pub trait ChatMessage {
    fn text(&self) -> Option<&str>;
    fn sender(&self) -> Option<&str>;
    fn message_id(&self) -> Option<&str>;
    fn content_hash(&self) -> Option<&str>;
}

/// A provider message normalized once at the boundary.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NormalizedMessage {
    pub text: Option<String>,
    pub sender: Option<String>,
    pub message_id: Option<String>,
    pub content_hash: Option<String>,
}

impl NormalizedMessage {
    /// Adapts the shapes automation libraries hand back: objects with one of
    /// several field spellings, `[sender, text]` arrays, or bare strings.
    pub fn from_value(raw: &Value) -> Self {
        match raw {
            Value::String(text) => Self {
                text: non_empty(text),
                ..Self::default()
            },
            Value::Array(items) => Self {
                text: items.last().and_then(Value::as_str).and_then(non_empty),
                sender: (items.len() > 1)
                    .then(|| items.first().and_then(Value::as_str).and_then(non_empty))
                    .flatten(),
                ..Self::default()
            },
            Value::Object(_) => Self {
                text: first_string(raw, &["text", "content", "msg", "message"]),
                sender: first_string(raw, &["sender", "name", "from"]),
                message_id: first_string(raw, &["msg_id", "id"]),
                content_hash: first_string(raw, &["hash", "content_hash"]),
            },
            _ => Self::default(),
        }
    }
}

impl ChatMessage for NormalizedMessage {
    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    fn content_hash(&self) -> Option<&str> {
        self.content_hash.as_deref()
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => non_empty(text),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn first_string(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(scalar_string))
}

/// One message delivered by a provider for a listened conversation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IncomingMessage {
    pub session: SessionHandle,
    pub chat_title: String,
    pub message: NormalizedMessage,
}

impl IncomingMessage {
    pub fn from_raw(session: SessionHandle, chat_title: impl Into<String>, raw: &Value) -> Self {
        Self {
            session,
            chat_title: chat_title.into(),
            message: NormalizedMessage::from_value(raw),
        }
    }
}

pub type IncomingSender = Sender<IncomingMessage>;

/// The external chat-session provider.
///
/// Calls happen on the dispatch thread only. Listener callbacks may run on
/// the provider's own threads and must go through the [`IncomingSender`].
pub trait ChatSessionProvider {
    /// Confirms the chat client is reachable and ready for automation.
    fn ensure_ready(&mut self) -> Result<()>;

    /// Starts listening to the conversation named `name`.
    fn add_listener(&mut self, name: &str, incoming: IncomingSender) -> Result<SessionHandle>;

    fn remove_listener(&mut self, handle: &SessionHandle) -> Result<()>;

    fn list_chats(&mut self) -> Result<Vec<ChatSummary>>;

    /// Brings `chat_id` to the foreground so pasted text lands there.
    fn activate_chat(&mut self, chat_id: &str) -> Result<()>;

    /// Called from the loop every poll interval while listening. Providers
    /// without push delivery fetch new messages here.
    fn poll(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Provider used when no automation backend is available on this host.
/// Every call fails with the configured reason.
#[derive(Clone, Debug)]
pub struct UnavailableSessionProvider {
    reason: String,
}

impl UnavailableSessionProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ChatSessionProvider for UnavailableSessionProvider {
    fn ensure_ready(&mut self) -> Result<()> {
        anyhow::bail!("{}", self.reason)
    }

    fn add_listener(&mut self, _name: &str, _incoming: IncomingSender) -> Result<SessionHandle> {
        anyhow::bail!("{}", self.reason)
    }

    fn remove_listener(&mut self, _handle: &SessionHandle) -> Result<()> {
        anyhow::bail!("{}", self.reason)
    }

    fn list_chats(&mut self) -> Result<Vec<ChatSummary>> {
        anyhow::bail!("{}", self.reason)
    }

    fn activate_chat(&mut self, _chat_id: &str) -> Result<()> {
        anyhow::bail!("{}", self.reason)
    }
}
