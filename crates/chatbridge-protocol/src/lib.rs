//! Wire protocol shared by the chat bridge agent and its host controller.
//!
//! Every message is an [`Envelope`] serialized as one JSON object per line.
//! Outbound messages that need confirmation go through the
//! [`DeliveryTracker`], which re-emits them until the host acknowledges the
//! id or the retry budget runs out.

mod delivery;
mod envelope;
mod error;
mod payloads;
mod sink;

pub use delivery::{DeliveryPolicy, DeliveryTracker, PendingMessage, SweepReport};
pub use envelope::{
    Envelope, MAX_LINE_BYTES, PROTOCOL_VERSION, decode_line, encode_line, unix_timestamp,
};
pub use error::ProtocolError;
pub use payloads::*;
pub use sink::{EnvelopeSink, LineWriterSink, RecordingSink};

/// Message types understood on the wire.
pub mod message_types {
    pub const LISTEN_START: &str = "listen.start";
    pub const LISTEN_RESUME: &str = "listen.resume";
    pub const LISTEN_PAUSE: &str = "listen.pause";
    pub const LISTEN_STOP: &str = "listen.stop";
    pub const LISTEN_TARGETS: &str = "listen.targets";
    pub const INPUT_WRITE: &str = "input.write";
    pub const CHATS_LIST: &str = "chats.list";
    pub const EVENT_ACK: &str = "event.ack";

    pub const AGENT_READY: &str = "agent.ready";
    pub const AGENT_STATUS: &str = "agent.status";
    pub const AGENT_ERROR: &str = "agent.error";
    pub const MESSAGE_NEW: &str = "message.new";
    pub const INPUT_RESULT: &str = "input.result";
    pub const CHATS_LIST_RESULT: &str = "chats.list.result";
}

/// Host to agent command types, in the order the dispatcher documents them.
pub const SUPPORTED_COMMAND_TYPES: &[&str] = &[
    message_types::LISTEN_START,
    message_types::LISTEN_RESUME,
    message_types::LISTEN_PAUSE,
    message_types::LISTEN_STOP,
    message_types::LISTEN_TARGETS,
    message_types::INPUT_WRITE,
    message_types::CHATS_LIST,
    message_types::EVENT_ACK,
];

/// Agent to host event types.
pub const SUPPORTED_EVENT_TYPES: &[&str] = &[
    message_types::AGENT_READY,
    message_types::AGENT_STATUS,
    message_types::AGENT_ERROR,
    message_types::MESSAGE_NEW,
    message_types::INPUT_RESULT,
    message_types::CHATS_LIST_RESULT,
    message_types::EVENT_ACK,
];
