use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::envelope::{Envelope, encode_line};
use crate::error::ProtocolError;

/// Destination for outbound envelopes.
pub trait EnvelopeSink: Send {
    fn emit(&mut self, envelope: &Envelope) -> Result<(), ProtocolError>;
}

/// Writes one JSON line per envelope and flushes after each.
pub struct LineWriterSink<W> {
    writer: W,
}

impl<W: Write + Send> LineWriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

impl<W: Write + Send> EnvelopeSink for LineWriterSink<W> {
    fn emit(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        let line = encode_line(envelope)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps every emitted envelope in memory; clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingSink {
    emitted: Arc<Mutex<Vec<Envelope>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelopes(&self) -> Vec<Envelope> {
        self.emitted
            .lock()
            .map(|emitted| emitted.clone())
            .unwrap_or_default()
    }

    pub fn of_type(&self, message_type: &str) -> Vec<Envelope> {
        self.envelopes()
            .into_iter()
            .filter(|envelope| envelope.message_type == message_type)
            .collect()
    }

    pub fn clear(&self) {
        if let Ok(mut emitted) = self.emitted.lock() {
            emitted.clear();
        }
    }
}

impl EnvelopeSink for RecordingSink {
    fn emit(&mut self, envelope: &Envelope) -> Result<(), ProtocolError> {
        self.emitted
            .lock()
            .map_err(|_| ProtocolError::SinkUnavailable("recording sink poisoned".to_string()))?
            .push(envelope.clone());
        Ok(())
    }
}
