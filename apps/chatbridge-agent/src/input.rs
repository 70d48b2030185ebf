//! Text injection through the system clipboard.

use anyhow::{Context, Result};
use chatbridge_protocol::{DeliveryTracker, ErrorCode, InputResultPayload};

use crate::events::{emit_error, emit_input_result};
use crate::provider::ChatSessionProvider;

pub trait Clipboard {
    fn get_text(&mut self) -> Result<String>;
    fn set_text(&mut self, text: &str) -> Result<()>;
}

/// Sends the platform paste chord to the focused window.
pub trait KeystrokeInjector {
    fn paste(&mut self) -> Result<()>;
}

/// System clipboard via `arboard`, opened on first use.
#[derive(Default)]
pub struct ArboardClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ArboardClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn clipboard(&mut self) -> Result<&mut arboard::Clipboard> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new().context("failed to open system clipboard")?);
        }
        self.inner.as_mut().context("system clipboard unavailable")
    }
}

impl Clipboard for ArboardClipboard {
    fn get_text(&mut self) -> Result<String> {
        self.clipboard()?
            .get_text()
            .context("failed to read clipboard text")
    }

    fn set_text(&mut self, text: &str) -> Result<()> {
        self.clipboard()?
            .set_text(text.to_string())
            .context("failed to write clipboard text")
    }
}

/// Injector for hosts without a keystroke backend.
#[derive(Clone, Debug)]
pub struct UnavailableKeystrokeInjector {
    reason: String,
}

impl UnavailableKeystrokeInjector {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl KeystrokeInjector for UnavailableKeystrokeInjector {
    fn paste(&mut self) -> Result<()> {
        anyhow::bail!("{}", self.reason)
    }
}

/// Holds the clipboard for one injection and puts the previous text back
/// when dropped, on every exit path. Restore failures are swallowed.
pub struct ClipboardGuard<'a> {
    clipboard: &'a mut dyn Clipboard,
    previous: Option<String>,
}

impl<'a> ClipboardGuard<'a> {
    pub fn acquire(clipboard: &'a mut dyn Clipboard, restore: bool) -> Self {
        let previous = if restore {
            match clipboard.get_text() {
                Ok(text) => Some(text),
                Err(error) => {
                    tracing::debug!(error = %error, "clipboard snapshot failed; nothing to restore");
                    None
                }
            }
        } else {
            None
        };
        Self {
            clipboard,
            previous,
        }
    }

    pub fn paste_text(&mut self, text: &str, keystrokes: &mut dyn KeystrokeInjector) -> Result<()> {
        self.clipboard.set_text(text)?;
        keystrokes.paste()
    }
}

impl Drop for ClipboardGuard<'_> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            if let Err(error) = self.clipboard.set_text(&previous) {
                tracing::debug!(error = %error, "clipboard restore failed; ignoring");
            }
        }
    }
}

/// Collaborators used by `input.write`.
pub struct InputDriver {
    pub clipboard: Box<dyn Clipboard>,
    pub keystrokes: Box<dyn KeystrokeInjector>,
}

impl InputDriver {
    pub fn new(clipboard: Box<dyn Clipboard>, keystrokes: Box<dyn KeystrokeInjector>) -> Self {
        Self {
            clipboard,
            keystrokes,
        }
    }
}

/// Pastes `text` into `chat_id` and reports the outcome once via
/// `input.result`.
pub fn write_input(
    provider: &mut dyn ChatSessionProvider,
    driver: &mut InputDriver,
    tracker: &mut DeliveryTracker,
    chat_id: &str,
    text: &str,
    restore_clipboard: bool,
) -> InputResultPayload {
    if let Err(error) = provider.ensure_ready() {
        let message = error.to_string();
        emit_error(tracker, ErrorCode::WriteFailed, message.clone());
        let result = InputResultPayload::failure(message);
        emit_input_result(tracker, &result);
        return result;
    }

    if let Err(error) = provider.activate_chat(chat_id) {
        tracing::debug!(error = %error, chat = chat_id, "chat activation failed; pasting into current chat");
    }

    let pasted = {
        let mut guard = ClipboardGuard::acquire(driver.clipboard.as_mut(), restore_clipboard);
        guard.paste_text(text, driver.keystrokes.as_mut())
    };

    let result = match pasted {
        Ok(()) => InputResultPayload::success(),
        Err(error) => {
            tracing::warn!(error = %error, chat = chat_id, "text injection failed");
            InputResultPayload::failure(format!("{error:#}"))
        }
    };
    emit_input_result(tracker, &result);
    result
}
