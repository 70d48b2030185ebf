//! Session provider built on layout discovery.
//!
//! Platform glue only has to enumerate top-level windows, expose the
//! accessibility root of one, and click a control. Everything else (finding
//! the main window, locating the session list and chat pane, reading
//! message items) is done here through `chatbridge-layout`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;

use anyhow::{Context, Result};
use chatbridge_layout::{
    AppWindowMarkers, ControlNode, ControlRole, ControlType, DiscoveryLimits, LayoutLabels,
    MainControls, NameSet, WindowCandidate, control_name, discover_main_controls_with,
    find_first_by_type_and_name, find_first_matching, select_main_window,
};
use chatbridge_protocol::{ChatKind, ChatSummary};
use serde_json::Value;

use crate::provider::{ChatSessionProvider, IncomingMessage, IncomingSender, SessionHandle};

/// Platform access the layout provider needs.
pub trait DesktopSession {
    type Control: ControlNode;
    type Window: Clone + Debug + Eq + Hash;

    fn windows(&mut self) -> Result<Vec<WindowCandidate<Self::Window>>>;

    /// Executable path per window, where the platform can tell.
    fn executable_paths(&mut self) -> HashMap<Self::Window, String>;

    fn root_control(&mut self, window: &Self::Window) -> Result<Self::Control>;

    fn click(&mut self, control: &Self::Control) -> Result<()>;
}

struct Listener {
    chat_title: String,
    incoming: IncomingSender,
}

pub struct LayoutSessionProvider<D: DesktopSession> {
    desktop: D,
    labels: LayoutLabels,
    markers: AppWindowMarkers,
    limits: DiscoveryLimits,
    listeners: BTreeMap<SessionHandle, Listener>,
    failing: BTreeSet<SessionHandle>,
}

impl<D: DesktopSession> LayoutSessionProvider<D> {
    pub fn new(desktop: D, labels: LayoutLabels) -> Self {
        Self {
            desktop,
            labels,
            markers: AppWindowMarkers::default(),
            limits: DiscoveryLimits::default(),
            listeners: BTreeMap::new(),
            failing: BTreeSet::new(),
        }
    }

    pub fn with_markers(mut self, markers: AppWindowMarkers) -> Self {
        self.markers = markers;
        self
    }

    pub fn desktop(&self) -> &D {
        &self.desktop
    }

    /// Runs a fresh discovery pass. Results are never cached.
    fn discover(&mut self) -> Result<MainControls<D::Control>> {
        let windows = self.desktop.windows().context("failed to enumerate windows")?;
        let paths = self.desktop.executable_paths();
        let window = select_main_window(&windows, &paths, &self.markers)
            .context("chat client main window not found")?;
        let root = self.desktop.root_control(&window)?;
        Ok(discover_main_controls_with(&root, &self.labels, &self.limits))
    }

    fn session_items(&mut self) -> Result<Vec<D::Control>> {
        let session = self
            .discover()?
            .session
            .context("session list not found in chat client layout")?;
        let list = find_list(&session, &self.labels.session_list_names, self.limits.subtree_depth)
            .context("session list not found in chat client layout")?;
        Ok(named_items(&list))
    }

    fn latest_message(&mut self) -> Result<Option<String>> {
        let chat = self
            .discover()?
            .chat
            .context("chat pane not found in chat client layout")?;
        let Some(list) = find_list(&chat, &self.labels.message_list_names, self.limits.subtree_depth)
        else {
            return Ok(None);
        };
        Ok(named_items(&list).last().map(control_name))
    }

    fn open_chat(&mut self, chat_id: &str) -> Result<()> {
        let wanted = chat_id.trim();
        let item = self
            .session_items()?
            .into_iter()
            .find(|item| control_name(item) == wanted)
            .with_context(|| format!("chat {wanted:?} not found in session list"))?;
        self.desktop.click(&item)
    }

    fn forward_latest(&mut self, handle: &SessionHandle, chat_title: &str) -> Result<()> {
        self.open_chat(chat_title)?;
        let Some(text) = self.latest_message()? else {
            return Ok(());
        };
        let message = IncomingMessage::from_raw(handle.clone(), chat_title, &Value::String(text));
        let Some(listener) = self.listeners.get(handle) else {
            return Ok(());
        };
        listener
            .incoming
            .send(message)
            .context("incoming message queue closed")
    }
}

fn find_list<N: ControlNode>(region: &N, names: &NameSet, depth: usize) -> Option<N> {
    find_first_by_type_and_name(region, ControlRole::List, names, depth).or_else(|| {
        find_first_matching(region, depth, |control| {
            ControlRole::List.matches(&control.control_type())
        })
    })
}

fn named_items<N: ControlNode>(list: &N) -> Vec<N> {
    list.children()
        .unwrap_or_default()
        .into_iter()
        .filter(|item| item.control_type() == ControlType::ListItem && !control_name(item).is_empty())
        .collect()
}

impl<D: DesktopSession> ChatSessionProvider for LayoutSessionProvider<D> {
    fn ensure_ready(&mut self) -> Result<()> {
        let controls = self.discover()?;
        if controls.session.is_none() || controls.chat.is_none() {
            anyhow::bail!("chat client layout not recognized");
        }
        Ok(())
    }

    fn add_listener(&mut self, name: &str, incoming: IncomingSender) -> Result<SessionHandle> {
        let known = self
            .session_items()?
            .iter()
            .any(|item| control_name(item) == name);
        if !known {
            anyhow::bail!("chat not found in session list");
        }
        let handle = SessionHandle::new(name);
        self.listeners.insert(
            handle.clone(),
            Listener {
                chat_title: name.to_string(),
                incoming,
            },
        );
        Ok(handle)
    }

    fn remove_listener(&mut self, handle: &SessionHandle) -> Result<()> {
        self.failing.remove(handle);
        self.listeners
            .remove(handle)
            .map(|_| ())
            .with_context(|| format!("no listener for {handle}"))
    }

    fn list_chats(&mut self) -> Result<Vec<ChatSummary>> {
        Ok(self
            .session_items()?
            .iter()
            .map(|item| {
                let title = control_name(item);
                ChatSummary {
                    chat_id: title.clone(),
                    chat_title: title,
                    kind: ChatKind::Unknown,
                }
            })
            .collect())
    }

    fn activate_chat(&mut self, chat_id: &str) -> Result<()> {
        self.open_chat(chat_id)
    }

    /// Opens each listened chat in turn and forwards its newest message.
    ///
    /// A chat that cannot be read is skipped so the others are still polled.
    /// Each failing chat is reported once, until a later poll succeeds.
    fn poll(&mut self) -> Result<()> {
        let listened: Vec<(SessionHandle, String)> = self
            .listeners
            .iter()
            .map(|(handle, listener)| (handle.clone(), listener.chat_title.clone()))
            .collect();
        let mut newly_failed = Vec::new();
        for (handle, chat_title) in listened {
            match self.forward_latest(&handle, &chat_title) {
                Ok(()) => {
                    self.failing.remove(&handle);
                }
                Err(error) => {
                    if self.failing.insert(handle) {
                        tracing::warn!(error = %error, chat = %chat_title, "listened chat unreadable");
                        newly_failed.push(format!("{chat_title}: {error:#}"));
                    } else {
                        tracing::debug!(error = %error, chat = %chat_title, "listened chat still unreadable");
                    }
                }
            }
        }
        if newly_failed.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("{}", newly_failed.join("; "))
        }
    }
}
