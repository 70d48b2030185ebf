use std::collections::BTreeMap;

use chatbridge_protocol::{DeliveryTracker, ErrorCode};

use crate::events::emit_error;
use crate::provider::{ChatSessionProvider, IncomingSender};
use crate::state::AgentState;
use crate::targets::ListenTarget;

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

/// Replaces the desired target set. Active listeners are left alone until
/// the next reconciliation.
pub fn replace_listen_targets(state: &mut AgentState, targets: Vec<ListenTarget>) {
    state.listen_targets = targets
        .into_iter()
        .map(|target| (target.name, target.kind))
        .collect::<BTreeMap<_, _>>();
}

/// Converges active listeners toward the desired set.
///
/// Listeners no longer desired are removed (removal errors are ignored).
/// With `allow_add`, every desired target not yet active is requested from
/// the provider; a failure is reported as `LISTEN_TARGET_FAILED` and the
/// remaining targets are still tried. Re-applying an unchanged desired set
/// makes no provider calls.
pub fn reconcile_listeners(
    state: &mut AgentState,
    provider: &mut dyn ChatSessionProvider,
    incoming: &IncomingSender,
    tracker: &mut DeliveryTracker,
    allow_add: bool,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    let stale: Vec<String> = state
        .active_targets
        .keys()
        .filter(|name| !state.listen_targets.contains_key(*name))
        .cloned()
        .collect();
    for name in stale {
        if let Some(handle) = state.forget_active(&name) {
            if let Err(error) = provider.remove_listener(&handle) {
                tracing::debug!(error = %error, chat = %name, "listener removal failed; ignoring");
            }
        }
        report.removed.push(name);
    }

    if !allow_add {
        return report;
    }

    let desired: Vec<(String, _)> = state
        .listen_targets
        .iter()
        .map(|(name, kind)| (name.clone(), *kind))
        .collect();
    for (name, kind) in desired {
        if let Some(handle) = state.active_targets.get(&name) {
            state.active_kinds.insert(handle.clone(), kind);
            continue;
        }
        match provider.add_listener(&name, incoming.clone()) {
            Ok(handle) => {
                tracing::info!(chat = %name, handle = %handle, kind = kind.label(), "listening to chat");
                state.active_kinds.insert(handle.clone(), kind);
                state.active_targets.insert(name.clone(), handle);
                report.added.push(name);
            }
            Err(error) => {
                emit_error(tracker, ErrorCode::ListenTargetFailed, format!("{name}: {error}"));
                report.failed.push(name);
            }
        }
    }
    report
}

/// Removes every active listener, best-effort.
pub fn remove_all_listeners(state: &mut AgentState, provider: &mut dyn ChatSessionProvider) {
    let names: Vec<String> = state.active_targets.keys().cloned().collect();
    for name in names {
        if let Some(handle) = state.forget_active(&name) {
            if let Err(error) = provider.remove_listener(&handle) {
                tracing::debug!(error = %error, chat = %name, "listener removal failed; ignoring");
            }
        }
    }
}
