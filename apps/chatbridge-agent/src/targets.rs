use std::collections::BTreeSet;

use chatbridge_protocol::ChatKind;
use serde_json::Value;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ListenTarget {
    pub name: String,
    pub kind: ChatKind,
}

/// Normalizes raw `{name, kind}` records from a host command.
///
/// Names are trimmed; empty names and repeats are dropped (first occurrence
/// wins). Unknown or missing kinds fold to `unknown`. At most `max` entries
/// are kept.
pub fn normalize_listen_targets(raw: &[Value], max: usize) -> Vec<ListenTarget> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();
    for record in raw {
        if targets.len() >= max {
            tracing::debug!(max, "listen target list truncated");
            break;
        }
        let Some(target) = normalize_listen_target(record) else {
            continue;
        };
        if seen.insert(target.name.clone()) {
            targets.push(target);
        }
    }
    targets
}

fn normalize_listen_target(record: &Value) -> Option<ListenTarget> {
    let name = record
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    let kind = ChatKind::parse_lenient(record.get("kind").and_then(Value::as_str));
    Some(ListenTarget {
        name: name.to_string(),
        kind,
    })
}
