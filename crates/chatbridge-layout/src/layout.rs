use serde::{Deserialize, Serialize};

use crate::control::{ControlNode, ControlRole, NameSet};
use crate::scanner::{
    count_by_type_and_name, count_direct_children_by_type, find_ancestor_with,
    find_first_by_type_and_name, find_first_matching, has_descendant_by_type,
    has_descendant_by_type_and_name,
};

/// Localized control names used to anchor discovery.
///
/// Deserialized from TOML; missing keys keep the stock Chinese client labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutLabels {
    pub session_list_names: NameSet,
    pub session_search_names: NameSet,
    pub message_list_names: NameSet,
    pub send_button_names: NameSet,
    pub navigation_button_names: NameSet,
}

impl Default for LayoutLabels {
    fn default() -> Self {
        Self {
            session_list_names: NameSet::new(["会话", "折叠的群聊"]),
            session_search_names: NameSet::new(["搜索"]),
            message_list_names: NameSet::new(["消息", "聊天记录"]),
            send_button_names: NameSet::new(["发送", "发送(S)"]),
            navigation_button_names: NameSet::new(["聊天", "通讯录", "收藏"]),
        }
    }
}

/// Depth and count bounds for one discovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryLimits {
    /// Bound for scans that start at the window root.
    pub full_scan_depth: usize,
    /// Bound for structural checks inside a candidate region.
    pub subtree_depth: usize,
    pub ancestor_levels: usize,
    pub min_navigation_buttons: usize,
}

impl Default for DiscoveryLimits {
    fn default() -> Self {
        Self {
            full_scan_depth: 14,
            subtree_depth: 6,
            ancestor_levels: 10,
            min_navigation_buttons: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MainControls<N> {
    pub navigation: Option<N>,
    pub session: Option<N>,
    pub chat: Option<N>,
}

impl<N> MainControls<N> {
    pub fn is_complete(&self) -> bool {
        self.navigation.is_some() && self.session.is_some() && self.chat.is_some()
    }
}

pub fn discover_main_controls<N: ControlNode>(root: &N, labels: &LayoutLabels) -> MainControls<N> {
    discover_main_controls_with(root, labels, &DiscoveryLimits::default())
}

pub fn discover_main_controls_with<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    limits: &DiscoveryLimits,
) -> MainControls<N> {
    let controls = MainControls {
        session: session_container(root, labels, limits),
        chat: chat_container(root, labels, limits),
        navigation: navigation_container(root, labels, limits),
    };
    tracing::debug!(
        navigation = controls.navigation.is_some(),
        session = controls.session.is_some(),
        chat = controls.chat.is_some(),
        "layout discovery finished"
    );
    controls
}

pub fn find_session_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    max_depth: usize,
) -> Option<N> {
    session_container(root, labels, &limits_with_depth(max_depth))
}

pub fn find_chat_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    max_depth: usize,
) -> Option<N> {
    chat_container(root, labels, &limits_with_depth(max_depth))
}

pub fn find_navigation_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    max_depth: usize,
) -> Option<N> {
    navigation_container(root, labels, &limits_with_depth(max_depth))
}

/// Has a labelled search box and a labelled session list, and no labelled
/// send button.
pub fn looks_like_session_container<N: ControlNode>(control: &N, labels: &LayoutLabels) -> bool {
    is_session_container(control, labels, DiscoveryLimits::default().subtree_depth)
}

/// Has an edit box and either a labelled message list or a labelled send
/// button.
pub fn looks_like_chat_container<N: ControlNode>(control: &N, labels: &LayoutLabels) -> bool {
    is_chat_container(control, labels, DiscoveryLimits::default().subtree_depth)
}

pub fn looks_like_navigation_container<N: ControlNode>(control: &N, labels: &LayoutLabels) -> bool {
    is_navigation_container(control, labels, &DiscoveryLimits::default())
}

fn limits_with_depth(max_depth: usize) -> DiscoveryLimits {
    DiscoveryLimits {
        full_scan_depth: max_depth,
        ..DiscoveryLimits::default()
    }
}

fn has_send_button<N: ControlNode>(control: &N, labels: &LayoutLabels, depth: usize) -> bool {
    has_descendant_by_type_and_name(control, ControlRole::Button, &labels.send_button_names, depth)
}

fn is_session_container<N: ControlNode>(control: &N, labels: &LayoutLabels, depth: usize) -> bool {
    has_descendant_by_type_and_name(control, ControlRole::Edit, &labels.session_search_names, depth)
        && has_descendant_by_type_and_name(control, ControlRole::List, &labels.session_list_names, depth)
        && !has_send_button(control, labels, depth)
}

fn is_chat_container<N: ControlNode>(control: &N, labels: &LayoutLabels, depth: usize) -> bool {
    has_descendant_by_type(control, ControlRole::Edit, depth)
        && (has_descendant_by_type_and_name(control, ControlRole::List, &labels.message_list_names, depth)
            || has_send_button(control, labels, depth))
}

fn is_navigation_container<N: ControlNode>(
    control: &N,
    labels: &LayoutLabels,
    limits: &DiscoveryLimits,
) -> bool {
    count_by_type_and_name(
        control,
        ControlRole::Button,
        &labels.navigation_button_names,
        limits.subtree_depth,
    ) >= limits.min_navigation_buttons
}

fn session_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    limits: &DiscoveryLimits,
) -> Option<N> {
    let looks = |control: &N| is_session_container(control, labels, limits.subtree_depth);
    let search_box = || {
        find_first_by_type_and_name(
            root,
            ControlRole::Edit,
            &labels.session_search_names,
            limits.full_scan_depth,
        )
    };

    let found = find_first_by_type_and_name(
        root,
        ControlRole::List,
        &labels.session_list_names,
        limits.full_scan_depth,
    )
    .and_then(|list| find_ancestor_with(&list, limits.ancestor_levels, looks))
    .or_else(|| search_box().and_then(|search| find_ancestor_with(&search, limits.ancestor_levels, looks)))
    .or_else(|| find_first_matching(root, limits.full_scan_depth, looks));
    if found.is_some() {
        return found;
    }

    // Unlabelled session lists: nearest pane above the search box holding any list.
    let relaxed = search_box().and_then(|search| {
        find_ancestor_with(&search, limits.ancestor_levels, |control| {
            has_descendant_by_type(control, ControlRole::List, limits.subtree_depth)
                && !has_send_button(control, labels, limits.subtree_depth)
        })
    });
    if relaxed.is_some() {
        tracing::debug!("session region resolved by relaxed search-box tier");
    }
    relaxed
}

fn chat_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    limits: &DiscoveryLimits,
) -> Option<N> {
    let looks = |control: &N| is_chat_container(control, labels, limits.subtree_depth);

    find_first_by_type_and_name(
        root,
        ControlRole::List,
        &labels.message_list_names,
        limits.full_scan_depth,
    )
    .and_then(|list| find_ancestor_with(&list, limits.ancestor_levels, looks))
    .or_else(|| {
        find_first_by_type_and_name(
            root,
            ControlRole::Button,
            &labels.send_button_names,
            limits.full_scan_depth,
        )
        .and_then(|button| find_ancestor_with(&button, limits.ancestor_levels, looks))
    })
    .or_else(|| find_first_matching(root, limits.full_scan_depth, looks))
}

fn navigation_container<N: ControlNode>(
    root: &N,
    labels: &LayoutLabels,
    limits: &DiscoveryLimits,
) -> Option<N> {
    let looks = |control: &N| is_navigation_container(control, labels, limits);

    find_first_by_type_and_name(
        root,
        ControlRole::Button,
        &labels.navigation_button_names,
        limits.full_scan_depth,
    )
    .and_then(|button| {
        find_ancestor_with(&button, limits.ancestor_levels, looks).or_else(|| button.parent())
    })
    .or_else(|| find_first_matching(root, limits.full_scan_depth, looks))
    .or_else(|| {
        find_first_matching(root, limits.full_scan_depth, |control| {
            count_direct_children_by_type(control, ControlRole::Button)
                >= limits.min_navigation_buttons
        })
    })
}
