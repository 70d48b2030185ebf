use chatbridge_layout::memory::MemoryControl;
use chatbridge_layout::{
    LayoutLabels, NameSet, discover_main_controls, find_chat_container,
    find_navigation_container, find_session_container, looks_like_session_container,
};

fn control(type_name: &str, name: &str) -> MemoryControl {
    MemoryControl::typed(type_name, name)
}

fn pane(children: Vec<MemoryControl>) -> MemoryControl {
    control("PaneControl", "").with_children(children)
}

fn window(children: Vec<MemoryControl>) -> MemoryControl {
    control("WindowControl", "微信").with_children(children)
}

fn navigation_bar() -> MemoryControl {
    pane(vec![
        control("ButtonControl", "聊天"),
        control("ButtonControl", "通讯录"),
        control("ButtonControl", "收藏"),
    ])
}

fn sparse_labels() -> LayoutLabels {
    LayoutLabels {
        session_list_names: NameSet::new(["会话"]),
        session_search_names: NameSet::new(["搜索"]),
        message_list_names: NameSet::new(["消息"]),
        send_button_names: NameSet::new(["发送"]),
        navigation_button_names: NameSet::new(["聊天", "通讯录"]),
    }
}

#[test]
fn discovers_all_regions_from_labelled_tree() {
    let navigation = navigation_bar();
    let session = pane(vec![
        control("EditControl", "搜索"),
        control("ListControl", "会话"),
    ]);
    let chat = pane(vec![
        control("ListControl", "消息"),
        control("EditControl", ""),
        control("ButtonControl", "发送(S)"),
    ]);
    let root = window(vec![navigation.clone(), session.clone(), chat.clone()]);

    let controls = discover_main_controls(&root, &LayoutLabels::default());

    assert!(controls.is_complete());
    assert_eq!(controls.navigation, Some(navigation));
    assert_eq!(controls.session, Some(session));
    assert_eq!(controls.chat, Some(chat));
}

#[test]
fn chat_resolves_from_send_button_without_message_list() {
    let chat = pane(vec![control("EditControl", ""), control("ButtonControl", "发送")]);
    let root = window(vec![
        navigation_bar(),
        pane(vec![control("EditControl", "搜索"), control("ListControl", "会话")]),
        chat.clone(),
    ]);
    let labels = LayoutLabels {
        message_list_names: NameSet::new(["不存在"]),
        ..LayoutLabels::default()
    };

    let controls = discover_main_controls(&root, &labels);
    assert_eq!(controls.chat, Some(chat));
}

#[test]
fn accepts_table_data_grid_and_document_controls() {
    let navigation = navigation_bar();
    let session = pane(vec![
        control("DocumentControl", "搜索"),
        control("TableControl", "会话"),
    ]);
    let chat = pane(vec![
        control("DataGridControl", "消息"),
        control("DocumentControl", ""),
        control("ButtonControl", "发送"),
    ]);
    let root = window(vec![navigation.clone(), session.clone(), chat.clone()]);

    let controls = discover_main_controls(&root, &LayoutLabels::default());
    assert_eq!(controls.navigation, Some(navigation));
    assert_eq!(controls.session, Some(session));
    assert_eq!(controls.chat, Some(chat));
}

#[test]
fn session_resolves_to_nearest_ancestor_holding_both_anchors() {
    let session = pane(vec![
        control("EditControl", "搜索"),
        pane(vec![pane(vec![control("ListControl", "会话")])]),
    ]);
    let root = window(vec![pane(vec![session.clone()])]);

    assert_eq!(
        find_session_container(&root, &LayoutLabels::default(), 14),
        Some(session)
    );
}

#[test]
fn session_resolves_from_search_box_when_first_list_is_stranded() {
    // The first labelled list in pre-order sits thirteen levels down with no
    // search box anywhere within ten ancestors.
    let mut stranded = control("ListControl", "会话");
    for _ in 0..12 {
        stranded = pane(vec![stranded]);
    }
    let session = pane(vec![
        control("EditControl", "搜索"),
        control("ListControl", "会话"),
    ]);
    let root = window(vec![stranded, session.clone()]);
    let labels = LayoutLabels::default();

    // A full scan alone would settle on the window itself.
    assert!(looks_like_session_container(&root, &labels));
    assert_eq!(find_session_container(&root, &labels, 14), Some(session));
}

#[test]
fn navigation_resolves_by_walking_up_from_one_button() {
    let navigation = navigation_bar();
    let root = window(vec![pane(vec![pane(vec![navigation.clone()])])]);

    assert_eq!(
        find_navigation_container(&root, &LayoutLabels::default(), 14),
        Some(navigation)
    );
}

#[test]
fn pane_with_send_button_is_not_a_session_container() {
    let mixed = pane(vec![
        control("EditControl", "搜索"),
        control("ListControl", "会话"),
        control("ButtonControl", "发送"),
    ]);
    let labels = LayoutLabels::default();
    assert!(!looks_like_session_container(&mixed, &labels));

    let root = window(vec![mixed]);
    assert_eq!(find_session_container(&root, &labels, 14), None);
}

#[test]
fn unlabelled_navigation_falls_back_to_button_count() {
    let navigation = pane(vec![
        control("ButtonControl", ""),
        control("ButtonControl", ""),
        control("ButtonControl", ""),
    ]);
    let session = pane(vec![control("EditControl", "搜索"), control("ListControl", "")]);
    let chat = pane(vec![control("EditControl", ""), control("ButtonControl", "发送")]);
    let root = window(vec![navigation.clone(), session, chat]);

    assert_eq!(
        find_navigation_container(&root, &sparse_labels(), 6),
        Some(navigation)
    );
}

#[test]
fn unlabelled_session_list_falls_back_to_list_type() {
    let session = pane(vec![control("EditControl", "搜索"), control("ListControl", "")]);
    let root = window(vec![session.clone()]);

    assert_eq!(find_session_container(&root, &sparse_labels(), 6), Some(session));
}

#[test]
fn empty_tree_yields_no_regions() {
    let root = window(Vec::new());
    let labels = LayoutLabels::default();
    let controls = discover_main_controls(&root, &labels);

    assert!(!controls.is_complete());
    assert!(controls.navigation.is_none());
    assert!(controls.session.is_none());
    assert_eq!(find_chat_container(&root, &labels, 14), None);
}
