//! Layout discovery over an external accessibility tree.
//!
//! The tree itself belongs to the platform accessibility layer; this crate
//! only reads it through the [`ControlNode`] capability trait. Discovery
//! locates three regions of the chat client's main window (navigation bar,
//! session list, chat pane) using labelled lookups first and structural
//! fallbacks after.

mod control;
mod layout;
pub mod memory;
mod scanner;
mod window;

pub use control::{ControlNode, ControlRole, ControlType, NameSet, control_name};
pub use layout::{
    DiscoveryLimits, LayoutLabels, MainControls, discover_main_controls,
    discover_main_controls_with, find_chat_container, find_navigation_container,
    find_session_container, looks_like_chat_container, looks_like_navigation_container,
    looks_like_session_container,
};
pub use scanner::{
    ControlWalk, count_by_type_and_name, count_direct_children_by_type, find_ancestor_with,
    find_first_by_type_and_name, find_first_matching, has_descendant_by_type,
    has_descendant_by_type_and_name, walk_controls,
};
pub use window::{AppWindowMarkers, WindowCandidate, executable_basename, select_main_window};
