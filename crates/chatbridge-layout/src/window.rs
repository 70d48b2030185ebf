use std::collections::HashMap;
use std::hash::Hash;

/// A top-level window reported by the platform's window enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowCandidate<H> {
    pub handle: H,
    pub class_name: String,
    pub title: String,
}

impl<H> WindowCandidate<H> {
    pub fn new(handle: H, class_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            handle,
            class_name: class_name.into(),
            title: title.into(),
        }
    }
}

/// What identifies the chat client's main window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppWindowMarkers {
    /// Substrings matched (case-insensitively) against title and class.
    pub markers: Vec<String>,
    pub canonical_executable: String,
    pub canonical_titles: Vec<String>,
}

impl Default for AppWindowMarkers {
    fn default() -> Self {
        Self {
            markers: vec!["微信".to_string(), "WeChat".to_string()],
            canonical_executable: "WeChat.exe".to_string(),
            canonical_titles: vec!["微信".to_string(), "WeChat".to_string()],
        }
    }
}

impl AppWindowMarkers {
    fn matches<H>(&self, candidate: &WindowCandidate<H>) -> bool {
        let title = candidate.title.to_lowercase();
        let class_name = candidate.class_name.to_lowercase();
        self.markers
            .iter()
            .map(|marker| marker.to_lowercase())
            .filter(|marker| !marker.is_empty())
            .any(|marker| title.contains(&marker) || class_name.contains(&marker))
    }
}

/// Final path component, accepting both separator styles.
pub fn executable_basename(path: &str) -> &str {
    path.rsplit(['\\', '/']).next().unwrap_or(path)
}

/// Picks the main window among `windows`.
///
/// Only candidates whose title or class carries a marker are considered.
/// Preference: canonical executable, then canonical title, then any
/// non-empty title, then the first candidate.
pub fn select_main_window<H>(
    windows: &[WindowCandidate<H>],
    executable_by_handle: &HashMap<H, String>,
    markers: &AppWindowMarkers,
) -> Option<H>
where
    H: Clone + Eq + Hash,
{
    let candidates: Vec<&WindowCandidate<H>> = windows
        .iter()
        .filter(|candidate| markers.matches(*candidate))
        .collect();

    candidates
        .iter()
        .find(|candidate| {
            executable_by_handle
                .get(&candidate.handle)
                .is_some_and(|path| {
                    executable_basename(path).eq_ignore_ascii_case(&markers.canonical_executable)
                })
        })
        .or_else(|| {
            candidates.iter().find(|candidate| {
                markers
                    .canonical_titles
                    .iter()
                    .any(|title| candidate.title.trim() == title)
            })
        })
        .or_else(|| candidates.iter().find(|candidate| !candidate.title.trim().is_empty()))
        .or_else(|| candidates.first())
        .map(|candidate| candidate.handle.clone())
}
