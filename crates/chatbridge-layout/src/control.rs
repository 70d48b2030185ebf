use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Control type tags the discovery heuristics care about. Everything else is
/// carried through as `Other` with the platform's raw type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlType {
    Window,
    Pane,
    Group,
    List,
    ListItem,
    Table,
    DataGrid,
    Edit,
    Document,
    Button,
    Text,
    Custom,
    Other(String),
}

impl ControlType {
    /// Parses a platform type name such as `ListControl` or `list`.
    pub fn from_type_name(raw: &str) -> Self {
        let trimmed = raw.trim();
        let base = trimmed.strip_suffix("Control").unwrap_or(trimmed);
        match base.to_ascii_lowercase().as_str() {
            "window" => Self::Window,
            "pane" => Self::Pane,
            "group" => Self::Group,
            "list" => Self::List,
            "listitem" => Self::ListItem,
            "table" => Self::Table,
            "datagrid" => Self::DataGrid,
            "edit" => Self::Edit,
            "document" => Self::Document,
            "button" => Self::Button,
            "text" => Self::Text,
            "custom" => Self::Custom,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            Self::Window => "WindowControl",
            Self::Pane => "PaneControl",
            Self::Group => "GroupControl",
            Self::List => "ListControl",
            Self::ListItem => "ListItemControl",
            Self::Table => "TableControl",
            Self::DataGrid => "DataGridControl",
            Self::Edit => "EditControl",
            Self::Document => "DocumentControl",
            Self::Button => "ButtonControl",
            Self::Text => "TextControl",
            Self::Custom => "CustomControl",
            Self::Other(name) => name,
        }
    }
}

/// Role families used by the structural predicates. Newer client builds
/// expose lists as tables/data grids and edits as documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRole {
    List,
    Edit,
    Button,
}

impl ControlRole {
    pub fn matches(self, control_type: &ControlType) -> bool {
        match self {
            Self::List => matches!(
                control_type,
                ControlType::List | ControlType::Table | ControlType::DataGrid
            ),
            Self::Edit => matches!(control_type, ControlType::Edit | ControlType::Document),
            Self::Button => matches!(control_type, ControlType::Button),
        }
    }
}

/// Read-only view of one node in the external accessibility tree.
///
/// Implementations are cheap handles (reference counted or COM pointers);
/// cloning one never copies the subtree. `parent` is a query, not an owning
/// link: callers must not hold on to ancestors beyond one discovery pass.
pub trait ControlNode: Clone {
    fn control_type(&self) -> ControlType;

    fn name(&self) -> String;

    fn children(&self) -> anyhow::Result<Vec<Self>>;

    fn parent(&self) -> Option<Self>;

    /// Native bounded pre-order walk including `self` at depth 0, if the
    /// platform offers one. `None` selects the generic traversal.
    fn walk_bounded(
        &self,
        _max_depth: usize,
    ) -> Option<Box<dyn Iterator<Item = (Self, usize)> + '_>> {
        None
    }
}

/// The control's display name with surrounding whitespace removed.
pub fn control_name<N: ControlNode>(control: &N) -> String {
    control.name().trim().to_string()
}

/// A set of localized control names. Blank entries are discarded, so an
/// empty set never matches anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct NameSet(BTreeSet<String>);

impl NameSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            names
                .into_iter()
                .map(|name| name.as_ref().trim().to_string())
                .filter(|name| !name.is_empty())
                .collect(),
        )
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<Vec<String>> for NameSet {
    fn from(names: Vec<String>) -> Self {
        Self::new(names)
    }
}

impl From<NameSet> for Vec<String> {
    fn from(names: NameSet) -> Self {
        names.0.into_iter().collect()
    }
}
