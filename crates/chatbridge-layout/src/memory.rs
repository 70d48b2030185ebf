//! In-memory control tree.
//!
//! Used to replay captured layouts and to exercise discovery without a live
//! accessibility session. Parents are held weakly; the root handle owns the
//! tree.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::control::{ControlNode, ControlType};

struct MemoryNode {
    control_type: ControlType,
    name: String,
    children: RefCell<Vec<MemoryControl>>,
    parent: RefCell<Weak<MemoryNode>>,
    native_walk: bool,
    failing_children: bool,
}

#[derive(Clone)]
pub struct MemoryControl(Rc<MemoryNode>);

impl MemoryControl {
    pub fn new(control_type: ControlType, name: impl Into<String>) -> Self {
        Self::build(control_type, name.into(), false, false)
    }

    /// Parses the platform type name (`"ListControl"`, `"PaneControl"`, ...).
    pub fn typed(type_name: &str, name: impl Into<String>) -> Self {
        Self::new(ControlType::from_type_name(type_name), name)
    }

    fn build(control_type: ControlType, name: String, native_walk: bool, failing: bool) -> Self {
        Self(Rc::new(MemoryNode {
            control_type,
            name,
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            native_walk,
            failing_children: failing,
        }))
    }

    /// Attaches `children` and points their parent links at `self`.
    pub fn with_children(self, children: Vec<MemoryControl>) -> Self {
        for child in &children {
            *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        }
        self.0.children.borrow_mut().extend(children);
        self
    }

    /// Rebuilds this node so that it advertises a native bounded walk.
    pub fn with_native_walk(self) -> Self {
        self.rebuild(true, self.0.failing_children)
    }

    /// Rebuilds this node so that enumerating its children fails.
    pub fn with_failing_children(self) -> Self {
        self.rebuild(self.0.native_walk, true)
    }

    fn rebuild(&self, native_walk: bool, failing: bool) -> Self {
        let node = Self::build(self.0.control_type.clone(), self.0.name.clone(), native_walk, failing);
        let children = self.0.children.borrow().clone();
        if let Some(parent) = self.0.parent.borrow().upgrade() {
            *node.0.parent.borrow_mut() = Rc::downgrade(&parent);
        }
        node.with_children(children)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn native_preorder(&self, depth: usize, max_depth: usize, out: &mut Vec<(MemoryControl, usize)>) {
        out.push((self.clone(), depth));
        if depth >= max_depth {
            return;
        }
        for child in self.0.children.borrow().iter() {
            child.native_preorder(depth + 1, max_depth, out);
        }
    }
}

impl ControlNode for MemoryControl {
    fn control_type(&self) -> ControlType {
        self.0.control_type.clone()
    }

    fn name(&self) -> String {
        self.0.name.clone()
    }

    fn children(&self) -> anyhow::Result<Vec<Self>> {
        if self.0.failing_children {
            anyhow::bail!("children unavailable for {}", self.0.control_type.type_name());
        }
        Ok(self.0.children.borrow().clone())
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.borrow().upgrade().map(MemoryControl)
    }

    fn walk_bounded(
        &self,
        max_depth: usize,
    ) -> Option<Box<dyn Iterator<Item = (Self, usize)> + '_>> {
        if !self.0.native_walk {
            return None;
        }
        let mut visited = Vec::new();
        self.native_preorder(0, max_depth, &mut visited);
        Some(Box::new(visited.into_iter()))
    }
}

impl PartialEq for MemoryControl {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for MemoryControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryControl")
            .field("type", &self.0.control_type.type_name())
            .field("name", &self.0.name)
            .field("children", &self.0.children.borrow().len())
            .finish()
    }
}
