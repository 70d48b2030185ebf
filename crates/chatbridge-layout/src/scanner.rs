use crate::control::{ControlNode, ControlRole, NameSet, control_name};

/// Lazy bounded pre-order traversal yielding `(control, depth)` pairs.
///
/// Nodes at exactly `max_depth` are yielded but not expanded. A node whose
/// children cannot be enumerated is treated as a leaf.
pub struct ControlWalk<'a, N: ControlNode> {
    inner: WalkInner<'a, N>,
}

enum WalkInner<'a, N: ControlNode> {
    Native(Box<dyn Iterator<Item = (N, usize)> + 'a>),
    Stack { stack: Vec<(N, usize)>, max_depth: usize },
}

impl<N: ControlNode> Iterator for ControlWalk<'_, N> {
    type Item = (N, usize);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            WalkInner::Native(iter) => iter.next(),
            WalkInner::Stack { stack, max_depth } => {
                let (node, depth) = stack.pop()?;
                if depth < *max_depth {
                    match node.children() {
                        Ok(children) => {
                            stack.extend(children.into_iter().rev().map(|child| (child, depth + 1)));
                        }
                        Err(error) => {
                            tracing::trace!(error = %error, depth, "child enumeration failed; treating as leaf");
                        }
                    }
                }
                Some((node, depth))
            }
        }
    }
}

pub fn walk_controls<N: ControlNode>(root: &N, max_depth: usize) -> ControlWalk<'_, N> {
    let inner = match root.walk_bounded(max_depth) {
        Some(native) => WalkInner::Native(native),
        None => WalkInner::Stack {
            stack: vec![(root.clone(), 0)],
            max_depth,
        },
    };
    ControlWalk { inner }
}

fn matches_type_and_name<N: ControlNode>(control: &N, role: ControlRole, names: &NameSet) -> bool {
    role.matches(&control.control_type()) && names.contains(&control_name(control))
}

pub fn find_first_matching<N, F>(root: &N, max_depth: usize, mut predicate: F) -> Option<N>
where
    N: ControlNode,
    F: FnMut(&N) -> bool,
{
    walk_controls(root, max_depth)
        .map(|(control, _)| control)
        .find(|control| predicate(control))
}

pub fn find_first_by_type_and_name<N: ControlNode>(
    root: &N,
    role: ControlRole,
    names: &NameSet,
    max_depth: usize,
) -> Option<N> {
    if names.is_empty() {
        return None;
    }
    find_first_matching(root, max_depth, |control| {
        matches_type_and_name(control, role, names)
    })
}

pub fn count_by_type_and_name<N: ControlNode>(
    root: &N,
    role: ControlRole,
    names: &NameSet,
    max_depth: usize,
) -> usize {
    if names.is_empty() {
        return 0;
    }
    walk_controls(root, max_depth)
        .filter(|(control, _)| matches_type_and_name(control, role, names))
        .count()
}

pub fn has_descendant_by_type<N: ControlNode>(root: &N, role: ControlRole, max_depth: usize) -> bool {
    walk_controls(root, max_depth).any(|(control, _)| role.matches(&control.control_type()))
}

pub fn has_descendant_by_type_and_name<N: ControlNode>(
    root: &N,
    role: ControlRole,
    names: &NameSet,
    max_depth: usize,
) -> bool {
    if names.is_empty() {
        return false;
    }
    walk_controls(root, max_depth).any(|(control, _)| matches_type_and_name(&control, role, names))
}

/// Number of immediate children of `control` with the given role.
pub fn count_direct_children_by_type<N: ControlNode>(control: &N, role: ControlRole) -> usize {
    control
        .children()
        .map(|children| {
            children
                .iter()
                .filter(|child| role.matches(&child.control_type()))
                .count()
        })
        .unwrap_or(0)
}

/// Walks from `control` towards the root, testing `control` itself first,
/// and returns the nearest node satisfying `predicate` within `max_levels`
/// steps.
pub fn find_ancestor_with<N, F>(control: &N, max_levels: usize, mut predicate: F) -> Option<N>
where
    N: ControlNode,
    F: FnMut(&N) -> bool,
{
    let mut current = Some(control.clone());
    let mut steps = 0;
    while let Some(node) = current {
        if steps >= max_levels {
            break;
        }
        if predicate(&node) {
            return Some(node);
        }
        current = node.parent();
        steps += 1;
    }
    None
}
