//! The component tree and its id-addressed operations.
//!
//! # Mutation model
//!
//! All mutation operations are pure: they take `&self` and return a new
//! tree value inside a [`Splice`], leaving the original untouched so callers
//! can hold the previous tree for diffing or undo. None of them raises —
//! when the target id is absent the operation degrades to appending at the
//! root ("never drop generated content"), and the degradation is observable
//! through [`SpliceTarget::RootFallback`] so logging and retries can react.
//!
//! # Structure
//!
//! ```text
//! ComponentTree
//! └── roots: Vec<ChildNode>
//!     ├── Component { id, kind, attributes, children: Vec<ChildNode> }
//!     ├── Text (no identity — skipped by id addressing)
//!     └── Placeholder { id, generation_template, trigger_rendering, trigger_kind }
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use burgeon_types::{ChildNode, ComponentNode, NodeId};

use crate::error::TreeError;
use crate::Result;

/// Maximum expected tree depth. Traversal code uses this as a circuit breaker.
///
/// Real component trees rarely nest past a few dozen levels; exceeding 128
/// likely indicates a cycle introduced by a malformed generated fragment.
pub const MAX_TREE_DEPTH: usize = 128;

/// Where a splice actually landed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpliceTarget {
    /// The target id was found; the operation applied at its position.
    InPlace,
    /// The target id was absent; content was appended at the root instead.
    RootFallback,
}

impl SpliceTarget {
    /// Whether the operation degraded to the root-append fallback.
    pub fn is_fallback(&self) -> bool {
        matches!(self, SpliceTarget::RootFallback)
    }
}

/// A mutation result: the new tree plus where the splice landed.
#[derive(Clone, Debug, PartialEq)]
pub struct Splice {
    pub tree: ComponentTree,
    pub target: SpliceTarget,
}

/// The edit to apply at the target position.
enum Edit<'a> {
    Replace(&'a [ChildNode]),
    InsertAfter(&'a ChildNode),
    InsertBefore(&'a ChildNode),
    AppendChild(&'a ChildNode),
}

/// An ordered forest of component nodes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentTree {
    roots: Vec<ChildNode>,
}

impl ComponentTree {
    /// An empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from root children.
    pub fn from_roots(roots: Vec<ChildNode>) -> Self {
        Self { roots }
    }

    /// The root children, in document order.
    pub fn roots(&self) -> &[ChildNode] {
        &self.roots
    }

    /// Whether the tree has no children at all.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Total component/placeholder node count (text children count as zero).
    pub fn node_count(&self) -> usize {
        self.roots.iter().map(ChildNode::node_count).sum()
    }

    /// Serialize the whole tree to a JSON value (for Full-tier snapshots).
    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.roots).unwrap_or(serde_json::Value::Null)
    }

    // =========================================================================
    // Read operations
    // =========================================================================

    /// Find the child (component or placeholder) with the given id.
    pub fn find_by_id(&self, id: &NodeId) -> Option<&ChildNode> {
        find_in(&self.roots, id, 0)
    }

    /// Whether a node with the given id exists.
    pub fn contains(&self, id: &NodeId) -> bool {
        self.find_by_id(id).is_some()
    }

    /// All node ids in document order.
    pub fn ids(&self) -> Vec<&NodeId> {
        let mut out = Vec::new();
        collect_ids(&self.roots, &mut out);
        out
    }

    /// The component node that directly contains `id`, or `None` for roots
    /// and absent ids.
    pub fn parent_of(&self, id: &NodeId) -> Option<&ComponentNode> {
        self.ancestors_of(id).into_iter().next()
    }

    /// Sibling component nodes of `id` (same parent, self excluded,
    /// placeholders and text skipped). Root nodes are siblings of each other.
    pub fn siblings_of(&self, id: &NodeId) -> Vec<&ComponentNode> {
        let children = match self.parent_of(id) {
            Some(parent) => &parent.children,
            None if self.contains(id) => &self.roots,
            None => return Vec::new(),
        };
        children
            .iter()
            .filter_map(ChildNode::as_component)
            .filter(|n| &n.id != id)
            .collect()
    }

    /// Ancestor component nodes of `id`, nearest first. Empty for roots.
    pub fn ancestors_of(&self, id: &NodeId) -> Vec<&ComponentNode> {
        let mut stack = Vec::new();
        if path_to(&self.roots, id, &mut stack, 0) {
            stack.reverse();
            stack
        } else {
            Vec::new()
        }
    }

    /// Check structural invariants: unique ids and bounded depth.
    pub fn validate(&self) -> Result<()> {
        let mut seen: HashSet<&NodeId> = HashSet::new();
        for id in self.ids() {
            if !seen.insert(id) {
                return Err(TreeError::DuplicateId(id.clone()));
            }
        }
        if let Some(depth) = depth_over(&self.roots, 0) {
            return Err(TreeError::DepthExceeded {
                depth,
                max: MAX_TREE_DEPTH,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Mutation operations (pure — return a new tree)
    // =========================================================================

    /// Replace the node with `id` by zero or more nodes, preserving position.
    ///
    /// If `id` is absent, the replacement nodes are appended at the root and
    /// the splice reports [`SpliceTarget::RootFallback`].
    pub fn replace(&self, id: &NodeId, replacement: Vec<ChildNode>) -> Splice {
        self.edit(id, Edit::Replace(&replacement), replacement.clone())
    }

    /// Insert `node` immediately after the node with `id`, same parent.
    pub fn insert_after(&self, id: &NodeId, node: ChildNode) -> Splice {
        self.edit(id, Edit::InsertAfter(&node), vec![node.clone()])
    }

    /// Insert `node` immediately before the node with `id`, same parent.
    pub fn insert_before(&self, id: &NodeId, node: ChildNode) -> Splice {
        self.edit(id, Edit::InsertBefore(&node), vec![node.clone()])
    }

    /// Append `node` as the last child of the component with `id`.
    ///
    /// Placeholders and text cannot hold children, so targeting one degrades
    /// to the root-append fallback like an absent id.
    pub fn append_child(&self, id: &NodeId, node: ChildNode) -> Splice {
        self.edit(id, Edit::AppendChild(&node), vec![node.clone()])
    }

    /// Apply `edit` at the target, or append `fallback` at the root.
    fn edit(&self, id: &NodeId, edit: Edit<'_>, fallback: Vec<ChildNode>) -> Splice {
        let (mut roots, found) = apply_edit(&self.roots, id, &edit, 0);
        if found {
            Splice {
                tree: ComponentTree { roots },
                target: SpliceTarget::InPlace,
            }
        } else {
            tracing::warn!(target_id = %id, "splice target not found, appending at root");
            roots.extend(fallback);
            Splice {
                tree: ComponentTree { roots },
                target: SpliceTarget::RootFallback,
            }
        }
    }
}

/// Rebuild `children` with `edit` applied at the node matching `id`.
///
/// Returns the rebuilt list and whether the target was found. The rebuild
/// clones along every path but applies the edit at most once (leftmost match
/// in document order — ids are unique by invariant anyway).
fn apply_edit(
    children: &[ChildNode],
    id: &NodeId,
    edit: &Edit<'_>,
    depth: usize,
) -> (Vec<ChildNode>, bool) {
    if depth >= MAX_TREE_DEPTH {
        return (children.to_vec(), false);
    }

    let mut out = Vec::with_capacity(children.len() + 1);
    let mut found = false;

    for child in children {
        if !found && child.id() == Some(id) {
            match edit {
                Edit::Replace(replacement) => {
                    out.extend(replacement.iter().cloned());
                }
                Edit::InsertAfter(node) => {
                    out.push(child.clone());
                    out.push((*node).clone());
                }
                Edit::InsertBefore(node) => {
                    out.push((*node).clone());
                    out.push(child.clone());
                }
                Edit::AppendChild(node) => match child {
                    ChildNode::Component(c) => {
                        let mut c = c.clone();
                        c.children.push((*node).clone());
                        out.push(ChildNode::Component(c));
                    }
                    // Placeholders and text cannot hold children.
                    other => {
                        out.push(other.clone());
                        continue;
                    }
                },
            }
            found = true;
            continue;
        }

        match child {
            ChildNode::Component(c) if !found => {
                let (new_children, hit) = apply_edit(&c.children, id, edit, depth + 1);
                if hit {
                    let mut c = c.clone();
                    c.children = new_children;
                    out.push(ChildNode::Component(c));
                    found = true;
                } else {
                    out.push(child.clone());
                }
            }
            other => out.push(other.clone()),
        }
    }

    (out, found)
}

fn find_in<'a>(children: &'a [ChildNode], id: &NodeId, depth: usize) -> Option<&'a ChildNode> {
    if depth >= MAX_TREE_DEPTH {
        return None;
    }
    for child in children {
        if child.id() == Some(id) {
            return Some(child);
        }
        if let ChildNode::Component(c) = child {
            if let Some(hit) = find_in(&c.children, id, depth + 1) {
                return Some(hit);
            }
        }
    }
    None
}

fn collect_ids<'a>(children: &'a [ChildNode], out: &mut Vec<&'a NodeId>) {
    for child in children {
        match child {
            ChildNode::Component(c) => c.collect_ids(out),
            ChildNode::Placeholder(p) => out.push(&p.id),
            ChildNode::Text(_) => {}
        }
    }
}

/// Depth-first search for `id`, pushing visited component ancestors onto
/// `stack`. On success the stack holds the ancestor path, outermost first.
fn path_to<'a>(
    children: &'a [ChildNode],
    id: &NodeId,
    stack: &mut Vec<&'a ComponentNode>,
    depth: usize,
) -> bool {
    if depth >= MAX_TREE_DEPTH {
        return false;
    }
    for child in children {
        if child.id() == Some(id) {
            return true;
        }
        if let ChildNode::Component(c) = child {
            stack.push(c);
            if path_to(&c.children, id, stack, depth + 1) {
                return true;
            }
            stack.pop();
        }
    }
    false
}

/// If any path exceeds [`MAX_TREE_DEPTH`], return the offending depth.
fn depth_over(children: &[ChildNode], depth: usize) -> Option<usize> {
    if depth > MAX_TREE_DEPTH {
        return Some(depth);
    }
    for child in children {
        if let ChildNode::Component(c) = child {
            if let Some(d) = depth_over(&c.children, depth + 1) {
                return Some(d);
            }
        }
    }
    None
}

// ============================================================================
// Tests
// ============================================================================
