//! The placement engine: applying fragments to a tree under a rule.
//!
//! Placement is pure — it maps an input tree plus fragments to either a new
//! tree or a modal side-channel value. The engine publishes the result
//! atomically, so mid-placement state is never observable.

use burgeon_tree::{ComponentTree, SpliceTarget};
use burgeon_types::{ComponentNode, PlacementKind, PlacementRule};

/// Where placed fragments ended up.
#[derive(Clone, Debug, PartialEq)]
pub enum Placement {
    /// The tree was edited; `target` reports whether the rule's target was
    /// found or the edit fell back to a root append.
    Tree {
        tree: ComponentTree,
        target: SpliceTarget,
    },
    /// Modal placement never touches the tree; the fragments come back for
    /// the renderer to overlay.
    Modal { fragments: Vec<ComponentNode> },
}

impl Placement {
    /// The splice target for tree placements; `None` for modal.
    pub fn splice_target(&self) -> Option<SpliceTarget> {
        match self {
            Placement::Tree { target, .. } => Some(*target),
            Placement::Modal { .. } => None,
        }
    }
}

/// Apply `fragments` to `tree` under `rule`.
///
/// Multi-fragment placements keep the fragment order: `after` chains each
/// fragment behind the previous one, `before` stacks them all ahead of the
/// target, `append_child` appends them in sequence. The reported target
/// reflects the first splice — later splices anchor on freshly inserted
/// ids and cannot miss.
pub fn place(tree: &ComponentTree, fragments: Vec<ComponentNode>, rule: &PlacementRule) -> Placement {
    match rule.kind {
        PlacementKind::Modal => Placement::Modal { fragments },
        PlacementKind::Replace => {
            let splice = tree.replace(
                &rule.target,
                fragments.into_iter().map(Into::into).collect(),
            );
            Placement::Tree {
                tree: splice.tree,
                target: splice.target,
            }
        }
        PlacementKind::After => {
            let mut current = tree.clone();
            let mut anchor = rule.target.clone();
            let mut target = SpliceTarget::InPlace;
            for (i, fragment) in fragments.into_iter().enumerate() {
                let next_anchor = fragment.id.clone();
                let splice = current.insert_after(&anchor, fragment.into());
                if i == 0 {
                    target = splice.target;
                }
                current = splice.tree;
                anchor = next_anchor;
            }
            Placement::Tree {
                tree: current,
                target,
            }
        }
        PlacementKind::Before => {
            let mut current = tree.clone();
            let mut target = SpliceTarget::InPlace;
            for (i, fragment) in fragments.into_iter().enumerate() {
                let splice = current.insert_before(&rule.target, fragment.into());
                if i == 0 {
                    target = splice.target;
                }
                current = splice.tree;
            }
            Placement::Tree {
                tree: current,
                target,
            }
        }
        PlacementKind::AppendChild => {
            let mut current = tree.clone();
            let mut target = SpliceTarget::InPlace;
            for (i, fragment) in fragments.into_iter().enumerate() {
                let splice = current.append_child(&rule.target, fragment.into());
                if i == 0 {
                    target = splice.target;
                }
                current = splice.tree;
            }
            Placement::Tree {
                tree: current,
                target,
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
