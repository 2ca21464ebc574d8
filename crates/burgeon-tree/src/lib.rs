//! Component tree model for Burgeon.
//!
//! A tree of component nodes, literal text, and placeholders, addressed by
//! node id. All mutation is pure: operations return a new tree value and an
//! observable outcome, so the orchestrating layer can publish whole trees
//! atomically and hold previous values for diffing.
//!
//! # Design Philosophy
//!
//! The tree never drops generated content and never raises from a mutation:
//! a splice whose target id is gone (already replaced, or removed by a
//! concurrent placement) appends at the root instead and says so. Structural
//! problems — duplicate ids, runaway nesting — are surfaced by `validate()`;
//! the orchestrating layer keeps the invariant by re-id'ing incoming
//! fragments that would collide before it splices them in.

mod error;
mod tree;

pub use error::TreeError;
pub use tree::{ComponentTree, MAX_TREE_DEPTH, Splice, SpliceTarget};

/// Result type for tree validation.
pub type Result<T> = std::result::Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;
    use burgeon_types::{ChildNode, ComponentNode, ComponentNodeBuilder, NodeId};

    fn card(id: &str) -> ChildNode {
        ComponentNode::with_id(id, "card").into()
    }

    #[test]
    fn test_chained_mutations_preserve_older_trees() {
        let t0 = ComponentTree::from_roots(vec![card("a")]);
        let t1 = t0.insert_after(&NodeId::new("a"), card("b")).tree;
        let t2 = t1.replace(&NodeId::new("a"), vec![card("c")]).tree;

        // Every generation still readable
        assert_eq!(t0.node_count(), 1);
        assert_eq!(t1.node_count(), 2);
        assert_eq!(t2.node_count(), 2);
        assert!(t1.contains(&NodeId::new("a")));
        assert!(!t2.contains(&NodeId::new("a")));
        assert!(t2.contains(&NodeId::new("c")));
    }

    #[test]
    fn test_deep_splice_leaves_unrelated_branches_equal() {
        let left = ComponentNodeBuilder::new("panel")
            .id("left")
            .child(ComponentNode::with_id("left-btn", "button"))
            .build();
        let right = ComponentNodeBuilder::new("panel")
            .id("right")
            .child(ComponentNode::with_id("right-btn", "button"))
            .build();
        let tree = ComponentTree::from_roots(vec![left.into(), right.into()]);

        let splice = tree.append_child(&NodeId::new("right"), card("new"));
        assert_eq!(splice.target, SpliceTarget::InPlace);
        // Left branch byte-identical across the mutation
        assert_eq!(splice.tree.roots()[0], tree.roots()[0]);
        assert_ne!(splice.tree.roots()[1], tree.roots()[1]);
    }

    #[test]
    fn test_replace_then_resolve_old_id_degrades() {
        let tree = ComponentTree::from_roots(vec![card("a")]);
        let t1 = tree.replace(&NodeId::new("a"), vec![card("b")]).tree;

        // The old id is gone — a second splice against it falls back.
        let splice = t1.replace(&NodeId::new("a"), vec![card("late")]);
        assert_eq!(splice.target, SpliceTarget::RootFallback);
        assert!(splice.tree.contains(&NodeId::new("late")));
        assert!(splice.tree.contains(&NodeId::new("b")));
    }
}
