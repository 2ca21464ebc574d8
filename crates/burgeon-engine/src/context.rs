//! Context capture: projecting tree state into a tiered generation context.
//!
//! The tier is fixed by the trigger category (see
//! [`TriggerCategory::tier`]); capture only decides what goes into each
//! tier's fields and applies the bounded-disclosure limits. Siblings and
//! ancestors are truncated, never expanded — growing the limits grows token
//! cost linearly at Rich and above.

use burgeon_types::{
    ComponentNode, Environment, FullContext, GenerationContext, MinimalContext, RichContext,
    StandardContext, TreeSummary, TriggerCategory, TriggerElement,
};

use burgeon_tree::ComponentTree;

use crate::pipeline::is_error_card;

/// Bounds on how much surrounding layout a capture discloses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Most sibling fragments disclosed at Rich and above.
    pub max_siblings: usize,
    /// Most ancestor fragments disclosed at Full.
    pub max_ancestors: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_siblings: 4,
            max_ancestors: 5,
        }
    }
}

/// Per-trigger capture inputs that are not derivable from the tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CaptureOptions {
    /// What the user typed, if the trigger carried input.
    pub user_input: Option<String>,
    /// The failure being repaired (Minimal tier only field).
    pub error_message: Option<String>,
}

/// One capture pass over a tree.
///
/// Borrowing the tree keeps capture allocation-free until a tier actually
/// needs clones of surrounding fragments.
pub struct ContextCapture<'a> {
    pub tree: &'a ComponentTree,
    pub limits: CaptureLimits,
    pub environment: Environment,
    /// Millis timestamp of the last accepted placement, if any.
    pub last_action: Option<u64>,
}

impl ContextCapture<'_> {
    /// Capture a context for `element` at the tier fixed by `category`.
    pub fn capture(
        &self,
        category: TriggerCategory,
        element: &TriggerElement,
        options: &CaptureOptions,
    ) -> GenerationContext {
        use burgeon_types::ContextTier::*;
        match category.tier() {
            Minimal => GenerationContext::Minimal(MinimalContext {
                trigger_id: element.id.clone(),
                element_kind: element.kind.clone(),
                error_message: options.error_message.clone(),
            }),
            Standard => GenerationContext::Standard(self.standard(element, options)),
            Rich => GenerationContext::Rich(self.rich(element, options)),
            Full => GenerationContext::Full(FullContext {
                rich: self.rich(element, options),
                ancestor_path: self
                    .tree
                    .ancestors_of(&element.id)
                    .into_iter()
                    .take(self.limits.max_ancestors)
                    .map(shallow_clone)
                    .collect(),
                full_tree_snapshot: self.tree.snapshot_json(),
                environment: self.environment.clone(),
            }),
        }
    }

    fn standard(&self, element: &TriggerElement, options: &CaptureOptions) -> StandardContext {
        StandardContext {
            trigger: element.clone(),
            user_input: options.user_input.clone(),
        }
    }

    fn rich(&self, element: &TriggerElement, options: &CaptureOptions) -> RichContext {
        RichContext {
            standard: self.standard(element, options),
            sibling_fragments: self
                .tree
                .siblings_of(&element.id)
                .into_iter()
                .take(self.limits.max_siblings)
                .cloned()
                .collect(),
            parent_fragment: self.tree.parent_of(&element.id).map(shallow_clone),
            tree_summary: summarize(self.tree, self.last_action),
        }
    }
}

/// Clone a node without its children. Parent and ancestor fragments disclose
/// identity and attributes; their subtrees are reachable through the
/// Full-tier snapshot when needed.
fn shallow_clone(node: &ComponentNode) -> ComponentNode {
    ComponentNode {
        id: node.id.clone(),
        kind: node.kind.clone(),
        attributes: node.attributes.clone(),
        children: Vec::new(),
    }
}

/// Cheap whole-tree statistics for the Rich-tier summary.
pub fn summarize(tree: &ComponentTree, last_action: Option<u64>) -> TreeSummary {
    let mut has_errors = false;
    for root in tree.roots() {
        if subtree_has_error(root) {
            has_errors = true;
            break;
        }
    }
    TreeSummary {
        count: tree.node_count(),
        has_errors,
        last_action,
    }
}

fn subtree_has_error(child: &burgeon_types::ChildNode) -> bool {
    match child.as_component() {
        Some(node) => is_error_card(node) || node.children.iter().any(subtree_has_error),
        None => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::degraded_card;
    use burgeon_types::{Attributes, ComponentNodeBuilder, NodeId};

    /// panel ── [ btn-1, sib-1..sib-6 ]
    fn wide_tree() -> ComponentTree {
        let mut panel = ComponentNodeBuilder::new("panel")
            .id("panel-1")
            .child(ComponentNode::with_id("btn-1", "button"));
        for i in 1..=6 {
            panel = panel.child(ComponentNode::with_id(format!("sib-{i}"), "card"));
        }
        ComponentTree::from_roots(vec![panel.build().into()])
    }

    fn element(id: &str) -> TriggerElement {
        TriggerElement {
            id: NodeId::new(id),
            kind: "button".into(),
            attributes: Attributes::new(),
        }
    }

    fn capture(tree: &ComponentTree) -> ContextCapture<'_> {
        ContextCapture {
            tree,
            limits: CaptureLimits::default(),
            environment: Environment::now((800, 600), "test"),
            last_action: Some(42),
        }
    }

    #[test]
    fn test_minimal_capture_ignores_user_input() {
        let tree = wide_tree();
        let ctx = capture(&tree).capture(
            TriggerCategory::ErrorFix,
            &element("btn-1"),
            &CaptureOptions {
                user_input: Some("typed".into()),
                error_message: Some("unknown kind".into()),
            },
        );
        // The tier never discloses input, whatever the caller passed.
        assert!(ctx.user_input().is_none());
        let GenerationContext::Minimal(minimal) = ctx else {
            panic!("expected minimal");
        };
        assert_eq!(minimal.error_message.as_deref(), Some("unknown kind"));
        assert_eq!(minimal.element_kind, "button");
    }

    #[test]
    fn test_standard_capture_has_no_layout() {
        let tree = wide_tree();
        let ctx = capture(&tree).capture(
            TriggerCategory::SimpleInteraction,
            &element("btn-1"),
            &CaptureOptions {
                user_input: Some("go".into()),
                error_message: None,
            },
        );
        assert_eq!(ctx.user_input(), Some("go"));
        assert!(ctx.sibling_ids().is_empty());
        assert!(ctx.parent_id().is_none());
    }

    #[test]
    fn test_rich_capture_bounds_siblings() {
        let tree = wide_tree();
        let ctx = capture(&tree).capture(
            TriggerCategory::ComplexInteraction,
            &element("btn-1"),
            &CaptureOptions::default(),
        );
        // Six siblings in the tree, four disclosed.
        assert_eq!(ctx.sibling_ids().len(), 4);
        assert_eq!(ctx.parent_id().map(NodeId::as_str), Some("panel-1"));

        let GenerationContext::Rich(rich) = ctx else {
            panic!("expected rich");
        };
        assert_eq!(rich.tree_summary.count, 8);
        assert_eq!(rich.tree_summary.last_action, Some(42));
        assert!(!rich.tree_summary.has_errors);
    }

    #[test]
    fn test_full_capture_has_snapshot_and_environment() {
        let tree = wide_tree();
        let ctx = capture(&tree).capture(
            TriggerCategory::RecursiveGeneration,
            &element("btn-1"),
            &CaptureOptions::default(),
        );
        let GenerationContext::Full(full) = ctx else {
            panic!("expected full");
        };
        assert!(full.full_tree_snapshot.is_array());
        assert_eq!(full.environment.viewport, (800, 600));
        assert_eq!(full.ancestor_path.len(), 1);
        assert_eq!(full.ancestor_path[0].id.as_str(), "panel-1");
        // Shallow: ancestor children are not carried along.
        assert!(full.ancestor_path[0].children.is_empty());
    }

    #[test]
    fn test_summary_detects_error_cards() {
        let tree = ComponentTree::from_roots(vec![
            ComponentNode::with_id("ok", "card").into(),
            degraded_card("boom").into(),
        ]);
        assert!(summarize(&tree, None).has_errors);
    }

    #[test]
    fn test_capture_for_element_not_in_tree() {
        let tree = wide_tree();
        let ctx = capture(&tree).capture(
            TriggerCategory::RecursiveGeneration,
            &element("ghost"),
            &CaptureOptions::default(),
        );
        // Capture still completes; layout fields are just empty.
        assert!(ctx.sibling_ids().is_empty());
        assert!(ctx.parent_id().is_none());
        assert_eq!(ctx.trigger_id().as_str(), "ghost");
    }
}
