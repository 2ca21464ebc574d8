//! Component tree node types.
//!
//! A tree's children are a closed sum of three shapes — structured component,
//! literal text, and placeholder — represented as [`ChildNode`] so every
//! traversal site matches exhaustively. Runtime shape-sniffing lives only in
//! the serde layer: the untagged representation disambiguates by field shape
//! (a placeholder carries `generation_template`, a component carries `kind`,
//! anything else is text).
//!
//! ## Placeholder lifecycle
//!
//! A [`Placeholder`] is a deferred-generation contract: the renderer paints
//! its `trigger_rendering` and binds `trigger_kind` to the event-resolution
//! chain. It is replaced in-place by zero or more real nodes exactly once;
//! after replacement its id is no longer resolvable.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::EnumString;

use crate::ids::NodeId;

/// Attribute map — insertion-ordered so serialization is deterministic.
pub type Attributes = IndexMap<String, serde_json::Value>;

/// A child of a tree position: component, literal text, or placeholder.
///
/// Serde is untagged; variant order matters (placeholder and component are
/// distinguished by field shape before falling through to bare text).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChildNode {
    /// Deferred-generation contract (checked first: has `generation_template`).
    Placeholder(Placeholder),
    /// Structured component node.
    Component(ComponentNode),
    /// Literal text content with no identity of its own.
    Text(String),
}

impl ChildNode {
    /// The id of this child, if it has one (text does not).
    pub fn id(&self) -> Option<&NodeId> {
        match self {
            ChildNode::Component(n) => Some(&n.id),
            ChildNode::Placeholder(p) => Some(&p.id),
            ChildNode::Text(_) => None,
        }
    }

    /// Borrow the component node, if this is one.
    pub fn as_component(&self) -> Option<&ComponentNode> {
        match self {
            ChildNode::Component(n) => Some(n),
            _ => None,
        }
    }

    /// Borrow the placeholder, if this is one.
    pub fn as_placeholder(&self) -> Option<&Placeholder> {
        match self {
            ChildNode::Placeholder(p) => Some(p),
            _ => None,
        }
    }

    /// Number of nodes in this subtree (text children count as zero).
    pub fn node_count(&self) -> usize {
        match self {
            ChildNode::Component(n) => n.node_count(),
            ChildNode::Placeholder(_) => 1,
            ChildNode::Text(_) => 0,
        }
    }
}

impl From<ComponentNode> for ChildNode {
    fn from(n: ComponentNode) -> Self {
        ChildNode::Component(n)
    }
}

impl From<Placeholder> for ChildNode {
    fn from(p: Placeholder) -> Self {
        ChildNode::Placeholder(p)
    }
}

impl From<&str> for ChildNode {
    fn from(s: &str) -> Self {
        ChildNode::Text(s.to_string())
    }
}

/// A structured component node.
///
/// `kind` is an open string — the renderer decides whether it names a known
/// structured component or a passthrough primitive. The tree core only cares
/// about identity and shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComponentNode {
    /// Unique id across the whole tree.
    pub id: NodeId,
    /// Component kind ("card", "button", "list", ...).
    pub kind: String,
    /// Attribute map.
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
    /// Ordered children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ChildNode>,
}

impl ComponentNode {
    /// Create a node of the given kind with a fresh id.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            id: NodeId::fresh(),
            kind: kind.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Create a node with an explicit id.
    pub fn with_id(id: impl Into<NodeId>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            attributes: Attributes::new(),
            children: Vec::new(),
        }
    }

    /// Get an attribute value.
    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Get an attribute as a string slice, if it is one.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).and_then(|v| v.as_str())
    }

    /// Number of nodes in this subtree, including self (text children count as zero).
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ChildNode::node_count).sum::<usize>()
    }

    /// Collect the ids of this subtree into `out`, depth-first.
    pub fn collect_ids<'a>(&'a self, out: &mut Vec<&'a NodeId>) {
        out.push(&self.id);
        for child in &self.children {
            match child {
                ChildNode::Component(n) => n.collect_ids(out),
                ChildNode::Placeholder(p) => out.push(&p.id),
                ChildNode::Text(_) => {}
            }
        }
    }
}

/// A non-rendering node acting as a deferred-generation contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Unique id across the whole tree (no longer resolvable after replacement).
    pub id: NodeId,
    /// Template with `{{var}}` slots, handed to the backend on trigger.
    pub generation_template: String,
    /// What the renderer paints until the placeholder is replaced.
    pub trigger_rendering: ComponentNode,
    /// Which event on the rendering fires generation.
    pub trigger_kind: TriggerKind,
}

impl Placeholder {
    /// Create a placeholder with a fresh id.
    pub fn new(
        generation_template: impl Into<String>,
        trigger_rendering: ComponentNode,
        trigger_kind: TriggerKind,
    ) -> Self {
        Self {
            id: NodeId::fresh(),
            generation_template: generation_template.into(),
            trigger_rendering,
            trigger_kind,
        }
    }
}

/// DOM-level event a placeholder binds its generation to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum TriggerKind {
    /// Pointer click.
    #[default]
    Click,
    /// Form submission.
    Submit,
    /// Input value change.
    Change,
}

impl TriggerKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerKind::Click => "click",
            TriggerKind::Submit => "submit",
            TriggerKind::Change => "change",
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Builder for [`ComponentNode`] — keeps fragment construction in tests and
/// assembly code readable.
///
/// ```
/// # use burgeon_types::*;
/// let node = ComponentNodeBuilder::new("card")
///     .id("card-1")
///     .attr("title", "Results")
///     .text("hello")
///     .build();
/// assert_eq!(node.kind, "card");
/// ```
pub struct ComponentNodeBuilder {
    node: ComponentNode,
}

impl ComponentNodeBuilder {
    /// Start building a node of the given kind with a fresh id.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            node: ComponentNode::new(kind),
        }
    }

    pub fn id(mut self, id: impl Into<NodeId>) -> Self {
        self.node.id = id.into();
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.node.attributes.insert(name.into(), value.into());
        self
    }

    pub fn child(mut self, child: impl Into<ChildNode>) -> Self {
        self.node.children.push(child.into());
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.node.children.push(ChildNode::Text(text.into()));
        self
    }

    pub fn placeholder(mut self, placeholder: Placeholder) -> Self {
        self.node.children.push(ChildNode::Placeholder(placeholder));
        self
    }

    /// Consume the builder and return the node.
    pub fn build(self) -> ComponentNode {
        self.node
    }
}

// ============================================================================
// Tests
// ============================================================================
