//! Generation contexts and the tier model.
//!
//! Every trigger captures a [`GenerationContext`] — the state disclosed to
//! the generative backend. How much state is fixed by the trigger's
//! [`TriggerCategory`], never by the caller: tier controls both token cost
//! and the risk of drowning the backend in irrelevant tree state, and the
//! fixed mapping is the primary defense against runaway context growth.
//!
//! Tiers are strict supersets, expressed by struct composition:
//!
//! ```text
//! Minimal   { trigger_id, element_kind, error_message? }
//! Standard  { trigger element, user_input? }
//! Rich      = Standard + bounded siblings + parent + tree summary
//! Full      = Rich + bounded ancestor path + full snapshot + environment
//! ```
//!
//! A context is immutable once captured; it is handed by value to the cache
//! key function and the pipeline and never touched again.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::EnumString;

use crate::ids::NodeId;
use crate::node::{Attributes, ComponentNode};

/// Why generation was triggered. Fixes the context tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum TriggerCategory {
    /// Repairing a broken fragment.
    ErrorFix,
    /// Plain interaction on a known element.
    SimpleInteraction,
    /// Interaction that needs surrounding layout to make sense.
    ComplexInteraction,
    /// A generated fragment triggering further generation.
    RecursiveGeneration,
}

impl TriggerCategory {
    /// Parse from string (case-insensitive, kebab-case).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerCategory::ErrorFix => "error-fix",
            TriggerCategory::SimpleInteraction => "simple-interaction",
            TriggerCategory::ComplexInteraction => "complex-interaction",
            TriggerCategory::RecursiveGeneration => "recursive-generation",
        }
    }

    /// The tier this category always captures at. Fixed, not caller-chosen.
    pub fn tier(&self) -> ContextTier {
        match self {
            TriggerCategory::ErrorFix => ContextTier::Minimal,
            TriggerCategory::SimpleInteraction => ContextTier::Standard,
            TriggerCategory::ComplexInteraction => ContextTier::Rich,
            TriggerCategory::RecursiveGeneration => ContextTier::Full,
        }
    }
}

impl std::fmt::Display for TriggerCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much surrounding state a context discloses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum ContextTier {
    Minimal,
    Standard,
    Rich,
    Full,
}

impl ContextTier {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextTier::Minimal => "minimal",
            ContextTier::Standard => "standard",
            ContextTier::Rich => "rich",
            ContextTier::Full => "full",
        }
    }
}

impl std::fmt::Display for ContextTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The element a trigger fired on, as disclosed to the backend.
///
/// A deliberate subset of [`ComponentNode`]: children are never included
/// here — siblings and ancestors are disclosed separately, tier permitting.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerElement {
    pub id: NodeId,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,
}

impl TriggerElement {
    /// Build from a component node, dropping its children.
    pub fn from_node(node: &ComponentNode) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
            attributes: node.attributes.clone(),
        }
    }
}

/// Minimal tier — used only for repairing a broken fragment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MinimalContext {
    pub trigger_id: NodeId,
    pub element_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Standard tier — the trigger element plus optional user input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardContext {
    pub trigger: TriggerElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
}

/// Rich tier — Standard plus bounded surrounding layout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RichContext {
    #[serde(flatten)]
    pub standard: StandardContext,
    /// Bounded list of sibling components (capture limit applies).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sibling_fragments: Vec<ComponentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_fragment: Option<ComponentNode>,
    pub tree_summary: TreeSummary,
}

/// Full tier — Rich plus ancestry, a whole-tree snapshot, and environment.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FullContext {
    #[serde(flatten)]
    pub rich: RichContext,
    /// Bounded ancestor path, nearest first (capture limit applies).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ancestor_path: Vec<ComponentNode>,
    /// Serialized snapshot of the whole tree at capture time.
    pub full_tree_snapshot: serde_json::Value,
    pub environment: Environment,
}

/// Cheap whole-tree statistics disclosed at Rich tier and above.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSummary {
    /// Total component/placeholder node count.
    pub count: usize,
    /// Whether any error-card nodes are present.
    pub has_errors: bool,
    /// Millis timestamp of the last accepted placement, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<u64>,
}

/// Host environment details disclosed only at Full tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Viewport (width, height) in logical pixels.
    pub viewport: (u32, u32),
    /// Opaque client signature (user agent, platform string).
    pub client_signature: String,
    /// Capture time, Unix millis.
    pub timestamp: u64,
}

impl Environment {
    /// Build an environment stamped with the current time.
    pub fn now(viewport: (u32, u32), client_signature: impl Into<String>) -> Self {
        Self {
            viewport,
            client_signature: client_signature.into(),
            timestamp: crate::now_millis(),
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::now((0, 0), "unknown")
    }
}

/// An immutable capture of trigger-surrounding state, at one of four tiers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "lowercase")]
pub enum GenerationContext {
    Minimal(MinimalContext),
    Standard(StandardContext),
    Rich(RichContext),
    Full(FullContext),
}

impl GenerationContext {
    /// Which tier this context was captured at.
    pub fn tier(&self) -> ContextTier {
        match self {
            GenerationContext::Minimal(_) => ContextTier::Minimal,
            GenerationContext::Standard(_) => ContextTier::Standard,
            GenerationContext::Rich(_) => ContextTier::Rich,
            GenerationContext::Full(_) => ContextTier::Full,
        }
    }

    /// The id of the element the trigger fired on.
    pub fn trigger_id(&self) -> &NodeId {
        match self {
            GenerationContext::Minimal(c) => &c.trigger_id,
            GenerationContext::Standard(c) => &c.trigger.id,
            GenerationContext::Rich(c) => &c.standard.trigger.id,
            GenerationContext::Full(c) => &c.rich.standard.trigger.id,
        }
    }

    /// The trigger kind label disclosed to the backend.
    ///
    /// Minimal contexts exist only for repair, so they always read "error";
    /// every interactive tier reads "interaction".
    pub fn trigger_label(&self) -> &'static str {
        match self {
            GenerationContext::Minimal(_) => "error",
            _ => "interaction",
        }
    }

    /// User input attached to the trigger, if any (never present at Minimal).
    pub fn user_input(&self) -> Option<&str> {
        match self {
            GenerationContext::Minimal(_) => None,
            GenerationContext::Standard(c) => c.user_input.as_deref(),
            GenerationContext::Rich(c) => c.standard.user_input.as_deref(),
            GenerationContext::Full(c) => c.rich.standard.user_input.as_deref(),
        }
    }

    /// Id of the trigger's parent fragment, if captured.
    pub fn parent_id(&self) -> Option<&NodeId> {
        match self {
            GenerationContext::Rich(c) => c.parent_fragment.as_ref().map(|p| &p.id),
            GenerationContext::Full(c) => c.rich.parent_fragment.as_ref().map(|p| &p.id),
            _ => None,
        }
    }

    /// Ids of captured sibling fragments (empty below Rich).
    pub fn sibling_ids(&self) -> Vec<&NodeId> {
        let siblings = match self {
            GenerationContext::Rich(c) => &c.sibling_fragments,
            GenerationContext::Full(c) => &c.rich.sibling_fragments,
            _ => return Vec::new(),
        };
        siblings.iter().map(|s| &s.id).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ComponentNodeBuilder;

    fn standard(id: &str, input: Option<&str>) -> StandardContext {
        StandardContext {
            trigger: TriggerElement {
                id: NodeId::new(id),
                kind: "button".into(),
                attributes: Attributes::new(),
            },
            user_input: input.map(String::from),
        }
    }

    fn rich(id: &str) -> RichContext {
        RichContext {
            standard: standard(id, None),
            sibling_fragments: vec![
                ComponentNodeBuilder::new("card").id("sib-1").build(),
                ComponentNodeBuilder::new("card").id("sib-2").build(),
            ],
            parent_fragment: Some(ComponentNodeBuilder::new("panel").id("parent-1").build()),
            tree_summary: TreeSummary {
                count: 4,
                has_errors: false,
                last_action: None,
            },
        }
    }

    // ── Tier mapping ────────────────────────────────────────────────────

    #[test]
    fn test_category_tier_mapping_is_fixed() {
        assert_eq!(TriggerCategory::ErrorFix.tier(), ContextTier::Minimal);
        assert_eq!(TriggerCategory::SimpleInteraction.tier(), ContextTier::Standard);
        assert_eq!(TriggerCategory::ComplexInteraction.tier(), ContextTier::Rich);
        assert_eq!(TriggerCategory::RecursiveGeneration.tier(), ContextTier::Full);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            TriggerCategory::from_str("error-fix"),
            Some(TriggerCategory::ErrorFix)
        );
        assert_eq!(
            TriggerCategory::from_str("RECURSIVE-GENERATION"),
            Some(TriggerCategory::RecursiveGeneration)
        );
        assert_eq!(TriggerCategory::from_str("bogus"), None);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(ContextTier::Minimal < ContextTier::Standard);
        assert!(ContextTier::Standard < ContextTier::Rich);
        assert!(ContextTier::Rich < ContextTier::Full);
    }

    // ── Accessors across tiers ──────────────────────────────────────────

    #[test]
    fn test_minimal_accessors() {
        let ctx = GenerationContext::Minimal(MinimalContext {
            trigger_id: NodeId::new("broken-1"),
            element_kind: "card".into(),
            error_message: Some("unknown kind".into()),
        });
        assert_eq!(ctx.tier(), ContextTier::Minimal);
        assert_eq!(ctx.trigger_id().as_str(), "broken-1");
        assert_eq!(ctx.trigger_label(), "error");
        assert!(ctx.user_input().is_none());
        assert!(ctx.parent_id().is_none());
        assert!(ctx.sibling_ids().is_empty());
    }

    #[test]
    fn test_standard_accessors() {
        let ctx = GenerationContext::Standard(standard("btn-1", Some("search cats")));
        assert_eq!(ctx.trigger_label(), "interaction");
        assert_eq!(ctx.user_input(), Some("search cats"));
        assert!(ctx.parent_id().is_none());
    }

    #[test]
    fn test_rich_accessors() {
        let ctx = GenerationContext::Rich(rich("btn-1"));
        assert_eq!(ctx.parent_id().map(NodeId::as_str), Some("parent-1"));
        let sibs: Vec<&str> = ctx.sibling_ids().iter().map(|i| i.as_str()).collect();
        assert_eq!(sibs, vec!["sib-1", "sib-2"]);
    }

    #[test]
    fn test_full_accessors_delegate_through_rich() {
        let ctx = GenerationContext::Full(FullContext {
            rich: rich("btn-1"),
            ancestor_path: vec![ComponentNodeBuilder::new("panel").id("anc-1").build()],
            full_tree_snapshot: serde_json::json!([]),
            environment: Environment::now((800, 600), "test-client"),
        });
        assert_eq!(ctx.tier(), ContextTier::Full);
        assert_eq!(ctx.trigger_id().as_str(), "btn-1");
        assert_eq!(ctx.parent_id().map(NodeId::as_str), Some("parent-1"));
        assert_eq!(ctx.sibling_ids().len(), 2);
    }

    // ── Serde ───────────────────────────────────────────────────────────

    #[test]
    fn test_context_serde_tagged_by_tier() {
        let ctx = GenerationContext::Standard(standard("btn-1", None));
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(json.contains("\"tier\":\"standard\""));
        let parsed: GenerationContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ctx);
    }

    #[test]
    fn test_trigger_element_drops_children() {
        let node = ComponentNodeBuilder::new("form")
            .id("form-1")
            .attr("action", "go")
            .text("nested")
            .build();
        let el = TriggerElement::from_node(&node);
        assert_eq!(el.id, node.id);
        assert_eq!(el.attributes, node.attributes);
        let json = serde_json::to_string(&el).unwrap();
        assert!(!json.contains("children"));
    }

    #[test]
    fn test_environment_now_stamps_time() {
        let env = Environment::now((1024, 768), "sig");
        assert!(env.timestamp > 0);
        assert_eq!(env.viewport, (1024, 768));
    }
}
