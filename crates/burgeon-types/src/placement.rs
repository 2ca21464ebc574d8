//! Placement rules — where a generated fragment lands relative to its target.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::EnumString;

use crate::ids::NodeId;

/// Policy governing where a fragment is spliced.
///
/// Every kind except `Modal` mutates the primary tree; `Modal` hands the
/// fragment back as a side-channel value for the renderer to overlay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlacementKind {
    /// Replace the target node in place.
    Replace,
    /// Insert after the target, same parent.
    #[default]
    After,
    /// Insert before the target, same parent.
    Before,
    /// Append as the target's last child.
    AppendChild,
    /// Do not touch the tree; return the fragment for overlay presentation.
    Modal,
}

impl PlacementKind {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementKind::Replace => "replace",
            PlacementKind::After => "after",
            PlacementKind::Before => "before",
            PlacementKind::AppendChild => "append_child",
            PlacementKind::Modal => "modal",
        }
    }

    /// Whether this placement mutates the primary tree.
    pub fn mutates_tree(&self) -> bool {
        !matches!(self, PlacementKind::Modal)
    }
}

impl std::fmt::Display for PlacementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A placement kind bound to a target node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementRule {
    pub kind: PlacementKind,
    pub target: NodeId,
}

impl PlacementRule {
    pub fn new(kind: PlacementKind, target: impl Into<NodeId>) -> Self {
        Self {
            kind,
            target: target.into(),
        }
    }

    pub fn replace(target: impl Into<NodeId>) -> Self {
        Self::new(PlacementKind::Replace, target)
    }

    pub fn after(target: impl Into<NodeId>) -> Self {
        Self::new(PlacementKind::After, target)
    }

    pub fn before(target: impl Into<NodeId>) -> Self {
        Self::new(PlacementKind::Before, target)
    }

    pub fn append_child(target: impl Into<NodeId>) -> Self {
        Self::new(PlacementKind::AppendChild, target)
    }

    pub fn modal(target: impl Into<NodeId>) -> Self {
        Self::new(PlacementKind::Modal, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placement_kind_parsing() {
        assert_eq!(PlacementKind::from_str("replace"), Some(PlacementKind::Replace));
        assert_eq!(PlacementKind::from_str("APPEND_CHILD"), Some(PlacementKind::AppendChild));
        assert_eq!(PlacementKind::from_str("modal"), Some(PlacementKind::Modal));
        assert_eq!(PlacementKind::from_str("inside"), None);
    }

    #[test]
    fn test_placement_kind_mutates_tree() {
        assert!(PlacementKind::Replace.mutates_tree());
        assert!(PlacementKind::After.mutates_tree());
        assert!(PlacementKind::Before.mutates_tree());
        assert!(PlacementKind::AppendChild.mutates_tree());
        assert!(!PlacementKind::Modal.mutates_tree());
    }

    #[test]
    fn test_rule_constructors() {
        let rule = PlacementRule::after("btn-1");
        assert_eq!(rule.kind, PlacementKind::After);
        assert_eq!(rule.target.as_str(), "btn-1");
    }

    #[test]
    fn test_rule_serde_roundtrip() {
        let rule = PlacementRule::replace("ph-1");
        let json = serde_json::to_string(&rule).unwrap();
        assert!(json.contains("\"replace\""));
        let parsed: PlacementRule = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, rule);
    }
}
