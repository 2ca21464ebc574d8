//! Node identifiers.
//!
//! Unlike most of the id-heavy systems we build on, node ids here are
//! *strings*: generated fragments arrive from the synthesis backend carrying
//! whatever ids the model chose ("btn-1", "card-results"), and the tree must
//! address them verbatim. [`NodeId`] wraps the string to keep lookups typed;
//! [`NodeId::fresh`] mints a uuid-v7-hex id for nodes that arrive without one
//! or collide with an existing id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A node identifier — unique within one component tree.
#[derive(Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Wrap an existing id string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh time-ordered id (`node-` + 12 hex chars of a UUIDv7).
    ///
    /// Short enough to read in logs, long enough that collisions within a
    /// single tree are not a practical concern.
    pub fn fresh() -> Self {
        let hex = uuid::Uuid::now_v7().as_simple().to_string();
        Self(format!("node-{}", &hex[..12]))
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is the empty string (used as "no parent" in cache keys).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_construction() {
        let id = NodeId::new("btn-1");
        assert_eq!(id.as_str(), "btn-1");
        assert_eq!(id.to_string(), "btn-1");
    }

    #[test]
    fn test_node_id_fresh_format() {
        let id = NodeId::fresh();
        assert!(id.as_str().starts_with("node-"));
        assert_eq!(id.as_str().len(), "node-".len() + 12);
    }

    #[test]
    fn test_node_id_fresh_unique() {
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        assert_ne!(a, b);
    }

    #[test]
    fn test_node_id_hash_usable_as_map_key() {
        use std::collections::HashMap;
        let id = NodeId::new("card-1");
        let mut map = HashMap::new();
        map.insert(id.clone(), "hello");
        assert_eq!(map.get(&id), Some(&"hello"));
    }

    #[test]
    fn test_node_id_serde_transparent() {
        let id = NodeId::new("btn-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"btn-1\"");
        let parsed: NodeId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_node_id_debug() {
        let id = NodeId::new("x");
        assert_eq!(format!("{:?}", id), "NodeId(x)");
    }
}
