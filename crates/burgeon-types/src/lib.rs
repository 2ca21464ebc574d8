//! Shared node, context, and placement types for Burgeon.
//!
//! This crate is the structural foundation: node identifiers, the
//! component-tree sum type, generation contexts, and placement rules. It has
//! **no internal burgeon dependencies** — a pure leaf crate that other crates
//! build on.
//!
//! # Entity Overview
//!
//! ```text
//! ComponentTree (burgeon-tree)
//!     └── roots: Vec<ChildNode>
//!
//! ChildNode ← one of three shapes, matched exhaustively
//!     ├── Component(ComponentNode)   id + kind + attributes + children
//!     ├── Text(String)               literal text, no identity
//!     └── Placeholder(Placeholder)   deferred-generation contract
//!
//! Trigger ← user event on a node without an explicit handler
//!     └── categorized (TriggerCategory), which fixes the ContextTier
//!         └── GenerationContext (Minimal ⊂ Standard ⊂ Rich ⊂ Full)
//!             └── projected into a CacheKey (burgeon-engine)
//! ```
//!
//! # Key Types
//!
//! |---------------------|---------------------------------------------|
//! | Type                | Purpose                                     |
//! |---------------------|---------------------------------------------|
//! | [`NodeId`]          | Unique node address within one tree         |
//! | [`ChildNode`]       | Component / text / placeholder sum type     |
//! | [`ComponentNode`]   | Structured node with attributes + children  |
//! | [`Placeholder`]     | Deferred-generation contract                |
//! | [`TriggerKind`]     | DOM-level event bound to a placeholder      |
//! | [`TriggerCategory`] | What kind of trigger fired (fixes the tier) |
//! | [`ContextTier`]     | How much surrounding state is disclosed     |
//! | [`GenerationContext`] | Immutable capture handed to the backend   |
//! | [`PlacementRule`]   | Where a generated fragment lands            |
//! |---------------------|---------------------------------------------|

pub mod context;
pub mod ids;
pub mod node;
pub mod placement;

// Re-export primary types at crate root for convenience.
pub use context::{
    ContextTier, Environment, FullContext, GenerationContext, MinimalContext, RichContext,
    StandardContext, TreeSummary, TriggerCategory, TriggerElement,
};
pub use ids::NodeId;
pub use node::{Attributes, ChildNode, ComponentNode, ComponentNodeBuilder, Placeholder, TriggerKind};
pub use placement::{PlacementKind, PlacementRule};

/// Current time as Unix milliseconds. Used by constructors throughout the crate.
pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
