//! Error types for tree validation.
//!
//! Mutation operations never raise — target-id misses degrade to the
//! observable root-append fallback. Errors exist only for structural
//! validation, which the engine runs before accepting a generated fragment.

use thiserror::Error;

use burgeon_types::NodeId;

/// Errors that can occur when validating a component tree.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The same id appears on more than one node.
    #[error("duplicate node id: {0}")]
    DuplicateId(NodeId),

    /// Nesting exceeds the traversal circuit breaker.
    #[error("tree depth {depth} exceeds maximum {max}")]
    DepthExceeded { depth: usize, max: usize },
}
