//! Collaborator interfaces between the engine and its environment.
//!
//! Everything nondeterministic or I/O-bound sits behind a trait here: the
//! generative backend (split into the analysis, synthesis, and whole-fragment
//! calls the pipeline makes), the primitive catalog, and the key-value store
//! backing the cache. The engine itself is deterministic given these.
//!
//! Implementations are expected to be cheap to clone behind `Arc` and safe
//! to call concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use burgeon_types::{ComponentNode, GenerationContext};

/// Errors surfaced by collaborator calls.
#[derive(Error, Debug)]
pub enum GenError {
    /// The backend could not be reached or the call did not complete.
    #[error("backend transport failure: {0}")]
    Transport(String),

    /// The backend answered, but the payload did not parse.
    #[error("malformed backend output: {detail}")]
    Malformed {
        detail: String,
        /// Raw payload, kept for logging and degraded rendering.
        raw: String,
    },

    /// The primitive catalog failed to answer or acquire.
    #[error("catalog failure: {0}")]
    Catalog(String),

    /// The backing key-value store failed.
    #[error("store failure: {0}")]
    Store(String),
}

/// Result alias for collaborator calls.
pub type GenResult<T> = std::result::Result<T, GenError>;

/// What the analysis stage learned about a generation request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Primitive kinds the request needs and the catalog should already know.
    #[serde(default)]
    pub required_primitives: Vec<String>,
    /// Kinds the backend wants to invent; never in the catalog by definition.
    #[serde(default)]
    pub custom_primitives: Vec<String>,
    /// Higher-level kinds that decompose into catalog parts.
    #[serde(default)]
    pub composite_primitives: Vec<CompositePrimitive>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl Analysis {
    /// All catalog-checkable kinds: required plus every composite part.
    pub fn catalog_candidates(&self) -> Vec<String> {
        let mut out = self.required_primitives.clone();
        for composite in &self.composite_primitives {
            for part in &composite.parts {
                if !out.contains(part) {
                    out.push(part.clone());
                }
            }
        }
        out
    }
}

/// A composite primitive and the catalog parts it decomposes into.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompositePrimitive {
    pub name: String,
    pub parts: Vec<String>,
}

/// Outcome of acquiring one primitive from the catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AcquireOutcome {
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single fragment produced by the whole-fragment backend call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFragment {
    pub fragment: ComponentNode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Backend call that breaks a freeform request down into primitives.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Analyze `request` against the enumerated catalog kinds.
    async fn analyze(&self, request: &str, known_kinds: &[String]) -> GenResult<Analysis>;
}

/// Backend call that emits component JSON for an analyzed request.
///
/// The return value is the backend's raw textual output. Assembly owns
/// parsing it; a synthesizer should not pre-clean or validate.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        request: &str,
        analysis: &Analysis,
        available_kinds: &[String],
    ) -> GenResult<String>;
}

/// Backend call that generates one complete fragment from a captured context.
///
/// This is the single-shot path used by the generative event fallback and
/// the repair queue, as opposed to the staged pipeline.
#[async_trait]
pub trait FragmentBackend: Send + Sync {
    async fn generate_fragment(&self, context: &GenerationContext) -> GenResult<GeneratedFragment>;
}

/// The renderer's primitive catalog: which component kinds exist, and how to
/// fetch ones that don't yet.
#[async_trait]
pub trait PrimitiveCatalog: Send + Sync {
    /// Every kind the catalog knows about, available or not.
    fn known_kinds(&self) -> Vec<String>;

    /// Whether `kind` can be rendered right now.
    fn is_available(&self, kind: &str) -> bool;

    /// Try to fetch the named kinds, reporting per-kind outcomes.
    ///
    /// Errors are reserved for whole-call failures; an unfetchable kind is a
    /// `success: false` outcome, not an `Err`.
    async fn acquire(&self, kinds: &[String]) -> GenResult<Vec<AcquireOutcome>>;
}

/// Key-value persistence behind the generation cache.
///
/// `put` is last-writer-wins; implementations must not fail on overwrite.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> GenResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> GenResult<()>;
}

/// The full set of collaborators an engine is wired with.
#[derive(Clone)]
pub struct Backends {
    pub analyzer: Arc<dyn Analyzer>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub fragments: Arc<dyn FragmentBackend>,
    pub catalog: Arc<dyn PrimitiveCatalog>,
}
