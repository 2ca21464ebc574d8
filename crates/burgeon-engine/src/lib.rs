//! Burgeon's generation engine.
//!
//! Everything above the tree model lives here: tiered context capture, the
//! staged generation pipeline, the keyed fragment cache, event handler
//! resolution with generative fallback, the placement engine, and the
//! repair queue. [`UiEngine`] wires them together around one published
//! tree.
//!
//! ```text
//! trigger ──► capture ──► cache key ──► probe ──hit──► place
//!                                        │
//!                                       miss
//!                                        │
//!                              backend / pipeline ──► assemble ──► place
//! ```
//!
//! The engine is deterministic given its collaborators — every
//! nondeterministic edge (generative backend, primitive catalog, storage)
//! is a trait in [`backend`].

pub mod backend;
pub mod cache;
pub mod context;
pub mod engine;
pub mod pipeline;
pub mod placement;
pub mod repair;
pub mod resolve;
pub mod store;

pub use backend::{
    AcquireOutcome, Analysis, Analyzer, Backends, CompositePrimitive, FragmentBackend, GenError,
    GenResult, GeneratedFragment, KvStore, PrimitiveCatalog, Synthesizer,
};
pub use cache::{CacheEntry, CacheKey, GenerationCache, derive_key};
pub use context::{CaptureLimits, CaptureOptions, ContextCapture, summarize};
pub use engine::{EngineConfig, FallbackOutcome, Placed, UiEngine};
pub use pipeline::{GenerationPipeline, PipelineReport, PipelineStep, RetryPolicy, StepStatus};
pub use placement::{Placement, place};
pub use repair::{RepairOutcome, RepairQueue, RepairRequest, repair_channel};
pub use resolve::{
    DeclaredHandler, EventDisposition, EventTrigger, GenerativeBinding, HandlerFn,
    HandlerRegistry, ResolveError, ResolvedHandler,
};
pub use store::{MemoryStore, SqliteStore};

/// Current time as Unix millis.
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
