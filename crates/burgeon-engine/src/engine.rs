//! The orchestrating engine: one live tree plus every generation path.
//!
//! [`UiEngine`] owns the published tree behind a lock and exposes the
//! subsystem surfaces — capture, pipeline, resolution, placement, repair.
//! The tree is published as a whole `Arc` on every accepted placement, so
//! readers always see a complete consistent tree and never a half-applied
//! edit. Placement itself is effectively single-writer (one UI thread, one
//! repair drainer); the lock guards publication, not contention.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::{Mutex, mpsc};

use burgeon_tree::{ComponentTree, SpliceTarget};
use burgeon_types::{
    Attributes, ChildNode, ComponentNode, Environment, GenerationContext, PlacementKind,
    PlacementRule, TriggerCategory, TriggerElement,
};

use crate::backend::{Backends, KvStore};
use crate::cache::{CacheKey, GenerationCache, derive_key};
use crate::context::{CaptureLimits, CaptureOptions, ContextCapture};
use crate::pipeline::{GenerationPipeline, PipelineReport, RetryPolicy, with_fresh_ids};
use crate::placement::{self, Placement};
use crate::repair::{RepairOutcome, RepairQueue, RepairRequest, repair_channel};
use crate::resolve::{
    DeclaredHandler, GenerativeBinding, HandlerFn, HandlerRegistry, ResolveError, ResolvedHandler,
};

/// Engine-wide knobs. Defaults suit an interactive session.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Hard cap on total tree nodes; placements that would exceed it are
    /// refused so runaway recursive generation cannot grow without bound.
    pub max_node_count: usize,
    pub limits: CaptureLimits,
    pub retry: RetryPolicy,
    /// Viewport (width, height) stamped into Full-tier environments.
    pub viewport: (u32, u32),
    /// Opaque client signature stamped into Full-tier environments.
    pub client_signature: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_node_count: 10_000,
            limits: CaptureLimits::default(),
            retry: RetryPolicy::default(),
            viewport: (1280, 800),
            client_signature: "burgeon".into(),
        }
    }
}

/// Outcome of an engine-level placement.
#[derive(Clone, Debug, PartialEq)]
pub enum Placed {
    /// The tree was edited and published.
    Spliced(SpliceTarget),
    /// Modal side-channel; the tree is untouched.
    Modal(Vec<ComponentNode>),
    /// The node budget would be exceeded; the tree is untouched.
    Refused { would_be: usize, budget: usize },
}

/// Outcome of a generative event fallback.
#[derive(Clone, Debug, PartialEq)]
pub enum FallbackOutcome {
    Placed {
        from_cache: bool,
        target: SpliceTarget,
    },
    /// Generation or placement failed; the tree is unchanged.
    Failed,
}

/// The live engine.
pub struct UiEngine {
    config: EngineConfig,
    backends: Backends,
    pipeline: GenerationPipeline,
    cache: GenerationCache,
    registry: RwLock<HandlerRegistry>,
    tree: RwLock<Arc<ComponentTree>>,
    /// Millis of the last accepted placement; 0 means never.
    last_action: AtomicU64,
    repairs: RepairQueue,
    repair_rx: Mutex<mpsc::UnboundedReceiver<RepairRequest>>,
}

impl UiEngine {
    pub fn new(config: EngineConfig, backends: Backends, store: Arc<dyn KvStore>) -> Self {
        let pipeline = GenerationPipeline::new(
            Arc::clone(&backends.analyzer),
            Arc::clone(&backends.synthesizer),
            Arc::clone(&backends.catalog),
            config.retry,
        );
        let (repairs, repair_rx) = repair_channel();
        Self {
            pipeline,
            cache: GenerationCache::new(store),
            registry: RwLock::new(HandlerRegistry::new()),
            tree: RwLock::new(Arc::new(ComponentTree::new())),
            last_action: AtomicU64::new(0),
            repairs,
            repair_rx: Mutex::new(repair_rx),
            backends,
            config,
        }
    }

    // =========================================================================
    // Tree access
    // =========================================================================

    /// The currently published tree.
    pub fn current_tree(&self) -> Arc<ComponentTree> {
        Arc::clone(&self.tree.read())
    }

    /// Seed or reset the published tree (host setup, not a placement).
    pub fn load_tree(&self, tree: ComponentTree) {
        *self.tree.write() = Arc::new(tree);
    }

    /// Millis of the last accepted placement, if any.
    pub fn last_action(&self) -> Option<u64> {
        let at = self.last_action.load(Ordering::Relaxed);
        (at != 0).then_some(at)
    }

    fn publish(&self, tree: ComponentTree) {
        *self.tree.write() = Arc::new(tree);
        self.last_action
            .store(crate::now_millis(), Ordering::Relaxed);
    }

    // =========================================================================
    // Capture and pipeline
    // =========================================================================

    /// Capture a generation context at the tier fixed by `category`.
    pub fn capture_context(
        &self,
        category: TriggerCategory,
        element: &TriggerElement,
        options: &CaptureOptions,
    ) -> GenerationContext {
        let tree = self.current_tree();
        ContextCapture {
            tree: &tree,
            limits: self.config.limits,
            environment: Environment::now(
                self.config.viewport,
                self.config.client_signature.as_str(),
            ),
            last_action: self.last_action(),
        }
        .capture(category, element, options)
    }

    /// Run the staged pipeline for a freeform request. Placement of the
    /// resulting fragments is the caller's decision.
    pub async fn run_pipeline(&self, request: &str) -> PipelineReport {
        self.pipeline.run(request).await
    }

    // =========================================================================
    // Placement
    // =========================================================================

    /// Apply fragments to the published tree under `rule`.
    ///
    /// Ids stay unique across the published tree: fragments carrying ids
    /// that already exist in it (or repeat within the batch) get fresh ids
    /// before the splice. A `replace` may reuse ids from the subtree it
    /// removes.
    pub fn place(&self, fragments: Vec<ComponentNode>, rule: &PlacementRule) -> Placed {
        let current = self.current_tree();
        let fragments = if rule.kind.mutates_tree() {
            unique_fragments(&current, fragments, rule)
        } else {
            fragments
        };
        match placement::place(&current, fragments, rule) {
            Placement::Modal { fragments } => Placed::Modal(fragments),
            Placement::Tree { tree, target } => {
                let would_be = tree.node_count();
                if would_be > self.config.max_node_count {
                    tracing::warn!(
                        would_be,
                        budget = self.config.max_node_count,
                        "placement refused, node budget exceeded"
                    );
                    return Placed::Refused {
                        would_be,
                        budget: self.config.max_node_count,
                    };
                }
                self.publish(tree);
                Placed::Spliced(target)
            }
        }
    }

    // =========================================================================
    // Event resolution and generative fallback
    // =========================================================================

    /// Register a named handler for generated elements to reference.
    pub fn register_handler(&self, name: impl Into<String>, handler: HandlerFn) {
        self.registry.write().register(name, handler);
    }

    /// Resolve a declared handler through the chain.
    pub fn resolve(
        &self,
        declared: &DeclaredHandler,
        binding: GenerativeBinding,
    ) -> Result<ResolvedHandler, ResolveError> {
        self.registry.read().resolve(declared, binding)
    }

    /// Run the generative fallback for an unhandled event: capture at Full
    /// tier, consult the cache, generate on a miss, insert the fragment
    /// after the triggering component.
    ///
    /// Identical concurrent triggers are single-flighted on the cache key;
    /// the second waits and places from cache. Any failure logs and leaves
    /// the tree unchanged.
    pub async fn invoke_generative(
        &self,
        binding: &GenerativeBinding,
        user_input: Option<String>,
    ) -> FallbackOutcome {
        let tree = self.current_tree();
        let element = match tree
            .find_by_id(&binding.element_id)
            .and_then(ChildNode::as_component)
        {
            Some(node) => TriggerElement::from_node(node),
            // Element already gone (concurrent replacement): capture still
            // proceeds, and placement will degrade on its own terms.
            None => TriggerElement {
                id: binding.element_id.clone(),
                kind: "unknown".into(),
                attributes: Attributes::new(),
            },
        };
        let context = self.capture_context(
            TriggerCategory::RecursiveGeneration,
            &element,
            &CaptureOptions {
                user_input,
                error_message: None,
            },
        );
        let key = derive_key(&context);
        let outcome = {
            let lock = self.cache.lock_for(&key);
            let _guard = lock.lock().await;
            self.generate_under_lock(&context, &key, binding).await
        };
        // The guard is gone; drop the single-flight entry unless another
        // identical trigger is still holding it.
        self.cache.release(&key);
        outcome
    }

    /// The guarded section of the fallback: probe the cache, generate on a
    /// miss, place, store.
    async fn generate_under_lock(
        &self,
        context: &GenerationContext,
        key: &CacheKey,
        binding: &GenerativeBinding,
    ) -> FallbackOutcome {
        // Probe under the single-flight lock: a concurrent identical miss
        // has either filled the entry by now or is behind us.
        match self.cache.get(key) {
            Ok(Some(entry)) => {
                return match self.place(
                    vec![entry.fragment],
                    &PlacementRule::after(binding.component_id.clone()),
                ) {
                    Placed::Spliced(target) => FallbackOutcome::Placed {
                        from_cache: true,
                        target,
                    },
                    _ => FallbackOutcome::Failed,
                };
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache probe failed, generating anyway");
            }
        }

        match self.backends.fragments.generate_fragment(context).await {
            Ok(generated) => {
                match self.place(
                    vec![generated.fragment.clone()],
                    &PlacementRule::after(binding.component_id.clone()),
                ) {
                    Placed::Spliced(target) => {
                        if let Err(e) =
                            self.cache.put(key, generated.fragment, generated.reasoning)
                        {
                            tracing::warn!(key = %key, error = %e, "failed to store generation");
                        }
                        FallbackOutcome::Placed {
                            from_cache: false,
                            target,
                        }
                    }
                    _ => FallbackOutcome::Failed,
                }
            }
            Err(e) => {
                tracing::warn!(
                    element_id = %binding.element_id,
                    event = %binding.event_name,
                    error = %e,
                    "generative fallback failed, tree unchanged"
                );
                FallbackOutcome::Failed
            }
        }
    }

    // =========================================================================
    // Repair
    // =========================================================================

    /// Producer handle for render-failure reports.
    pub fn repair_queue(&self) -> RepairQueue {
        self.repairs.clone()
    }

    /// Enqueue a repair directly.
    pub fn enqueue_repair(&self, request: RepairRequest) -> bool {
        self.repairs.enqueue(request)
    }

    /// Drain every queued repair in FIFO order, regenerating each broken
    /// node at Minimal tier and replacing it in place.
    pub async fn drain_repairs(&self) -> Vec<RepairOutcome> {
        let mut rx = self.repair_rx.lock().await;
        let mut outcomes = Vec::new();
        while let Ok(request) = rx.try_recv() {
            outcomes.push(self.repair_one(request).await);
        }
        outcomes
    }

    async fn repair_one(&self, request: RepairRequest) -> RepairOutcome {
        let element = TriggerElement {
            id: request.node_id.clone(),
            kind: request.element_kind.clone(),
            attributes: Attributes::new(),
        };
        // Repairs bypass the cache: an error context is not a reusable
        // interaction.
        let context = self.capture_context(
            TriggerCategory::ErrorFix,
            &element,
            &CaptureOptions {
                user_input: None,
                error_message: Some(request.error_message.clone()),
            },
        );
        match self.backends.fragments.generate_fragment(&context).await {
            Ok(generated) => {
                let placed = self.place(
                    vec![generated.fragment],
                    &PlacementRule::replace(request.node_id.clone()),
                );
                let replaced = matches!(placed, Placed::Spliced(SpliceTarget::InPlace));
                if !replaced {
                    tracing::warn!(
                        node_id = %request.node_id,
                        ?placed,
                        "repair did not replace in place"
                    );
                }
                RepairOutcome {
                    node_id: request.node_id,
                    replaced,
                }
            }
            Err(e) => {
                tracing::warn!(
                    node_id = %request.node_id,
                    error = %e,
                    "repair generation failed"
                );
                RepairOutcome {
                    node_id: request.node_id,
                    replaced: false,
                }
            }
        }
    }
}

/// Re-id fragments whose ids would collide with `tree` or with an earlier
/// fragment in the batch. For a `replace`, the target subtree's ids are
/// about to leave the tree and do not count as collisions, so a repaired
/// node may keep its id.
fn unique_fragments(
    tree: &ComponentTree,
    fragments: Vec<ComponentNode>,
    rule: &PlacementRule,
) -> Vec<ComponentNode> {
    let mut taken: HashSet<String> = tree
        .ids()
        .into_iter()
        .map(|id| id.as_str().to_owned())
        .collect();
    if rule.kind == PlacementKind::Replace {
        match tree.find_by_id(&rule.target) {
            Some(ChildNode::Component(target)) => {
                let mut freed = Vec::new();
                target.collect_ids(&mut freed);
                for id in freed {
                    taken.remove(id.as_str());
                }
            }
            Some(ChildNode::Placeholder(target)) => {
                taken.remove(target.id.as_str());
            }
            Some(ChildNode::Text(_)) | None => {}
        }
    }
    fragments
        .into_iter()
        .map(|fragment| {
            let collides = {
                let mut ids = Vec::new();
                fragment.collect_ids(&mut ids);
                ids.iter()
                    .any(|id| id.is_empty() || taken.contains(id.as_str()))
            };
            let fragment = if collides {
                tracing::warn!(
                    fragment_id = %fragment.id,
                    "fragment id already present, reassigning fresh ids"
                );
                with_fresh_ids(fragment)
            } else {
                fragment
            };
            {
                let mut ids = Vec::new();
                fragment.collect_ids(&mut ids);
                for id in ids {
                    taken.insert(id.as_str().to_owned());
                }
            }
            fragment
        })
        .collect()
}
