//! The staged generation pipeline.
//!
//! Five stages run strictly in order, each reported as a [`PipelineStep`]:
//!
//! 1. analyze the request into primitives
//! 2. check which primitives the catalog can already render
//! 3. acquire the ones it can't
//! 4. synthesize component JSON
//! 5. assemble and validate fragments
//!
//! Backend-facing stages retry on failure (fixed small backoff) before the
//! stage is marked failed; a failed stage stops the run and leaves later
//! steps `Pending`. Assembly never fails: output that won't parse as
//! components degrades to a single error card carrying the raw text, and
//! the report still counts as a success — a rendered apology beats a blank
//! region.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use burgeon_types::{ChildNode, ComponentNode, ComponentNodeBuilder, NodeId};

use crate::backend::{Analyzer, GenResult, PrimitiveCatalog, Synthesizer};

/// How often a backend-facing stage is attempted before failing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

/// Lifecycle of one pipeline step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One stage's progress, suitable for rendering as live feedback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    pub index: usize,
    pub description: String,
    pub status: StepStatus,
    /// Human-readable outcome summary, set when the step completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// How many extra attempts the step needed.
    pub retry_count: u32,
}

impl PipelineStep {
    fn new(index: usize, description: &str) -> Self {
        Self {
            index,
            description: description.to_string(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            retry_count: 0,
        }
    }

    fn complete(&mut self, result: impl Into<String>) {
        self.status = StepStatus::Completed;
        self.result = Some(result.into());
    }
}

/// Outcome of a pipeline run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub fragments: Vec<ComponentNode>,
    /// True whenever assembly produced renderable fragments, including the
    /// degraded error card.
    pub success: bool,
    /// True when assembly fell back to the error card.
    pub degraded: bool,
    pub steps: Vec<PipelineStep>,
}

const STAGE_DESCRIPTIONS: [&str; 5] = [
    "analyze request",
    "check primitive availability",
    "acquire missing primitives",
    "synthesize components",
    "assemble fragments",
];

/// The staged request-to-fragments pipeline.
pub struct GenerationPipeline {
    analyzer: Arc<dyn Analyzer>,
    synthesizer: Arc<dyn Synthesizer>,
    catalog: Arc<dyn PrimitiveCatalog>,
    retry: RetryPolicy,
}

impl GenerationPipeline {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        synthesizer: Arc<dyn Synthesizer>,
        catalog: Arc<dyn PrimitiveCatalog>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            analyzer,
            synthesizer,
            catalog,
            retry,
        }
    }

    /// Run all five stages for a freeform request.
    pub async fn run(&self, request: &str) -> PipelineReport {
        let mut steps: Vec<PipelineStep> = STAGE_DESCRIPTIONS
            .iter()
            .enumerate()
            .map(|(i, d)| PipelineStep::new(i, d))
            .collect();

        // Stage 1: analysis
        let known_kinds = self.catalog.known_kinds();
        let analysis = {
            let analyzer = Arc::clone(&self.analyzer);
            let request = request.to_string();
            let kinds = known_kinds.clone();
            run_stage(&mut steps[0], &self.retry, move || {
                let analyzer = Arc::clone(&analyzer);
                let request = request.clone();
                let kinds = kinds.clone();
                async move { analyzer.analyze(&request, &kinds).await }
            })
            .await
        };
        let Some(analysis) = analysis else {
            return failed(steps);
        };
        steps[0].result = Some(format!(
            "{} required, {} custom, {} composite",
            analysis.required_primitives.len(),
            analysis.custom_primitives.len(),
            analysis.composite_primitives.len()
        ));

        // Stage 2: availability. Pure catalog lookups; cannot fail.
        steps[1].status = StepStatus::Running;
        let candidates = analysis.catalog_candidates();
        let mut available: Vec<String> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        for kind in &candidates {
            if self.catalog.is_available(kind) {
                available.push(kind.clone());
            } else {
                missing.push(kind.clone());
            }
        }
        // Customs are never in the catalog; they always go to acquisition.
        for kind in &analysis.custom_primitives {
            if !missing.contains(kind) && !available.contains(kind) {
                missing.push(kind.clone());
            }
        }
        steps[1].complete(format!(
            "{} available, {} missing",
            available.len(),
            missing.len()
        ));

        // Stage 3: acquisition
        if missing.is_empty() {
            steps[2].complete("nothing to acquire");
        } else {
            let outcomes = {
                let catalog = Arc::clone(&self.catalog);
                let missing = missing.clone();
                run_stage(&mut steps[2], &self.retry, move || {
                    let catalog = Arc::clone(&catalog);
                    let missing = missing.clone();
                    async move { catalog.acquire(&missing).await }
                })
                .await
            };
            let Some(outcomes) = outcomes else {
                return failed(steps);
            };
            let mut acquired = 0usize;
            for outcome in &outcomes {
                if outcome.success {
                    acquired += 1;
                    available.push(outcome.name.clone());
                } else {
                    tracing::warn!(
                        kind = %outcome.name,
                        error = outcome.error.as_deref().unwrap_or("unspecified"),
                        "primitive acquisition failed"
                    );
                }
            }
            steps[2].result = Some(format!("acquired {acquired}/{} primitives", outcomes.len()));
        }

        // Stage 4: synthesis
        let raw = {
            let synthesizer = Arc::clone(&self.synthesizer);
            let request = request.to_string();
            let analysis = analysis.clone();
            let available = available.clone();
            run_stage(&mut steps[3], &self.retry, move || {
                let synthesizer = Arc::clone(&synthesizer);
                let request = request.clone();
                let analysis = analysis.clone();
                let available = available.clone();
                async move { synthesizer.synthesize(&request, &analysis, &available).await }
            })
            .await
        };
        let Some(raw) = raw else {
            return failed(steps);
        };
        steps[3].result = Some(format!("{} bytes of output", raw.len()));

        // Stage 5: assembly. Never fails; unparseable output degrades.
        steps[4].status = StepStatus::Running;
        let (fragments, degraded) = assemble(&raw);
        if degraded {
            tracing::warn!(bytes = raw.len(), "synthesis output unparseable, degrading");
            steps[4].complete("degraded to fallback card");
        } else {
            steps[4].complete(format!("{} fragment(s)", fragments.len()));
        }

        PipelineReport {
            fragments,
            success: true,
            degraded,
            steps,
        }
    }
}

/// A run that stopped at a failed stage: no fragments, later steps pending.
fn failed(steps: Vec<PipelineStep>) -> PipelineReport {
    PipelineReport {
        fragments: Vec::new(),
        success: false,
        degraded: false,
        steps,
    }
}

/// Drive one fallible stage through the retry policy.
///
/// Returns the value on success; on exhaustion marks the step failed with
/// the last error and returns `None`.
async fn run_stage<T, F, Fut>(step: &mut PipelineStep, retry: &RetryPolicy, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = GenResult<T>>,
{
    step.status = StepStatus::Running;
    let mut last_error = None;
    for attempt in 0..retry.attempts.max(1) {
        if attempt > 0 {
            step.retry_count += 1;
            tokio::time::sleep(retry.backoff).await;
        }
        match op().await {
            Ok(value) => {
                step.status = StepStatus::Completed;
                return Some(value);
            }
            Err(e) => {
                tracing::warn!(
                    stage = %step.description,
                    attempt = attempt + 1,
                    error = %e,
                    "pipeline stage attempt failed"
                );
                last_error = Some(e);
            }
        }
    }
    step.status = StepStatus::Failed;
    step.error = last_error.map(|e| e.to_string());
    None
}

// ============================================================================
// Assembly
// ============================================================================

/// Parse raw synthesis output into fragments, or degrade to an error card.
///
/// Returns the fragments and whether degradation happened. Parsed fragments
/// get their ids checked: empty or colliding ids are reassigned so the tree
/// uniqueness invariant survives whatever the backend emitted.
pub(crate) fn assemble(raw: &str) -> (Vec<ComponentNode>, bool) {
    match parse_components(raw) {
        Some(mut fragments) => {
            ensure_unique_ids(&mut fragments);
            (fragments, false)
        }
        None => (vec![degraded_card(raw)], true),
    }
}

/// Try progressively more forgiving readings of the raw output:
/// the whole text, a fenced code block, the outermost `[...]`, the
/// outermost `{...}`.
fn parse_components(raw: &str) -> Option<Vec<ComponentNode>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(parsed) = parse_candidate(trimmed) {
        return Some(parsed);
    }
    if let Some(block) = fenced_block(trimmed) {
        if let Some(parsed) = parse_candidate(block) {
            return Some(parsed);
        }
    }
    if let Some(slice) = delimited_slice(trimmed, '[', ']') {
        if let Some(parsed) = parse_candidate(slice) {
            return Some(parsed);
        }
    }
    if let Some(slice) = delimited_slice(trimmed, '{', '}') {
        if let Some(parsed) = parse_candidate(slice) {
            return Some(parsed);
        }
    }
    None
}

fn parse_candidate(s: &str) -> Option<Vec<ComponentNode>> {
    if let Ok(list) = serde_json::from_str::<Vec<ComponentNode>>(s) {
        return Some(list);
    }
    if let Ok(single) = serde_json::from_str::<ComponentNode>(s) {
        return Some(vec![single]);
    }
    None
}

/// The body of the first ``` fence, language tag line skipped.
fn fenced_block(s: &str) -> Option<&str> {
    let start = s.find("```")?;
    let after = &s[start + 3..];
    let body_start = after.find('\n')? + 1;
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn delimited_slice(s: &str, open: char, close: char) -> Option<&str> {
    let start = s.find(open)?;
    let end = s.rfind(close)?;
    (end > start).then(|| &s[start..=end])
}

/// The attribute marking a degraded or repair-worthy card.
const VARIANT_ATTR: &str = "variant";
const ERROR_VARIANT: &str = "error";

/// Build the fallback card for output that could not be parsed.
pub(crate) fn degraded_card(raw: &str) -> ComponentNode {
    ComponentNodeBuilder::new("card")
        .attr(VARIANT_ATTR, ERROR_VARIANT)
        .attr("title", "Generation needs another try")
        .text(raw.trim())
        .build()
}

/// Whether a node is a degraded error card.
pub(crate) fn is_error_card(node: &ComponentNode) -> bool {
    node.kind == "card" && node.attr_str(VARIANT_ATTR) == Some(ERROR_VARIANT)
}

/// Reassign empty or duplicate ids across a fragment list.
fn ensure_unique_ids(fragments: &mut [ComponentNode]) {
    let mut seen: HashSet<String> = HashSet::new();
    for fragment in fragments {
        visit_ids(fragment, &mut seen);
    }
}

fn visit_ids(node: &mut ComponentNode, seen: &mut HashSet<String>) {
    claim(&mut node.id, seen);
    for child in &mut node.children {
        match child {
            ChildNode::Component(c) => visit_ids(c, seen),
            ChildNode::Placeholder(p) => claim(&mut p.id, seen),
            ChildNode::Text(_) => {}
        }
    }
}

fn claim(id: &mut NodeId, seen: &mut HashSet<String>) {
    if id.is_empty() || !seen.insert(id.as_str().to_string()) {
        *id = NodeId::fresh();
        seen.insert(id.as_str().to_string());
    }
}

/// Clone-with-fresh-ids for re-placing a cached fragment: the cached copy
/// keeps its ids, but every placement must mint new ones or the second
/// placement would collide with the first.
pub(crate) fn with_fresh_ids(mut node: ComponentNode) -> ComponentNode {
    refresh(&mut node);
    node
}

fn refresh(node: &mut ComponentNode) {
    node.id = NodeId::fresh();
    for child in &mut node.children {
        match child {
            ChildNode::Component(c) => refresh(c),
            ChildNode::Placeholder(p) => p.id = NodeId::fresh(),
            ChildNode::Text(_) => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
