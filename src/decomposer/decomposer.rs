//! Splits an analyzed tree at the provider boundary.
//!
//! The walk starts at the root and follows the operator chain (each
//! operator's sequence child) down to the source. Every operator passed on
//! the way is deferred; the first `ProviderSupported` node met becomes the
//! provider query. If the source itself is not supported the provider query
//! is unconstrained and the local plan starts with a scan.
//!
//! Operators are met outermost first; the plan stores them innermost first,
//! which is the order rows flow through them.

use crate::classifier::{AnalyzedTree, RuleRegistry};
use crate::observability::{EngineMetrics, Event, Logger};

use super::capture::{capture_projection, CapturedSlot};
use super::plan::{Decomposition, DeferredOp, DeferredOperation, DeferredPlan, ProviderQuery};

/// Decomposition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecomposeOptions {
    /// Push supported parts of mixed selectors to the provider
    pub capture_projections: bool,
}

impl Default for DecomposeOptions {
    fn default() -> Self {
        Self {
            capture_projections: true,
        }
    }
}

/// Splits analyzed trees into provider query and deferred plan
pub struct Decomposer<'a> {
    registry: &'a RuleRegistry,
    options: DecomposeOptions,
    metrics: Option<&'a EngineMetrics>,
}

impl<'a> Decomposer<'a> {
    /// The registry is consulted only to check shapes synthesized by
    /// projection capture
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self {
            registry,
            options: DecomposeOptions::default(),
            metrics: None,
        }
    }

    pub fn with_options(mut self, options: DecomposeOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_capture(mut self, enabled: bool) -> Self {
        self.options.capture_projections = enabled;
        self
    }

    pub fn with_metrics(mut self, metrics: &'a EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Decomposes `analyzed`.
    ///
    /// Deterministic: the same analyzed tree always yields the same
    /// decomposition.
    pub fn decompose(&self, analyzed: &AnalyzedTree) -> Decomposition {
        let tree = analyzed.tree();
        let mut outer_first: Vec<DeferredOp> = Vec::new();
        let mut captures: Vec<CapturedSlot> = Vec::new();
        let mut provider_query = None;

        for id in tree.operator_chain() {
            if analyzed.classification(id).is_supported() {
                provider_query = Some(ProviderQuery::Subtree(tree.subtree(id)));
                break;
            }

            let node = tree.node(id);
            let origin = |operation: DeferredOperation| DeferredOp {
                origin: Some(id),
                tag: Some(analyzed.tag(id).clone()),
                operation,
            };

            if self.options.capture_projections && analyzed.is_absorbing(id) {
                if let Some(capture) = capture_projection(analyzed, id, self.registry) {
                    let slots = capture.slots.len().to_string();
                    let node_id = id.to_string();
                    Logger::emit(
                        Event::ProjectionCaptured,
                        &[("node", node_id.as_str()), ("slots", slots.as_str())],
                    );

                    outer_first.push(origin(DeferredOperation::Project {
                        selector: capture.selector,
                    }));
                    provider_query = Some(ProviderQuery::Subtree(capture.provider_query));
                    captures = capture.slots;
                    break;
                }
            }

            let lambda = node.children().get(1).map(|child| tree.subtree(*child));
            if let Some(operation) = DeferredOperation::lower(node.kind(), lambda) {
                outer_first.push(origin(operation));
            }
        }

        let provider_query = provider_query.unwrap_or_else(|| ProviderQuery::Unconstrained {
            source: tree.source_name().to_string(),
        });

        outer_first.reverse();
        let decomposition = Decomposition {
            provider_query,
            deferred_plan: DeferredPlan::new(outer_first),
            captures,
        };

        let deferred = decomposition.deferred_plan.len();
        if let Some(metrics) = self.metrics {
            metrics.record_decomposition(deferred as u64, decomposition.captures.len() as u64);
        }
        let deferred = deferred.to_string();
        let provider = if decomposition.is_unconstrained() {
            "unconstrained"
        } else {
            "subtree"
        };
        Logger::emit(
            Event::DecomposeComplete,
            &[("deferred_ops", deferred.as_str()), ("provider", provider)],
        );

        decomposition
    }
}
