//! Bottom-up classification walk.
//!
//! Nodes are visited children-first. For each node the matching rule is
//! applied to the node's payload and its children's classifications, and the
//! verdict is checked against the combination law before it is recorded:
//!
//! - `ProviderSupported` requires every child to be `ProviderSupported`
//! - `Mixed` requires at least one child that is not `ProviderSupported`
//!
//! A violation stops the pass with `ClassificationInconsistency`.

use crate::expr::{ExprTree, NodeId, ShapeTag};
use crate::observability::{EngineMetrics, Event, Logger};

use super::classification::{AnalyzedTree, Classification, NodeAnalysis, Resolution};
use super::errors::{ClassifierError, ClassifierResult};
use super::registry::RuleRegistry;
use super::rules::RuleInput;

/// Classifies expression trees against a rule registry
pub struct Classifier<'a> {
    registry: &'a RuleRegistry,
    metrics: Option<&'a EngineMetrics>,
    log_unregistered: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(registry: &'a RuleRegistry) -> Self {
        Self {
            registry,
            metrics: None,
            log_unregistered: true,
        }
    }

    pub fn with_metrics(mut self, metrics: &'a EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Enables or disables the `SHAPE_UNREGISTERED` warning
    pub fn log_unregistered(mut self, enabled: bool) -> Self {
        self.log_unregistered = enabled;
        self
    }

    /// Classifies every node of `tree`.
    ///
    /// Pure function of the tree and the registry: classifying the same
    /// tree twice yields identical results.
    pub fn classify(&self, tree: &ExprTree) -> ClassifierResult<AnalyzedTree> {
        let node_count = tree.len().to_string();
        Logger::emit(Event::ClassifyBegin, &[("nodes", node_count.as_str())]);

        let main_projection = tree.main_projection();
        let mut entries: Vec<Option<NodeAnalysis>> = vec![None; tree.len()];
        let mut unregistered = 0u64;

        for id in tree.post_order() {
            let node = tree.node(id);
            let tag = ShapeTag::of(node.kind(), Some(id) == main_projection);
            let resolved = self.registry.resolve(&tag);

            // Post-order guarantees every child is already classified
            let children: Vec<Classification> = node
                .children()
                .iter()
                .map(|child| {
                    entries[child.index()]
                        .as_ref()
                        .map(|entry| entry.classification)
                        .unwrap_or(Classification::RequiresDeferral)
                })
                .collect();

            let verdict = resolved.rule.classify(&RuleInput {
                tag: &tag,
                kind: node.kind(),
                children: &children,
            });

            if let Err(err) = check_combination_law(id, &tag, resolved.rule.name(), verdict, &children) {
                if let Some(metrics) = self.metrics {
                    metrics.increment_inconsistencies();
                }
                let (node, tag) = (id.to_string(), tag.to_string());
                Logger::emit(
                    Event::ClassificationInconsistency,
                    &[
                        ("node", node.as_str()),
                        ("rule", err.rule()),
                        ("tag", tag.as_str()),
                        ("verdict", verdict.as_str()),
                    ],
                );
                return Err(err);
            }

            if resolved.resolution == Resolution::Unregistered {
                unregistered += 1;
                if self.log_unregistered {
                    let (node, tag) = (id.to_string(), tag.to_string());
                    Logger::emit(
                        Event::ShapeUnregistered,
                        &[("node", node.as_str()), ("tag", tag.as_str())],
                    );
                }
            }

            entries[id.index()] = Some(NodeAnalysis {
                classification: verdict,
                tag,
                rule: resolved.rule.name().to_string(),
                resolution: resolved.resolution,
                absorbs: resolved.rule.absorbs(),
            });
        }

        let entries: Vec<NodeAnalysis> = entries.into_iter().flatten().collect();
        let analyzed = AnalyzedTree::new(tree.clone(), entries);

        if let Some(metrics) = self.metrics {
            metrics.record_classification(tree.len() as u64, unregistered);
        }
        let unregistered = unregistered.to_string();
        Logger::emit(
            Event::ClassifyComplete,
            &[
                ("nodes", node_count.as_str()),
                ("root", analyzed.root_classification().as_str()),
                ("unregistered", unregistered.as_str()),
            ],
        );

        Ok(analyzed)
    }
}

/// Validates a verdict against its children's classifications
fn check_combination_law(
    id: NodeId,
    tag: &ShapeTag,
    rule: &str,
    verdict: Classification,
    children: &[Classification],
) -> ClassifierResult<()> {
    let all_supported = children.iter().all(Classification::is_supported);

    let consistent = match verdict {
        Classification::ProviderSupported => all_supported,
        Classification::Mixed => !all_supported,
        Classification::RequiresDeferral => true,
    };

    if consistent {
        Ok(())
    } else {
        Err(ClassifierError::inconsistency(id, tag, rule, verdict, children))
    }
}
