//! Explain output for a decomposition
//!
//! Produces deterministic, human-readable explain output.

use std::fmt;

use serde::Serialize;

use crate::classifier::{AnalyzedTree, Resolution};

use super::plan::Decomposition;

/// One annotated tree node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainNode {
    pub id: usize,
    pub depth: usize,
    pub tag: String,
    pub classification: String,
    pub rule: String,
    /// Resolved by the conservative default
    pub unregistered: bool,
}

/// Explain output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explain {
    /// Root classification
    pub root: String,
    /// Nodes in pre-order
    pub nodes: Vec<ExplainNode>,
    /// Provider query description
    pub provider_query: String,
    /// Deferred operations in application order
    pub deferred: Vec<String>,
    /// `slot = expression` for each captured slot
    pub captures: Vec<String>,
}

impl Explain {
    pub fn new(analyzed: &AnalyzedTree, decomposition: &Decomposition) -> Self {
        let tree = analyzed.tree();
        let depths = tree.depths();

        let nodes = tree
            .iter()
            .map(|node| {
                let id = node.id();
                let analysis = analyzed.analysis(id);
                ExplainNode {
                    id: id.index(),
                    depth: depths[id.index()],
                    tag: analysis.tag.to_string(),
                    classification: analysis.classification.as_str().to_string(),
                    rule: analysis.rule.clone(),
                    unregistered: analysis.resolution == Resolution::Unregistered,
                }
            })
            .collect();

        let deferred = decomposition
            .deferred_plan
            .iter()
            .map(|op| match op.origin {
                Some(origin) => format!("{} [from {}]", op.operation, origin),
                None => op.operation.to_string(),
            })
            .collect();

        let captures = decomposition
            .captures
            .iter()
            .map(|slot| format!("{} = {}", slot.name, slot.expr))
            .collect();

        Self {
            root: analyzed.root_classification().as_str().to_string(),
            nodes,
            provider_query: decomposition.provider_query.to_string(),
            deferred,
            captures,
        }
    }
}

impl Decomposition {
    /// Explain output for this decomposition of `analyzed`
    pub fn explain(&self, analyzed: &AnalyzedTree) -> Explain {
        Explain::new(analyzed, self)
    }
}

impl fmt::Display for Explain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== DEFERRAL PLAN ===")?;
        writeln!(f, "Root: {}", self.root)?;

        writeln!(f, "Classification:")?;
        for node in &self.nodes {
            write!(
                f,
                "  {:indent$}#{} {} {} ({})",
                "",
                node.id,
                node.tag,
                node.classification,
                node.rule,
                indent = node.depth * 2
            )?;
            if node.unregistered {
                write!(f, " UNREGISTERED")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "Provider Query: {}", self.provider_query)?;

        if self.deferred.is_empty() {
            writeln!(f, "Deferred: none")?;
        } else {
            writeln!(f, "Deferred:")?;
            for (i, op) in self.deferred.iter().enumerate() {
                writeln!(f, "  {}. {}", i + 1, op)?;
            }
        }

        if !self.captures.is_empty() {
            writeln!(f, "Captures:")?;
            for capture in &self.captures {
                writeln!(f, "  - {}", capture)?;
            }
        }

        Ok(())
    }
}
