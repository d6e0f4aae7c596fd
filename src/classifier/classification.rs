//! Classification verdicts and the classification-annotated tree

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expr::{ExprTree, NodeId, ShapeTag};

/// Verdict attached to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The node and its whole subtree can be translated by the provider
    ProviderSupported,
    /// The node's own shape cannot be translated; its children can
    RequiresDeferral,
    /// Supported at this node, but at least one descendant needs deferral
    Mixed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ProviderSupported => "PROVIDER_SUPPORTED",
            Classification::RequiresDeferral => "REQUIRES_DEFERRAL",
            Classification::Mixed => "MIXED",
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Classification::ProviderSupported)
    }

    /// Combination law.
    ///
    /// Any non-supported child makes the node `Mixed`; otherwise the node's
    /// own translatability decides between `ProviderSupported` and
    /// `RequiresDeferral`.
    pub fn combine(translatable: bool, children: &[Classification]) -> Self {
        if children.iter().any(|c| !c.is_supported()) {
            Classification::Mixed
        } else if translatable {
            Classification::ProviderSupported
        } else {
            Classification::RequiresDeferral
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a node's rule was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Rule registered under the node's full tag
    Exact,
    /// Rule registered under the unqualified kind
    KindFallback,
    /// No rule; resolved by the conservative default
    Unregistered,
}

/// Analysis result for one node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAnalysis {
    pub classification: Classification,
    pub tag: ShapeTag,
    pub rule: String,
    pub resolution: Resolution,
    /// Rule can split this node, pushing its supported parts down
    pub absorbs: bool,
}

/// Expression tree plus one `NodeAnalysis` per node.
///
/// Every node has exactly one classification and no `ProviderSupported`
/// node has a non-supported child.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedTree {
    tree: ExprTree,
    entries: Vec<NodeAnalysis>,
}

impl AnalyzedTree {
    /// Assembles an analyzed tree; `entries` is indexed by `NodeId`
    pub(crate) fn new(tree: ExprTree, entries: Vec<NodeAnalysis>) -> Self {
        debug_assert_eq!(tree.len(), entries.len());
        Self { tree, entries }
    }

    pub fn tree(&self) -> &ExprTree {
        &self.tree
    }

    pub fn analysis(&self, id: NodeId) -> &NodeAnalysis {
        &self.entries[id.index()]
    }

    pub fn classification(&self, id: NodeId) -> Classification {
        self.analysis(id).classification
    }

    pub fn tag(&self, id: NodeId) -> &ShapeTag {
        &self.analysis(id).tag
    }

    pub fn is_absorbing(&self, id: NodeId) -> bool {
        self.analysis(id).absorbs
    }

    pub fn root_classification(&self) -> Classification {
        self.classification(self.tree.root())
    }

    /// Classification per node, in pre-order
    pub fn classifications(&self) -> impl Iterator<Item = (NodeId, Classification)> + '_ {
        self.tree
            .iter()
            .map(|node| (node.id(), self.classification(node.id())))
    }

    /// Nodes resolved by the conservative default
    pub fn unregistered(&self) -> Vec<NodeId> {
        self.tree
            .iter()
            .map(|node| node.id())
            .filter(|id| self.analysis(*id).resolution == Resolution::Unregistered)
            .collect()
    }

    pub fn into_tree(self) -> ExprTree {
        self.tree
    }
}
