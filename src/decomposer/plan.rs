//! Decomposition output: what the provider runs and what runs locally.

use std::fmt;

use serde::Serialize;

use crate::expr::{Expr, ExprKind, NodeId, ShapeTag, SortDirection};

use super::capture::CapturedSlot;

/// Part of the expression handed to the provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderQuery {
    /// A provider-supported subtree, executed as-is
    Subtree(Expr),
    /// Nothing translatable: fetch every row of `source`
    Unconstrained { source: String },
}

impl ProviderQuery {
    /// Expression the provider executes
    ///
    /// An unconstrained query is the bare source.
    pub fn to_expr(&self) -> Expr {
        match self {
            ProviderQuery::Subtree(expr) => expr.clone(),
            ProviderQuery::Unconstrained { source } => Expr::source(source.clone()),
        }
    }

    pub fn as_subtree(&self) -> Option<&Expr> {
        match self {
            ProviderQuery::Subtree(expr) => Some(expr),
            ProviderQuery::Unconstrained { .. } => None,
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        matches!(self, ProviderQuery::Unconstrained { .. })
    }
}

impl fmt::Display for ProviderQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderQuery::Subtree(expr) => write!(f, "{}", expr),
            ProviderQuery::Unconstrained { source } => write!(f, "{} (all rows)", source),
        }
    }
}

/// One locally evaluated sequence operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum DeferredOperation {
    /// Identity over the provider's rows
    Scan { source: String },
    /// Keeps rows for which the predicate lambda yields true
    Filter { predicate: Expr },
    /// Maps each row through the selector lambda
    Project { selector: Expr },
    /// Stable sort by the key lambda
    OrderBy { key: Expr, direction: SortDirection },
    Skip(usize),
    Take(usize),
    Distinct,
}

impl DeferredOperation {
    /// Lowers a sequence operator with its lambda argument, if it has one.
    ///
    /// Returns `None` for scalar kinds and for lambda operators given no
    /// lambda.
    pub fn lower(kind: &ExprKind, lambda: Option<Expr>) -> Option<Self> {
        let operation = match kind {
            ExprKind::Source { name } => DeferredOperation::Scan {
                source: name.clone(),
            },
            ExprKind::Filter => DeferredOperation::Filter { predicate: lambda? },
            ExprKind::Project => DeferredOperation::Project { selector: lambda? },
            ExprKind::OrderBy { direction } => DeferredOperation::OrderBy {
                key: lambda?,
                direction: *direction,
            },
            ExprKind::Skip { count } => DeferredOperation::Skip(*count),
            ExprKind::Take { count } => DeferredOperation::Take(*count),
            ExprKind::Distinct => DeferredOperation::Distinct,
            _ => return None,
        };
        Some(operation)
    }

    pub fn name(&self) -> &'static str {
        match self {
            DeferredOperation::Scan { .. } => "scan",
            DeferredOperation::Filter { .. } => "filter",
            DeferredOperation::Project { .. } => "project",
            DeferredOperation::OrderBy { .. } => "order_by",
            DeferredOperation::Skip(_) => "skip",
            DeferredOperation::Take(_) => "take",
            DeferredOperation::Distinct => "distinct",
        }
    }

    /// Whether the operation must see every input row before yielding
    pub fn is_blocking(&self) -> bool {
        matches!(self, DeferredOperation::OrderBy { .. })
    }
}

impl fmt::Display for DeferredOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeferredOperation::Scan { source } => write!(f, "scan {}", source),
            DeferredOperation::Filter { predicate } => write!(f, "filter {}", predicate),
            DeferredOperation::Project { selector } => write!(f, "project {}", selector),
            DeferredOperation::OrderBy { key, direction } => {
                write!(f, "order_by {} {}", key, direction.as_str())
            }
            DeferredOperation::Skip(n) => write!(f, "skip {}", n),
            DeferredOperation::Take(n) => write!(f, "take {}", n),
            DeferredOperation::Distinct => write!(f, "distinct"),
        }
    }
}

/// A deferred operation and the node it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferredOp {
    /// Originating node; `None` for operations not built from a tree
    pub origin: Option<NodeId>,
    pub tag: Option<ShapeTag>,
    pub operation: DeferredOperation,
}

impl DeferredOp {
    /// Operation not tied to any analyzed node
    pub fn detached(operation: DeferredOperation) -> Self {
        Self {
            origin: None,
            tag: None,
            operation,
        }
    }
}

impl From<DeferredOperation> for DeferredOp {
    fn from(operation: DeferredOperation) -> Self {
        Self::detached(operation)
    }
}

/// Ordered local operations, innermost (applied first) to outermost
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DeferredPlan {
    ops: Vec<DeferredOp>,
}

impl DeferredPlan {
    pub fn new(ops: Vec<DeferredOp>) -> Self {
        Self { ops }
    }

    /// Plan from bare operations, in application order
    pub fn from_operations(operations: impl IntoIterator<Item = DeferredOperation>) -> Self {
        Self::new(operations.into_iter().map(DeferredOp::from).collect())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeferredOp> {
        self.ops.iter()
    }

    pub fn operations(&self) -> impl Iterator<Item = &DeferredOperation> {
        self.ops.iter().map(|op| &op.operation)
    }

    /// Same operations applied in the opposite order
    pub fn reversed(&self) -> Self {
        Self::new(self.ops.iter().rev().cloned().collect())
    }

    /// Lowers a whole sequence expression into its source name and a plan.
    ///
    /// The plan starts at the source's rows and does not include a scan.
    /// Returns `None` if `expr` is not a well-formed operator chain.
    pub fn lower_sequence(expr: &Expr) -> Option<(String, DeferredPlan)> {
        let mut outer_first = Vec::new();
        let mut current = expr;

        loop {
            match current.kind() {
                ExprKind::Source { name } => {
                    outer_first.reverse();
                    return Some((name.clone(), DeferredPlan::from_operations(outer_first)));
                }
                kind if kind.is_sequence() => {
                    let lambda = current.children().get(1).cloned();
                    outer_first.push(DeferredOperation::lower(kind, lambda)?);
                    current = current.children().first()?;
                }
                _ => return None,
            }
        }
    }
}

impl<'a> IntoIterator for &'a DeferredPlan {
    type Item = &'a DeferredOp;
    type IntoIter = std::slice::Iter<'a, DeferredOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Result of splitting an analyzed tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decomposition {
    pub provider_query: ProviderQuery,
    pub deferred_plan: DeferredPlan,
    /// Slots pushed down by projection capture, if any
    pub captures: Vec<CapturedSlot>,
}

impl Decomposition {
    /// Nothing is evaluated locally
    pub fn is_fully_pushed_down(&self) -> bool {
        self.deferred_plan.is_empty()
    }

    pub fn is_unconstrained(&self) -> bool {
        self.provider_query.is_unconstrained()
    }
}
