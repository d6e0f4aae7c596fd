//! Projection capture.
//!
//! A selector that is only partly translatable still has provider-supported
//! pieces: `x => double(x.age + 1)` can have `x.age + 1` computed by the
//! provider while `double` runs locally. Capture rewrites an absorbing
//! projection into:
//!
//! - a provider projection building a row of captured slots
//!   (`x => { _c0: (x.age + 1) }`)
//! - a local selector reading those slots (`x => double(x._c0)`)
//!
//! Capture is abandoned if the local selector would still need the original
//! row, or if the registry does not accept the synthesized shapes. The right
//! operand of `&&` and `||` is never captured, since slots are evaluated for
//! every row.

use serde::Serialize;

use crate::classifier::{AnalyzedTree, Classification, RuleInput, RuleRegistry};
use crate::expr::{BinaryOp, Expr, ExprKind, NodeId, ShapeTag};

/// Prefix of captured slot names
pub const SLOT_PREFIX: &str = "_c";

/// A sub-expression computed by the provider under a slot name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapturedSlot {
    pub name: String,
    pub expr: Expr,
}

/// Rewritten halves of a captured projection
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ProjectionCapture {
    pub provider_query: Expr,
    pub selector: Expr,
    pub slots: Vec<CapturedSlot>,
}

/// Attempts capture on the `Project` node `project`
pub(crate) fn capture_projection(
    analyzed: &AnalyzedTree,
    project: NodeId,
    registry: &RuleRegistry,
) -> Option<ProjectionCapture> {
    let tree = analyzed.tree();
    let node = tree.node(project);
    if !matches!(node.kind(), ExprKind::Project) {
        return None;
    }

    let (source, lambda) = match node.children() {
        [source, lambda] => (*source, *lambda),
        _ => return None,
    };
    if !analyzed.classification(source).is_supported()
        || analyzed.classification(lambda).is_supported()
    {
        return None;
    }

    let lambda_node = tree.node(lambda);
    let param = match lambda_node.kind() {
        ExprKind::Lambda { param } => param,
        _ => return None,
    };
    let body = *lambda_node.children().first()?;

    let mut rewriter = Rewriter {
        analyzed,
        param,
        slots: Vec::new(),
        needs_row: false,
    };
    let local_body = rewriter.rewrite(body);
    if rewriter.needs_row || rewriter.slots.is_empty() {
        return None;
    }
    if !synthesized_shapes_supported(registry, param, &rewriter.slots) {
        return None;
    }

    let fields = rewriter
        .slots
        .iter()
        .map(|slot| (slot.name.clone(), slot.expr.clone()))
        .collect();
    let provider_query = tree
        .subtree(source)
        .project(Expr::lambda(param.clone(), Expr::construct(fields)));

    Some(ProjectionCapture {
        provider_query,
        selector: Expr::lambda(param.clone(), local_body),
        slots: rewriter.slots,
    })
}

struct Rewriter<'a> {
    analyzed: &'a AnalyzedTree,
    param: &'a str,
    slots: Vec<CapturedSlot>,
    /// The local body still reads the original row
    needs_row: bool,
}

impl Rewriter<'_> {
    fn rewrite(&mut self, id: NodeId) -> Expr {
        let tree = self.analyzed.tree();
        let node = tree.node(id);

        if let ExprKind::Parameter { name } = node.kind() {
            if name == self.param {
                self.needs_row = true;
            }
            return tree.subtree(id);
        }

        if self.analyzed.classification(id).is_supported() {
            let expr = tree.subtree(id);
            if !expr.references_param(self.param) {
                return expr;
            }
            let slot = self.slot_for(expr);
            return Expr::param(self.param).member(slot);
        }

        // Slots are computed for every row, so a short-circuited operand
        // must stay local
        if let ExprKind::Binary {
            op: op @ (BinaryOp::And | BinaryOp::Or),
        } = node.kind()
        {
            if let [lhs, rhs] = node.children() {
                let lhs = self.rewrite(*lhs);
                let rhs = self.keep_local(*rhs);
                return Expr::binary(*op, lhs, rhs);
            }
        }

        let children = node
            .children()
            .iter()
            .map(|child| self.rewrite(*child))
            .collect();
        Expr::new(node.kind().clone(), children)
    }

    /// Copies `id` unchanged into the local body
    fn keep_local(&mut self, id: NodeId) -> Expr {
        let expr = self.analyzed.tree().subtree(id);
        if expr.references_param(self.param) {
            self.needs_row = true;
        }
        expr
    }

    /// Slot name for `expr`; equal expressions share a slot
    fn slot_for(&mut self, expr: Expr) -> String {
        if let Some(slot) = self.slots.iter().find(|slot| slot.expr == expr) {
            return slot.name.clone();
        }
        let name = format!("{}{}", SLOT_PREFIX, self.slots.len());
        self.slots.push(CapturedSlot {
            name: name.clone(),
            expr,
        });
        name
    }
}

/// The provider projection must itself classify as supported
fn synthesized_shapes_supported(
    registry: &RuleRegistry,
    param: &str,
    slots: &[CapturedSlot],
) -> bool {
    let construct = ExprKind::Construct {
        fields: slots.iter().map(|slot| slot.name.clone()).collect(),
    };
    let lambda = ExprKind::Lambda {
        param: param.to_string(),
    };

    accepts(registry, &construct, false, slots.len())
        && accepts(registry, &lambda, false, 1)
        && accepts(registry, &ExprKind::Project, true, 2)
}

fn accepts(registry: &RuleRegistry, kind: &ExprKind, main_projection: bool, arity: usize) -> bool {
    let tag = ShapeTag::of(kind, main_projection);
    let children = vec![Classification::ProviderSupported; arity];
    registry
        .lookup(&tag)
        .classify(&RuleInput {
            tag: &tag,
            kind,
            children: &children,
        })
        .is_supported()
}
