//! Arena form of an expression tree.
//!
//! `ExprTree::new` flattens an owned `Expr` into a vector of nodes indexed
//! by `NodeId` (pre-order), validating structure on the way. Node identity
//! is what classification results are keyed by.

use std::fmt;

use serde::Serialize;

use super::ast::{Expr, ExprKind};
use super::errors::{TreeError, TreeResult};

/// Identity of a node within one `ExprTree` (pre-order index)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node held by the arena
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    kind: ExprKind,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// What a child position requires
#[derive(Clone, Copy)]
enum Slot {
    Sequence,
    Lambda,
    Scalar,
}

impl Slot {
    fn describe(self) -> &'static str {
        match self {
            Slot::Sequence => "a row sequence",
            Slot::Lambda => "a lambda",
            Slot::Scalar => "a scalar expression",
        }
    }

    fn accepts(self, kind: &ExprKind) -> bool {
        match self {
            Slot::Sequence => kind.is_sequence(),
            Slot::Lambda => matches!(kind, ExprKind::Lambda { .. }),
            Slot::Scalar => !kind.is_sequence() && !matches!(kind, ExprKind::Lambda { .. }),
        }
    }
}

/// Checks arity and child forms of a single node
fn validate_node(position: usize, expr: &Expr) -> TreeResult<()> {
    let kind = &expr.kind;
    let name = kind.kind_name();
    let actual = expr.children.len();

    let slots: Vec<Slot> = match kind {
        ExprKind::Source { .. } | ExprKind::Parameter { .. } | ExprKind::Constant { .. } => {
            Vec::new()
        }
        ExprKind::Filter | ExprKind::Project | ExprKind::OrderBy { .. } => {
            vec![Slot::Sequence, Slot::Lambda]
        }
        ExprKind::Skip { .. } | ExprKind::Take { .. } | ExprKind::Distinct => {
            vec![Slot::Sequence]
        }
        ExprKind::Lambda { .. } | ExprKind::Member { .. } | ExprKind::Unary { .. } => {
            vec![Slot::Scalar]
        }
        ExprKind::Binary { .. } => vec![Slot::Scalar, Slot::Scalar],
        ExprKind::Call { .. } => vec![Slot::Scalar; actual],
        ExprKind::Construct { fields } => vec![Slot::Scalar; fields.len()],
    };

    if slots.len() != actual {
        return Err(TreeError::invalid_arity(
            position,
            name,
            &slots.len().to_string(),
            actual,
        ));
    }

    for (slot, child) in slots.iter().zip(&expr.children) {
        if !slot.accepts(&child.kind) {
            return Err(TreeError::unexpected_child(
                position,
                name,
                slot.describe(),
                child.kind.kind_name(),
            ));
        }
    }

    Ok(())
}

/// Validated, immutable arena tree
#[derive(Debug, Clone, PartialEq)]
pub struct ExprTree {
    nodes: Vec<Node>,
    /// `Source` at the bottom of the operator chain
    source: NodeId,
}

impl ExprTree {
    /// Flattens and validates an expression.
    ///
    /// The root must produce a row sequence.
    pub fn new(expr: Expr) -> TreeResult<Self> {
        if !expr.kind.is_sequence() {
            return Err(TreeError::invalid_root(expr.kind.kind_name()));
        }

        let mut nodes: Vec<Node> = Vec::with_capacity(expr.node_count());
        let mut stack: Vec<(Expr, Option<NodeId>)> = vec![(expr, None)];

        while let Some((expr, parent)) = stack.pop() {
            let id = NodeId(nodes.len());
            validate_node(id.0, &expr)?;

            if let Some(parent) = parent {
                nodes[parent.0].children.push(id);
            }

            let Expr { kind, children } = expr;
            nodes.push(Node {
                id,
                kind,
                children: Vec::with_capacity(children.len()),
                parent,
            });

            // Reverse so the first child is visited (and numbered) first
            for child in children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }

        // Validation guarantees the chain of first children ends at a Source
        let mut source = NodeId(0);
        while !matches!(nodes[source.0].kind, ExprKind::Source { .. }) {
            match nodes[source.0].children.first() {
                Some(child) => source = *child,
                None => {
                    return Err(TreeError::invalid_arity(
                        source.0,
                        nodes[source.0].kind.kind_name(),
                        "at least 1",
                        0,
                    ))
                }
            }
        }

        Ok(Self { nodes, source })
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The `Source` node rows originate from
    pub fn source(&self) -> NodeId {
        self.source
    }

    /// Name of the row source
    pub fn source_name(&self) -> &str {
        match &self.node(self.source).kind {
            ExprKind::Source { name } => name,
            _ => "",
        }
    }

    /// Returns the node with the given id.
    ///
    /// Ids are only meaningful for the tree that issued them.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Returns the node with the given id if it belongs to this tree
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Node ids in post-order (children before parent)
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root(), false)];

        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            for child in self.node(id).children.iter().rev() {
                stack.push((*child, false));
            }
        }

        order
    }

    /// Depth of every node, indexed by id (root is 0)
    pub fn depths(&self) -> Vec<usize> {
        let mut depths = vec![0; self.nodes.len()];
        // Parents precede children in pre-order
        for node in &self.nodes {
            if let Some(parent) = node.parent {
                depths[node.id.0] = depths[parent.0] + 1;
            }
        }
        depths
    }

    /// Rebuilds the owned expression rooted at `id`
    pub fn subtree(&self, id: NodeId) -> Expr {
        let node = self.node(id);
        Expr::new(
            node.kind.clone(),
            node.children.iter().map(|c| self.subtree(*c)).collect(),
        )
    }

    /// Returns the owned expression for the whole tree
    pub fn to_expr(&self) -> Expr {
        self.subtree(self.root())
    }

    /// Sequence children of operators, from the root down to the source
    pub fn operator_chain(&self) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut current = Some(self.root());

        while let Some(id) = current {
            chain.push(id);
            let node = self.node(id);
            current = match node.kind {
                ExprKind::Source { .. } => None,
                _ => node.children.first().copied(),
            };
        }

        chain
    }

    /// The outermost `Project` on the operator chain
    pub fn main_projection(&self) -> Option<NodeId> {
        self.operator_chain()
            .into_iter()
            .find(|id| matches!(self.node(*id).kind, ExprKind::Project))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::errors::TreeErrorCode;

    fn query() -> Expr {
        Expr::source("numbers")
            .filter(Expr::lambda(
                "x",
                Expr::equals(
                    Expr::rem(Expr::param("x"), Expr::constant(2)),
                    Expr::constant(0),
                ),
            ))
            .project(Expr::lambda(
                "x",
                Expr::call("double", vec![Expr::param("x")]),
            ))
            .take(10)
    }

    #[test]
    fn test_preorder_ids() {
        let tree = ExprTree::new(query()).unwrap();
        assert_eq!(tree.len(), query().node_count());
        assert!(matches!(tree.node(tree.root()).kind(), ExprKind::Take { count: 10 }));

        let project = tree.node(tree.root()).children()[0];
        assert_eq!(project.index(), 1);
        assert!(matches!(tree.node(project).kind(), ExprKind::Project));
        assert_eq!(tree.node(project).parent(), Some(tree.root()));
    }

    #[test]
    fn test_post_order_children_first() {
        let tree = ExprTree::new(query()).unwrap();
        let order = tree.post_order();
        assert_eq!(order.len(), tree.len());
        assert_eq!(*order.last().unwrap(), tree.root());

        let position = |id: NodeId| order.iter().position(|x| *x == id).unwrap();
        for node in tree.iter() {
            for child in node.children() {
                assert!(position(*child) < position(node.id()));
            }
        }
    }

    #[test]
    fn test_subtree_roundtrip() {
        let tree = ExprTree::new(query()).unwrap();
        assert_eq!(tree.to_expr(), query());
    }

    #[test]
    fn test_operator_chain_and_main_projection() {
        let tree = ExprTree::new(query()).unwrap();
        let chain = tree.operator_chain();
        let kinds: Vec<&str> = chain
            .iter()
            .map(|id| tree.node(*id).kind().kind_name())
            .collect();
        assert_eq!(kinds, vec!["take", "project", "filter", "source"]);
        assert_eq!(tree.main_projection(), Some(chain[1]));
    }

    #[test]
    fn test_outermost_projection_is_main() {
        let expr = Expr::source("t")
            .project(Expr::lambda("x", Expr::param("x").member("a")))
            .project(Expr::lambda("y", Expr::param("y")));
        let tree = ExprTree::new(expr).unwrap();
        assert_eq!(tree.main_projection(), Some(tree.root()));
    }

    #[test]
    fn test_source_lookup() {
        let tree = ExprTree::new(query()).unwrap();
        assert_eq!(tree.source_name(), "numbers");
        assert_eq!(tree.operator_chain().last().copied(), Some(tree.source()));
    }

    #[test]
    fn test_depths() {
        let tree = ExprTree::new(Expr::source("t").take(1)).unwrap();
        assert_eq!(tree.depths(), vec![0, 1]);
    }

    #[test]
    fn test_rejects_scalar_root() {
        let err = ExprTree::new(Expr::constant(1)).unwrap_err();
        assert_eq!(err.code(), TreeErrorCode::DeferTreeInvalidRoot);
    }

    #[test]
    fn test_rejects_bad_arity() {
        let expr = Expr::new(ExprKind::Filter, vec![Expr::source("t")]);
        let err = ExprTree::new(expr).unwrap_err();
        assert_eq!(err.code(), TreeErrorCode::DeferTreeInvalidArity);
        assert_eq!(err.position(), Some(0));
    }

    #[test]
    fn test_rejects_non_lambda_argument() {
        let expr = Expr::source("t").filter(Expr::constant(true));
        let err = ExprTree::new(expr).unwrap_err();
        assert_eq!(err.code(), TreeErrorCode::DeferTreeUnexpectedChild);
    }

    #[test]
    fn test_rejects_sequence_in_scalar_position() {
        let expr = Expr::source("t").project(Expr::lambda("x", Expr::source("u")));
        let err = ExprTree::new(expr).unwrap_err();
        assert_eq!(err.code(), TreeErrorCode::DeferTreeUnexpectedChild);
        assert_eq!(err.position(), Some(2));
    }

    #[test]
    fn test_construct_arity_follows_fields() {
        let expr = Expr::new(
            ExprKind::Construct {
                fields: vec!["a".into(), "b".into()],
            },
            vec![Expr::constant(1)],
        );
        let err = ExprTree::new(Expr::source("t").project(Expr::lambda("x", expr))).unwrap_err();
        assert_eq!(err.code(), TreeErrorCode::DeferTreeInvalidArity);
    }
}
