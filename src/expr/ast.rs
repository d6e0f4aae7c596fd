//! Owned expression form handed over by the query-construction layer.
//!
//! An `Expr` is an immutable tree of `ExprKind` nodes. Sequence operators
//! (`Source`, `Filter`, `Project`, ...) form the operator chain of a query;
//! scalar forms (`Member`, `Binary`, `Call`, ...) appear inside lambdas.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Binary scalar operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    /// Returns the operator name used in shape tags
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Rem => "rem",
            BinaryOp::Eq => "eq",
            BinaryOp::Ne => "ne",
            BinaryOp::Lt => "lt",
            BinaryOp::Le => "le",
            BinaryOp::Gt => "gt",
            BinaryOp::Ge => "ge",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    /// Returns the infix symbol used for display
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Unary scalar operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
}

impl UnaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Neg => "neg",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Not => "!",
            UnaryOp::Neg => "-",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Node form plus its shape-specific payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExprKind {
    // Sequence operators
    /// Named row source (table, collection)
    Source { name: String },
    /// children: source, predicate lambda
    Filter,
    /// children: source, selector lambda
    Project,
    /// children: source, key lambda
    OrderBy {
        #[serde(default)]
        direction: SortDirection,
    },
    /// children: source
    Skip { count: usize },
    /// children: source
    Take { count: usize },
    /// children: source
    Distinct,

    // Scalar forms
    /// children: body
    Lambda { param: String },
    Parameter { name: String },
    /// children: target
    Member { name: String },
    Constant { value: Value },
    /// children: lhs, rhs
    Binary { op: BinaryOp },
    /// children: operand
    Unary { op: UnaryOp },
    /// children: arguments
    Call { function: String },
    /// children: one value per field, in field order
    Construct { fields: Vec<String> },
}

impl ExprKind {
    /// Returns the kind name used as the first part of a shape tag
    pub fn kind_name(&self) -> &'static str {
        match self {
            ExprKind::Source { .. } => "source",
            ExprKind::Filter => "filter",
            ExprKind::Project => "project",
            ExprKind::OrderBy { .. } => "order_by",
            ExprKind::Skip { .. } => "skip",
            ExprKind::Take { .. } => "take",
            ExprKind::Distinct => "distinct",
            ExprKind::Lambda { .. } => "lambda",
            ExprKind::Parameter { .. } => "parameter",
            ExprKind::Member { .. } => "member",
            ExprKind::Constant { .. } => "constant",
            ExprKind::Binary { .. } => "binary",
            ExprKind::Unary { .. } => "unary",
            ExprKind::Call { .. } => "call",
            ExprKind::Construct { .. } => "construct",
        }
    }

    /// Returns true if this node produces a row sequence
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            ExprKind::Source { .. }
                | ExprKind::Filter
                | ExprKind::Project
                | ExprKind::OrderBy { .. }
                | ExprKind::Skip { .. }
                | ExprKind::Take { .. }
                | ExprKind::Distinct
        )
    }

    /// Returns true for sequence operators that take a lambda argument
    pub fn takes_lambda(&self) -> bool {
        matches!(
            self,
            ExprKind::Filter | ExprKind::Project | ExprKind::OrderBy { .. }
        )
    }
}

/// Immutable expression tree node with owned children
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    #[serde(flatten)]
    pub kind: ExprKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Expr>,
}

impl Expr {
    /// Creates a node from its kind and children
    pub fn new(kind: ExprKind, children: Vec<Expr>) -> Self {
        Self { kind, children }
    }

    fn leaf(kind: ExprKind) -> Self {
        Self::new(kind, Vec::new())
    }

    // Sequence construction

    /// Named row source
    pub fn source(name: impl Into<String>) -> Self {
        Self::leaf(ExprKind::Source { name: name.into() })
    }

    /// Filters this sequence by a predicate lambda
    pub fn filter(self, predicate: Expr) -> Self {
        Self::new(ExprKind::Filter, vec![self, predicate])
    }

    /// Projects each row of this sequence through a selector lambda
    pub fn project(self, selector: Expr) -> Self {
        Self::new(ExprKind::Project, vec![self, selector])
    }

    /// Orders this sequence ascending by a key lambda
    pub fn order_by(self, key: Expr) -> Self {
        Self::new(
            ExprKind::OrderBy {
                direction: SortDirection::Asc,
            },
            vec![self, key],
        )
    }

    /// Orders this sequence descending by a key lambda
    pub fn order_by_desc(self, key: Expr) -> Self {
        Self::new(
            ExprKind::OrderBy {
                direction: SortDirection::Desc,
            },
            vec![self, key],
        )
    }

    pub fn skip(self, count: usize) -> Self {
        Self::new(ExprKind::Skip { count }, vec![self])
    }

    pub fn take(self, count: usize) -> Self {
        Self::new(ExprKind::Take { count }, vec![self])
    }

    pub fn distinct(self) -> Self {
        Self::new(ExprKind::Distinct, vec![self])
    }

    // Scalar construction

    /// Single-parameter lambda `param => body`
    pub fn lambda(param: impl Into<String>, body: Expr) -> Self {
        Self::new(
            ExprKind::Lambda {
                param: param.into(),
            },
            vec![body],
        )
    }

    /// Reference to a lambda parameter
    pub fn param(name: impl Into<String>) -> Self {
        Self::leaf(ExprKind::Parameter { name: name.into() })
    }

    /// Literal value
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::leaf(ExprKind::Constant {
            value: value.into(),
        })
    }

    /// Member access `self.name`
    pub fn member(self, name: impl Into<String>) -> Self {
        Self::new(ExprKind::Member { name: name.into() }, vec![self])
    }

    /// Function or method call
    pub fn call(function: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(
            ExprKind::Call {
                function: function.into(),
            },
            args,
        )
    }

    /// Object construction `{ field: value, ... }`
    pub fn construct(fields: Vec<(String, Expr)>) -> Self {
        let (names, values) = fields.into_iter().unzip();
        Self::new(ExprKind::Construct { fields: names }, values)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::new(ExprKind::Binary { op }, vec![lhs, rhs])
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary { op }, vec![operand])
    }

    pub fn equals(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Eq, lhs, rhs)
    }

    pub fn gt(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Gt, lhs, rhs)
    }

    pub fn ge(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Ge, lhs, rhs)
    }

    pub fn lt(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Lt, lhs, rhs)
    }

    pub fn le(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Le, lhs, rhs)
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Or, lhs, rhs)
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Add, lhs, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Mul, lhs, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Div, lhs, rhs)
    }

    pub fn rem(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::Rem, lhs, rhs)
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(UnaryOp::Not, operand)
    }

    // Accessors

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn children(&self) -> &[Expr] {
        &self.children
    }

    /// Returns true if this node produces a row sequence
    pub fn is_sequence(&self) -> bool {
        self.kind.is_sequence()
    }

    /// Returns true if a `Parameter` named `name` occurs anywhere below
    pub fn references_param(&self, name: &str) -> bool {
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            if let ExprKind::Parameter { name: n } = &expr.kind {
                if n == name {
                    return true;
                }
            }
            stack.extend(expr.children.iter());
        }
        false
    }

    /// Counts the nodes of this tree
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(expr) = stack.pop() {
            count += 1;
            stack.extend(expr.children.iter());
        }
        count
    }
}

struct Child<'a>(Option<&'a Expr>);

impl fmt::Display for Child<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(expr) => write!(f, "{}", expr),
            None => write!(f, "?"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let child = |i: usize| Child(self.children.get(i));

        match &self.kind {
            ExprKind::Source { name } => write!(f, "{}", name),
            ExprKind::Filter => write!(f, "{}.filter({})", child(0), child(1)),
            ExprKind::Project => write!(f, "{}.project({})", child(0), child(1)),
            ExprKind::OrderBy { direction } => match direction {
                SortDirection::Asc => write!(f, "{}.order_by({})", child(0), child(1)),
                SortDirection::Desc => write!(f, "{}.order_by_desc({})", child(0), child(1)),
            },
            ExprKind::Skip { count } => write!(f, "{}.skip({})", child(0), count),
            ExprKind::Take { count } => write!(f, "{}.take({})", child(0), count),
            ExprKind::Distinct => write!(f, "{}.distinct()", child(0)),
            ExprKind::Lambda { param } => write!(f, "{} => {}", param, child(0)),
            ExprKind::Parameter { name } => write!(f, "{}", name),
            ExprKind::Member { name } => write!(f, "{}.{}", child(0), name),
            ExprKind::Constant { value } => write!(f, "{}", value),
            ExprKind::Binary { op } => write!(f, "({} {} {})", child(0), op.symbol(), child(1)),
            ExprKind::Unary { op } => write!(f, "{}{}", op.symbol(), child(0)),
            ExprKind::Call { function } => {
                write!(f, "{}(", function)?;
                for (i, arg) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            ExprKind::Construct { fields } => {
                write!(f, "{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", field, child(i))?;
                }
                write!(f, " }}")
            }
        }
    }
}
