//! Expression tree data model
//!
//! The input structure being analyzed. Trees are built by the
//! query-construction layer as owned `Expr` values (or deserialized from
//! JSON), then frozen into an `ExprTree` arena whose `NodeId`s key all
//! per-node analysis results.
//!
//! # Structure
//!
//! - Root is always a sequence: `Source` or a sequence operator
//! - Operators take their input sequence as the first child
//! - `Filter`, `Project` and `OrderBy` take a `Lambda` as the second child
//! - Lambda bodies are scalar expressions; nested sequences are rejected

mod ast;
mod errors;
mod shape;
mod tree;

pub use ast::{BinaryOp, Expr, ExprKind, SortDirection, UnaryOp};
pub use errors::{TreeError, TreeErrorCode, TreeResult};
pub use shape::{InvalidShapeTag, ShapeTag, MAIN_PROJECTION};
pub use tree::{ExprTree, Node, NodeId};
