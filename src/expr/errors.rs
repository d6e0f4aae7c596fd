//! Expression tree error types
//!
//! Error codes:
//! - DEFER_TREE_INVALID_ARITY (REJECT)
//! - DEFER_TREE_INVALID_ROOT (REJECT)
//! - DEFER_TREE_UNEXPECTED_CHILD (REJECT)

use std::fmt;

/// Severity levels for tree errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Input rejected, nothing was analyzed
    Reject,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Reject => write!(f, "REJECT"),
        }
    }
}

/// Tree error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeErrorCode {
    /// Node has the wrong number of children for its kind
    DeferTreeInvalidArity,
    /// Root does not produce a row sequence
    DeferTreeInvalidRoot,
    /// A child has the wrong form for its position
    DeferTreeUnexpectedChild,
}

impl TreeErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            TreeErrorCode::DeferTreeInvalidArity => "DEFER_TREE_INVALID_ARITY",
            TreeErrorCode::DeferTreeInvalidRoot => "DEFER_TREE_INVALID_ROOT",
            TreeErrorCode::DeferTreeUnexpectedChild => "DEFER_TREE_UNEXPECTED_CHILD",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for TreeErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Structural error found while building an `ExprTree`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeError {
    code: TreeErrorCode,
    message: String,
    /// Pre-order index of the offending node
    position: Option<usize>,
}

impl TreeError {
    pub fn invalid_arity(position: usize, kind: &str, expected: &str, actual: usize) -> Self {
        Self {
            code: TreeErrorCode::DeferTreeInvalidArity,
            message: format!(
                "'{}' node at #{} expects {} children, found {}",
                kind, position, expected, actual
            ),
            position: Some(position),
        }
    }

    pub fn invalid_root(kind: &str) -> Self {
        Self {
            code: TreeErrorCode::DeferTreeInvalidRoot,
            message: format!("root must produce a row sequence, found '{}'", kind),
            position: Some(0),
        }
    }

    pub fn unexpected_child(position: usize, parent: &str, expected: &str, found: &str) -> Self {
        Self {
            code: TreeErrorCode::DeferTreeUnexpectedChild,
            message: format!(
                "'{}' node at #{} expects {}, found '{}'",
                parent, position, expected, found
            ),
            position: Some(position),
        }
    }

    pub fn code(&self) -> TreeErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn position(&self) -> Option<usize> {
        self.position
    }
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )
    }
}

impl std::error::Error for TreeError {}

/// Result type for tree construction
pub type TreeResult<T> = Result<T, TreeError>;
