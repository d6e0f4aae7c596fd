//! Deferred evaluation errors

use thiserror::Error;

/// Boxed error from a row source
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure while evaluating deferred operations
#[derive(Debug, Error)]
pub enum EvalError {
    /// The row source failed; the original error is the source
    #[error("upstream row source failed: {0}")]
    Upstream(#[source] BoxError),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("type mismatch in {operation}: {detail}")]
    TypeMismatch { operation: String, detail: String },

    #[error("predicate yielded {0}, expected a boolean")]
    NonBooleanPredicate(String),

    #[error("unbound parameter '{0}'")]
    UnboundParameter(String),

    #[error("division by zero")]
    DivisionByZero,

    /// Raised by a registered local function
    #[error("function '{function}' failed: {message}")]
    Function { function: String, message: String },

    #[error("{0} cannot be evaluated as a scalar")]
    NotScalar(String),
}

impl EvalError {
    pub fn upstream(err: impl Into<BoxError>) -> Self {
        EvalError::Upstream(err.into())
    }

    pub fn type_mismatch(operation: impl Into<String>, detail: impl Into<String>) -> Self {
        EvalError::TypeMismatch {
            operation: operation.into(),
            detail: detail.into(),
        }
    }

    pub fn function(function: impl Into<String>, message: impl Into<String>) -> Self {
        EvalError::Function {
            function: function.into(),
            message: message.into(),
        }
    }

    /// Whether the row source, not a local operation, failed
    pub fn is_upstream(&self) -> bool {
        matches!(self, EvalError::Upstream(_))
    }

    /// The row source's error, if this is an upstream failure
    pub fn upstream_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match self {
            EvalError::Upstream(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

/// Result type for deferred evaluation
pub type EvalResult<T> = Result<T, EvalError>;
