//! Classifier error types
//!
//! Error codes:
//! - DEFER_CLASSIFICATION_INCONSISTENCY (FATAL)

use std::fmt;

use crate::expr::{NodeId, ShapeTag};

use super::classification::Classification;

/// Severity levels for classifier errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The analysis pass must stop; a registered rule is broken
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Classifier error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierErrorCode {
    /// A rule's verdict contradicts its children's classifications
    DeferClassificationInconsistency,
}

impl ClassifierErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            ClassifierErrorCode::DeferClassificationInconsistency => {
                "DEFER_CLASSIFICATION_INCONSISTENCY"
            }
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Fatal
    }
}

impl fmt::Display for ClassifierErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Classifier error with the offending node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierError {
    code: ClassifierErrorCode,
    message: String,
    node: NodeId,
    tag: ShapeTag,
    rule: String,
    verdict: Classification,
}

impl ClassifierError {
    /// A rule returned `verdict` for `node`, which its children do not allow
    pub fn inconsistency(
        node: NodeId,
        tag: &ShapeTag,
        rule: &str,
        verdict: Classification,
        children: &[Classification],
    ) -> Self {
        let children: Vec<&str> = children.iter().map(Classification::as_str).collect();
        Self {
            code: ClassifierErrorCode::DeferClassificationInconsistency,
            message: format!(
                "rule '{}' classified {} ({}) as {} with children [{}]",
                rule,
                node,
                tag,
                verdict,
                children.join(", ")
            ),
            node,
            tag: tag.clone(),
            rule: rule.to_string(),
            verdict,
        }
    }

    pub fn code(&self) -> ClassifierErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The node whose classification was rejected
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn tag(&self) -> &ShapeTag {
        &self.tag
    }

    /// Name of the rule that produced the verdict
    pub fn rule(&self) -> &str {
        &self.rule
    }

    pub fn verdict(&self) -> Classification {
        self.verdict
    }
}

impl fmt::Display for ClassifierError {
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

impl std::error::Error for ClassifierError {}

/// Result type for classification
pub type ClassifierResult<T> = Result<T, ClassifierError>;
