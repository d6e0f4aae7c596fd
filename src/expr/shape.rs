//! Shape tags: the identity under which classification rules are registered.
//!
//! A tag is a kind name with an optional qualifier, written `kind` or
//! `kind:qualifier` (`filter`, `call:double`, `member:ssn`, `project:main`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ast::ExprKind;

/// Qualifier given to the outermost projection of a query
pub const MAIN_PROJECTION: &str = "main";

/// Identity of a node's syntactic/semantic form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShapeTag {
    kind: String,
    qualifier: Option<String>,
}

impl ShapeTag {
    /// Unqualified tag
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            qualifier: None,
        }
    }

    /// Qualified tag `kind:qualifier`
    pub fn qualified(kind: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            qualifier: Some(qualifier.into()),
        }
    }

    /// Parses `kind` or `kind:qualifier`.
    ///
    /// Empty or whitespace-containing parts are rejected.
    pub fn parse(text: &str) -> Option<Self> {
        match text.split_once(':') {
            Some((kind, qualifier)) if valid(kind) && valid(qualifier) => {
                Some(Self::qualified(kind, qualifier))
            }
            None if valid(text) => Some(Self::new(text)),
            _ => None,
        }
    }

    /// Derives the tag of a node.
    ///
    /// `main_projection` marks the outermost `Project` of the operator chain.
    /// Source, member and function names that cannot be written as a
    /// qualifier (empty or containing whitespace) get the plain kind tag, so
    /// every derived tag is one a config file can name.
    pub fn of(kind: &ExprKind, main_projection: bool) -> Self {
        let name = kind.kind_name();
        let named = |qualifier: &str| {
            if valid(qualifier) {
                Self::qualified(name, qualifier)
            } else {
                Self::new(name)
            }
        };
        match kind {
            ExprKind::Source { name: source } => named(source.as_str()),
            ExprKind::Project if main_projection => Self::qualified(name, MAIN_PROJECTION),
            ExprKind::Member { name: member } => named(member.as_str()),
            ExprKind::Binary { op } => Self::qualified(name, op.as_str()),
            ExprKind::Unary { op } => Self::qualified(name, op.as_str()),
            ExprKind::Call { function } => named(function.as_str()),
            _ => Self::new(name),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// Returns the unqualified form of this tag, if it is qualified
    pub fn generalized(&self) -> Option<Self> {
        self.qualifier.as_ref().map(|_| Self::new(self.kind.as_str()))
    }
}

fn valid(part: &str) -> bool {
    !part.is_empty() && !part.chars().any(char::is_whitespace)
}

impl fmt::Display for ShapeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}:{}", self.kind, qualifier),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Error returned for malformed tag text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid shape tag '{0}'")]
pub struct InvalidShapeTag(pub String);

impl FromStr for ShapeTag {
    type Err = InvalidShapeTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| InvalidShapeTag(s.to_string()))
    }
}

impl TryFrom<String> for ShapeTag {
    type Error = InvalidShapeTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShapeTag> for String {
    fn from(tag: ShapeTag) -> Self {
        tag.to_string()
    }
}

impl From<&str> for ShapeTag {
    /// Infallible conversion for literals; malformed text becomes an
    /// unqualified tag of the whole string.
    fn from(value: &str) -> Self {
        Self::parse(value).unwrap_or_else(|| Self::new(value))
    }
}
