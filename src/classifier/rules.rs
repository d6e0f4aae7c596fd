//! Classification rules.
//!
//! A rule is a pure decision function: given a node's tag, payload, and the
//! already-computed classifications of its children, it returns the node's
//! classification. Rules carry no state, which keeps classification
//! deterministic and safe to re-run.

use crate::expr::{ExprKind, ShapeTag};

use super::classification::Classification;

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub tag: &'a ShapeTag,
    pub kind: &'a ExprKind,
    pub children: &'a [Classification],
}

impl RuleInput<'_> {
    pub fn all_children_supported(&self) -> bool {
        self.children.iter().all(Classification::is_supported)
    }
}

/// A per-shape classification strategy
pub trait ClassificationRule: Send + Sync {
    /// Name reported in analysis output and errors
    fn name(&self) -> &str;

    /// Classifies one node
    fn classify(&self, input: &RuleInput<'_>) -> Classification;

    /// Whether this shape can absorb a deferred child locally, pushing
    /// its supported sub-parts to the provider
    fn absorbs(&self) -> bool {
        false
    }
}

/// Shape the provider translates
#[derive(Debug, Clone, Copy, Default)]
pub struct Translatable;

impl ClassificationRule for Translatable {
    fn name(&self) -> &str {
        "translatable"
    }

    fn classify(&self, input: &RuleInput<'_>) -> Classification {
        Classification::combine(true, input.children)
    }
}

/// Shape the provider cannot translate
#[derive(Debug, Clone, Copy, Default)]
pub struct Untranslatable;

impl ClassificationRule for Untranslatable {
    fn name(&self) -> &str {
        "untranslatable"
    }

    fn classify(&self, input: &RuleInput<'_>) -> Classification {
        Classification::combine(false, input.children)
    }
}

/// Translatable projection that can split its selector
#[derive(Debug, Clone, Copy, Default)]
pub struct AbsorbingProjection;

impl ClassificationRule for AbsorbingProjection {
    fn name(&self) -> &str {
        "absorbing_projection"
    }

    fn classify(&self, input: &RuleInput<'_>) -> Classification {
        Classification::combine(true, input.children)
    }

    fn absorbs(&self) -> bool {
        true
    }
}

/// Fallback for shapes with no registered rule: never provider-supported
#[derive(Debug, Clone, Copy, Default)]
pub struct ConservativeDefault;

impl ClassificationRule for ConservativeDefault {
    fn name(&self) -> &str {
        "unregistered"
    }

    fn classify(&self, _input: &RuleInput<'_>) -> Classification {
        Classification::RequiresDeferral
    }
}

/// Rule backed by a closure
pub struct FnRule<F> {
    name: String,
    decide: F,
    absorbs: bool,
}

impl<F> FnRule<F>
where
    F: Fn(&RuleInput<'_>) -> Classification + Send + Sync,
{
    pub fn new(name: impl Into<String>, decide: F) -> Self {
        Self {
            name: name.into(),
            decide,
            absorbs: false,
        }
    }

    /// Marks the rule as absorbing
    pub fn absorbing(mut self) -> Self {
        self.absorbs = true;
        self
    }
}

impl<F> ClassificationRule for FnRule<F>
where
    F: Fn(&RuleInput<'_>) -> Classification + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, input: &RuleInput<'_>) -> Classification {
        (self.decide)(input)
    }

    fn absorbs(&self) -> bool {
        self.absorbs
    }
}
