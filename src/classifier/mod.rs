//! Classification engine
//!
//! Decides, node by node, whether a sub-expression can be translated by the
//! provider or must be evaluated locally.
//!
//! # Components
//!
//! - `Classification`: per-node verdict
//! - `ClassificationRule`: pure per-shape decision function
//! - `RuleRegistry`: shape tag to rule mapping, conservative default for
//!   unknown shapes
//! - `Classifier`: bottom-up walk producing an `AnalyzedTree`
//!
//! # Combination Law
//!
//! A node is `ProviderSupported` only if its own shape is translatable and
//! every child is `ProviderSupported`. A translatable-children node whose own
//! shape is not translatable is `RequiresDeferral`. Any non-supported child
//! makes the node `Mixed`. Absorbing rules may additionally split the node
//! during decomposition.

mod classification;
mod classifier;
mod errors;
pub mod registry;
mod rules;

pub use classification::{AnalyzedTree, Classification, NodeAnalysis, Resolution};
pub use classifier::Classifier;
pub use errors::{ClassifierError, ClassifierErrorCode, ClassifierResult};
pub use registry::{AlreadyInstalled, ResolvedRule, RuleRegistry};
pub use rules::{
    AbsorbingProjection, ClassificationRule, ConservativeDefault, FnRule, RuleInput,
    Translatable, Untranslatable,
};
