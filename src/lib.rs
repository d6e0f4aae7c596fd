//! querydefer - provider/local query splitting
//!
//! Classifies every node of a query expression tree as translatable by the
//! query provider or not, then splits the tree into the largest
//! provider-executable subtree and an ordered plan of operations evaluated
//! locally over the provider's rows.

pub mod classifier;
pub mod config;
pub mod decomposer;
pub mod engine;
pub mod evaluator;
pub mod expr;
pub mod observability;
pub mod provider;

pub use classifier::{AnalyzedTree, Classification, Classifier, ClassifierError, RuleRegistry};
pub use config::{Capabilities, ConfigError, EngineConfig};
pub use decomposer::{Decomposer, Decomposition, DeferredOperation, DeferredPlan, ProviderQuery};
pub use engine::{Analysis, DeferError, DeferralEngine};
pub use evaluator::{DeferredEvaluator, DeferredRows, EvalError, FunctionRegistry};
pub use expr::{Expr, ExprTree, NodeId, ShapeTag, TreeError};
pub use provider::{MemoryProvider, MemoryProviderError, QueryProvider, RowStream};
