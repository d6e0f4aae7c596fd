//! Decomposer / rewriter
//!
//! Splits a classified tree into the largest provider-supported subtree on
//! the operator chain (the provider query) and the ordered local operations
//! applied to its rows (the deferred plan).

mod capture;
mod decomposer;
mod explain;
mod plan;

pub use capture::{CapturedSlot, SLOT_PREFIX};
pub use decomposer::{DecomposeOptions, Decomposer};
pub use explain::{Explain, ExplainNode};
pub use plan::{Decomposition, DeferredOp, DeferredOperation, DeferredPlan, ProviderQuery};
