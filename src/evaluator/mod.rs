//! Deferred evaluator
//!
//! Applies the operations the provider could not translate to the rows it
//! returns, in plan order.

mod compare;
mod errors;
mod evaluator;
mod functions;
mod scalar;

pub use compare::{compare_values, partial_compare, values_equal};
pub use errors::{BoxError, EvalError, EvalResult};
pub use evaluator::{DeferredEvaluator, DeferredRows};
pub use functions::{FunctionRegistry, LocalFn};
pub use scalar::{Binding, ScalarEvaluator};
