//! Deferred Evaluation Tests
//!
//! Tests for applying deferred plans to provider rows:
//! - Operations run in plan order
//! - Results are streamed lazily
//! - Upstream failures surface as the provider's own error
//! - Local errors end the sequence

use std::cell::Cell;
use std::convert::Infallible;
use std::sync::Arc;

use querydefer::decomposer::{DeferredOperation, DeferredPlan, ProviderQuery};
use querydefer::evaluator::{DeferredEvaluator, EvalError, FunctionRegistry};
use querydefer::expr::Expr;
use querydefer::provider::{MemoryProvider, MemoryProviderError, QueryProvider};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn functions() -> Arc<FunctionRegistry> {
    let mut functions = FunctionRegistry::with_builtins();
    functions.register("double", |args: &[Value]| match args {
        [Value::Number(n)] => Ok(json!(n.as_i64().unwrap_or_default() * 2)),
        _ => Err(EvalError::function("double", "expected one integer")),
    });
    Arc::new(functions)
}

fn evaluator() -> DeferredEvaluator {
    DeferredEvaluator::new(functions())
}

fn ok_rows(values: Vec<Value>) -> impl Iterator<Item = Result<Value, Infallible>> {
    values.into_iter().map(Ok)
}

fn double() -> DeferredOperation {
    DeferredOperation::Project {
        selector: Expr::lambda("x", Expr::call("double", vec![Expr::param("x")])),
    }
}

fn greater_than(n: i64) -> DeferredOperation {
    DeferredOperation::Filter {
        predicate: Expr::lambda("x", Expr::gt(Expr::param("x"), Expr::constant(n))),
    }
}

// =============================================================================
// Ordering Tests
// =============================================================================

/// Doubling the provider's even numbers.
#[test]
fn test_project_over_provider_rows() {
    let plan = DeferredPlan::from_operations([double()]);
    let rows = evaluator()
        .apply(&plan, ok_rows(vec![json!(2), json!(4)]))
        .collect_rows()
        .unwrap();

    assert_eq!(rows, vec![json!(4), json!(8)]);
}

/// The same operations in the opposite order give a different result.
#[test]
fn test_plan_order_matters() {
    let plan = DeferredPlan::from_operations([double(), greater_than(4)]);
    let input = vec![json!(1), json!(2), json!(3)];

    let forward = evaluator()
        .apply(&plan, ok_rows(input.clone()))
        .collect_rows()
        .unwrap();
    let reversed = evaluator()
        .apply(&plan.reversed(), ok_rows(input))
        .collect_rows()
        .unwrap();

    assert_eq!(forward, vec![json!(6)]);
    assert_eq!(reversed, Vec::<Value>::new());
}

/// Skip then take, with the projection applied to the window only.
#[test]
fn test_skip_take_window() {
    let plan = DeferredPlan::from_operations([
        DeferredOperation::Skip(1),
        DeferredOperation::Take(2),
        double(),
    ]);
    let rows = evaluator()
        .apply(&plan, ok_rows((1..=5).map(|n| json!(n)).collect()))
        .collect_rows()
        .unwrap();

    assert_eq!(rows, vec![json!(4), json!(6)]);
}

/// Ordering is stable for equal keys.
#[test]
fn test_order_by_is_stable() {
    let plan = DeferredPlan::from_operations([DeferredOperation::OrderBy {
        key: Expr::lambda("r", Expr::param("r").member("team")),
        direction: Default::default(),
    }]);
    let input = vec![
        json!({"team": "b", "name": "first"}),
        json!({"team": "a", "name": "second"}),
        json!({"team": "b", "name": "third"}),
        json!({"team": "a", "name": "fourth"}),
    ];
    let names: Vec<Value> = evaluator()
        .apply(&plan, ok_rows(input))
        .collect_rows()
        .unwrap()
        .into_iter()
        .map(|row| row["name"].clone())
        .collect();

    assert_eq!(names, vec![json!("second"), json!("fourth"), json!("first"), json!("third")]);
}

/// Distinct keeps the first occurrence.
#[test]
fn test_distinct_keeps_first_occurrence() {
    let plan = DeferredPlan::from_operations([DeferredOperation::Distinct]);
    let rows = evaluator()
        .apply(&plan, ok_rows(vec![json!(3), json!(1), json!(3), json!("3"), json!(1)]))
        .collect_rows()
        .unwrap();

    assert_eq!(rows, vec![json!(3), json!(1), json!("3")]);
}

/// Distinct treats rows equal under `==` as duplicates.
#[test]
fn test_distinct_matches_equality() {
    let plan = DeferredPlan::from_operations([DeferredOperation::Distinct]);
    let rows = evaluator()
        .apply(
            &plan,
            ok_rows(vec![
                json!(1),
                json!(1.0),
                json!({"id": 2, "tags": [1]}),
                json!({"tags": [1.0], "id": 2.0}),
                json!(1.5),
            ]),
        )
        .collect_rows()
        .unwrap();

    assert_eq!(rows, vec![json!(1), json!({"id": 2, "tags": [1]}), json!(1.5)]);
}

/// An empty plan passes rows through unchanged.
#[test]
fn test_empty_plan_is_identity() {
    let input = vec![json!({"a": 1}), json!(null), json!([1, 2])];
    let rows = evaluator()
        .apply(&DeferredPlan::default(), ok_rows(input.clone()))
        .collect_rows()
        .unwrap();

    assert_eq!(rows, input);
}

// =============================================================================
// Laziness Tests
// =============================================================================

/// Nothing is pulled before iteration and take stops pulling early.
#[test]
fn test_rows_pulled_on_demand() {
    let pulled = Cell::new(0usize);
    let source = (1..=1000).map(|n| {
        pulled.set(pulled.get() + 1);
        Ok::<_, Infallible>(json!(n))
    });

    let plan = DeferredPlan::from_operations([greater_than(10), DeferredOperation::Take(2)]);
    let rows = evaluator().apply(&plan, source);
    assert_eq!(pulled.get(), 0);

    let rows = rows.collect_rows().unwrap();
    assert_eq!(rows, vec![json!(11), json!(12)]);
    assert_eq!(pulled.get(), 12);
}

// =============================================================================
// Failure Tests
// =============================================================================

/// A provider failure mid-stream reaches the consumer as that failure.
#[test]
fn test_upstream_failure_is_propagated() {
    let provider = MemoryProvider::new()
        .with_collection("numbers", (1..=10).map(|n| json!(n)).collect())
        .with_failure_after(3);
    let stream = provider
        .execute(&ProviderQuery::Unconstrained {
            source: "numbers".into(),
        })
        .unwrap();

    let plan = DeferredPlan::from_operations([double()]);
    let results: Vec<_> = evaluator().apply(&plan, stream).collect();

    assert_eq!(results.len(), 4);
    let values: Vec<Value> = results[..3].iter().map(|r| r.as_ref().unwrap().clone()).collect();
    assert_eq!(values, vec![json!(2), json!(4), json!(6)]);

    let err = results[3].as_ref().unwrap_err();
    assert!(err.is_upstream());
    let original = err
        .upstream_error()
        .and_then(|e| e.downcast_ref::<MemoryProviderError>())
        .unwrap();
    assert!(matches!(original, MemoryProviderError::StreamInterrupted { after: 3 }));
}

/// A failing blocking operation yields only the failure.
#[test]
fn test_upstream_failure_through_order_by() {
    let provider = MemoryProvider::new()
        .with_collection("numbers", vec![json!(3), json!(1), json!(2)])
        .with_failure_after(2);
    let stream = provider
        .execute(&ProviderQuery::Subtree(Expr::source("numbers")))
        .unwrap();

    let plan = DeferredPlan::from_operations([DeferredOperation::OrderBy {
        key: Expr::lambda("x", Expr::param("x")),
        direction: Default::default(),
    }]);
    let result = evaluator().apply(&plan, stream).collect_rows();

    assert!(matches!(result, Err(EvalError::Upstream(_))));
}

/// A local evaluation error ends the sequence.
#[test]
fn test_local_error_ends_sequence() {
    let plan = DeferredPlan::from_operations([double()]);
    let results: Vec<_> = evaluator()
        .apply(&plan, ok_rows(vec![json!(1), json!("two"), json!(3)]))
        .collect();

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(EvalError::Function { ref function, .. }) if function == "double"
    ));
}

/// Calling a function nobody registered is an error, not a null.
#[test]
fn test_unknown_function() {
    let plan = DeferredPlan::from_operations([DeferredOperation::Project {
        selector: Expr::lambda("x", Expr::call("triple", vec![Expr::param("x")])),
    }]);
    let result = evaluator().apply(&plan, ok_rows(vec![json!(1)])).collect_rows();

    assert!(matches!(result, Err(EvalError::UnknownFunction(name)) if name == "triple"));
}

/// Filters must yield booleans.
#[test]
fn test_non_boolean_predicate() {
    let plan = DeferredPlan::from_operations([DeferredOperation::Filter {
        predicate: Expr::lambda("x", Expr::param("x").member("name")),
    }]);
    let result = evaluator()
        .apply(&plan, ok_rows(vec![json!({"name": "Ada"})]))
        .collect_rows();

    assert!(matches!(result, Err(EvalError::NonBooleanPredicate(_))));
}
