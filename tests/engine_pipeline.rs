//! Engine Pipeline Tests
//!
//! End-to-end tests through `DeferralEngine`:
//! - The provider only ever receives queries it can translate
//! - Split execution matches a purely local evaluation
//! - Explain output describes the split
//! - Errors from each stage surface as `DeferError`

use std::sync::Arc;

use querydefer::decomposer::ProviderQuery;
use querydefer::evaluator::{EvalError, FunctionRegistry};
use querydefer::expr::Expr;
use querydefer::provider::{MemoryProvider, MemoryProviderError};
use querydefer::{DeferError, DeferralEngine, EngineConfig};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn config() -> EngineConfig {
    EngineConfig::default()
        .translatable([
            "source", "filter", "order_by", "take", "lambda", "parameter", "member", "constant",
            "binary", "construct",
        ])
        .absorbing(["project"])
}

fn functions() -> Arc<FunctionRegistry> {
    let mut functions = FunctionRegistry::with_builtins();
    functions.register("initials", |args: &[Value]| match args {
        [Value::String(name)] => Ok(Value::String(
            name.split_whitespace().filter_map(|word| word.chars().next()).collect(),
        )),
        _ => Err(EvalError::function("initials", "expected a string")),
    });
    Arc::new(functions)
}

fn engine() -> DeferralEngine {
    let config = config();
    let registry = config.build_registry().unwrap();
    DeferralEngine::new(Arc::new(registry), functions(), config)
}

fn users() -> Vec<Value> {
    vec![
        json!({"name": "Ada Lovelace", "age": 36}),
        json!({"name": "Bob", "age": 17}),
        json!({"name": "Grace Hopper", "age": 45}),
        json!({"name": "Alan Turing", "age": 41}),
    ]
}

fn strict_provider(engine: &DeferralEngine) -> MemoryProvider {
    MemoryProvider::new()
        .with_collection("users", users())
        .with_functions(functions())
        .strict(Arc::clone(engine.registry()))
}

fn adults() -> Expr {
    Expr::source("users").filter(Expr::lambda(
        "u",
        Expr::ge(Expr::param("u").member("age"), Expr::constant(18)),
    ))
}

fn initials() -> Expr {
    Expr::lambda(
        "u",
        Expr::call("initials", vec![Expr::param("u").member("name")]),
    )
}

// =============================================================================
// Execution Tests
// =============================================================================

/// Mixed query: filter and capture pushed down, call evaluated locally.
#[test]
fn test_mixed_query_end_to_end() {
    let engine = engine();
    let provider = strict_provider(&engine);

    let rows = engine
        .execute(&adults().project(initials()).take(2), &provider)
        .unwrap();
    assert_eq!(rows, vec![json!("AL"), json!("GH")]);

    let executed = provider.executed_queries();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].to_string(),
        "users.filter(u => (u.age >= 18)).project(u => { _c0: u.name })"
    );

    let metrics = engine.metrics();
    assert_eq!(metrics.captured_projections, 1);
    assert_eq!(metrics.captured_slots, 1);
}

/// Fully supported query: one provider call, no local work.
#[test]
fn test_fully_supported_query() {
    let engine = engine();
    let provider = strict_provider(&engine);
    let expr = adults()
        .order_by(Expr::lambda("u", Expr::param("u").member("age")))
        .take(1);

    let analysis = engine.analyze(&expr).unwrap();
    assert!(analysis.decomposition.is_fully_pushed_down());
    assert_eq!(analysis.provider_query(), &ProviderQuery::Subtree(expr.clone()));

    let rows = engine.execute(&expr, &provider).unwrap();
    assert_eq!(rows, vec![json!({"name": "Ada Lovelace", "age": 36})]);
}

/// Split execution gives the same rows as running everything locally.
#[test]
fn test_split_matches_local_evaluation() {
    let engine = engine();
    let provider = strict_provider(&engine);
    let expr = adults()
        .project(initials())
        .order_by_desc(Expr::lambda("i", Expr::param("i")));

    let split = engine.execute(&expr, &provider).unwrap();

    // Nothing translatable: the whole chain runs over the raw rows
    let local_engine = DeferralEngine::new(
        Arc::new(Default::default()),
        functions(),
        EngineConfig::default(),
    );
    let local_provider = MemoryProvider::new().with_collection("users", users());
    let local = local_engine.execute(&expr, &local_provider).unwrap();

    assert_eq!(split, vec![json!("GH"), json!("AT"), json!("AL")]);
    assert_eq!(split, local);
    assert_eq!(
        local_provider.executed_queries(),
        vec![Expr::source("users")]
    );
}

/// Rows are produced lazily through `stream`.
#[test]
fn test_stream_is_lazy() {
    let engine = engine();
    let provider = strict_provider(&engine);

    let mut rows = engine
        .stream(&adults().project(initials()), &provider)
        .unwrap();
    assert_eq!(rows.next().unwrap().unwrap(), json!("AL"));
    assert_eq!(rows.next().unwrap().unwrap(), json!("GH"));
}

// =============================================================================
// Failure Tests
// =============================================================================

/// Malformed trees are rejected before anything runs.
#[test]
fn test_invalid_tree_is_rejected() {
    let engine = engine();
    let provider = strict_provider(&engine);
    let not_a_sequence = Expr::add(Expr::constant(1), Expr::constant(2));

    let err = engine.execute(&not_a_sequence, &provider).unwrap_err();
    assert!(matches!(err, DeferError::Tree(_)));
    assert!(provider.executed_queries().is_empty());
}

/// A provider refusal keeps the provider's error as the source.
#[test]
fn test_provider_refusal() {
    let engine = engine();
    let provider = MemoryProvider::new();

    let err = engine.execute(&adults(), &provider).unwrap_err();
    let DeferError::Provider(source) = err else {
        panic!("expected a provider error");
    };
    assert!(matches!(
        source.downcast_ref::<MemoryProviderError>(),
        Some(MemoryProviderError::UnknownCollection(name)) if name == "users"
    ));
}

/// A stream interrupted mid-way surfaces as an upstream evaluation error.
#[test]
fn test_interrupted_stream() {
    let engine = engine();
    let provider = strict_provider(&engine).with_failure_after(1);

    let err = engine
        .execute(&adults().project(initials()), &provider)
        .unwrap_err();
    match err {
        DeferError::Evaluation(eval) => assert!(eval.is_upstream()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(engine.metrics().upstream_failures, 1);
}

// =============================================================================
// Explain Tests
// =============================================================================

/// Explain names the provider query, the local plan and the captures.
#[test]
fn test_explain_output() {
    let engine = engine();
    let explain = engine.explain(&adults().project(initials())).unwrap();
    let text = explain.to_string();

    assert!(text.starts_with("=== DEFERRAL PLAN ===\nRoot: MIXED\n"));
    assert!(text.contains(
        "Provider Query: users.filter(u => (u.age >= 18)).project(u => { _c0: u.name })"
    ));
    assert!(text.contains("  1. project u => initials(u._c0) [from #0]"));
    assert!(text.contains("Captures:\n  - _c0 = u.name"));
    assert!(text.contains("call:initials REQUIRES_DEFERRAL (unregistered) UNREGISTERED"));

    assert_eq!(explain.nodes.len(), adults().project(initials()).node_count());
}

/// Explain output serializes to JSON.
#[test]
fn test_explain_serializes() {
    let explain = engine().explain(&adults()).unwrap();
    let value = serde_json::to_value(&explain).unwrap();

    assert_eq!(value["root"], json!("PROVIDER_SUPPORTED"));
    assert_eq!(value["deferred"], json!([]));
    assert_eq!(value["nodes"][0]["tag"], json!("filter"));
}
