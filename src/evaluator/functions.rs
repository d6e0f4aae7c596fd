//! Local function implementations
//!
//! `Call` nodes evaluated locally are dispatched by name through a
//! `FunctionRegistry`. Functions are pure: same arguments, same result.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::errors::{EvalError, EvalResult};

/// Signature of a local function
pub type LocalFn = dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync;

/// Name to implementation mapping for local calls
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<LocalFn>>,
}

impl FunctionRegistry {
    /// Registry with no functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Registry with the builtin functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("lower", |args| map_string("lower", args, |s| s.to_lowercase()));
        registry.register("upper", |args| map_string("upper", args, |s| s.to_uppercase()));
        registry.register("len", length);
        registry.register("concat", concat);
        registry.register("abs", abs);
        registry.register("coalesce", |args| {
            Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
        });
        registry
    }

    /// Adds or replaces a function
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> Option<Arc<LocalFn>>
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<LocalFn>> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Calls `name` with already evaluated arguments
    pub fn call(&self, name: &str, args: &[Value]) -> EvalResult<Value> {
        match self.functions.get(name) {
            Some(function) => function(args),
            None => Err(EvalError::UnknownFunction(name.to_string())),
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

fn expect_arity(name: &str, args: &[Value], expected: usize) -> EvalResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EvalError::function(
            name,
            format!("expected {} argument(s), got {}", expected, args.len()),
        ))
    }
}

fn map_string(name: &str, args: &[Value], f: impl Fn(&str) -> String) -> EvalResult<Value> {
    expect_arity(name, args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::String(f(s))),
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::type_mismatch(name, format!("expected a string, got {}", other))),
    }
}

fn length(args: &[Value]) -> EvalResult<Value> {
    expect_arity("len", args, 1)?;
    match &args[0] {
        Value::String(s) => Ok(Value::from(s.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        Value::Object(fields) => Ok(Value::from(fields.len())),
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::type_mismatch("len", format!("no length for {}", other))),
    }
}

/// Joins strings; numbers and booleans are rendered, nulls skipped
fn concat(args: &[Value]) -> EvalResult<Value> {
    let mut joined = String::new();
    for arg in args {
        match arg {
            Value::String(s) => joined.push_str(s),
            Value::Null => {}
            Value::Number(_) | Value::Bool(_) => joined.push_str(&arg.to_string()),
            other => {
                return Err(EvalError::type_mismatch(
                    "concat",
                    format!("cannot concatenate {}", other),
                ))
            }
        }
    }
    Ok(Value::String(joined))
}

fn abs(args: &[Value]) -> EvalResult<Value> {
    expect_arity("abs", args, 1)?;
    match &args[0] {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if let Some(abs) = i.checked_abs() {
                    return Ok(Value::from(abs));
                }
            }
            if n.is_u64() {
                return Ok(Value::Number(n.clone()));
            }
            let f = n.as_f64().unwrap_or(0.0).abs();
            Ok(serde_json::Number::from_f64(f).map_or(Value::Null, Value::Number))
        }
        Value::Null => Ok(Value::Null),
        other => Err(EvalError::type_mismatch("abs", format!("expected a number, got {}", other))),
    }
}
