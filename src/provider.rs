//! Query provider seam
//!
//! A provider executes the pushed-down part of a query and returns its rows
//! as a stream. `MemoryProvider` serves named in-memory collections and is
//! used for tests and fixtures.
//!
//! # Fault injection
//!
//! `MemoryProvider::with_failure_after(n)` makes every stream fail after
//! `n` rows, modelling a connection lost mid-result.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use serde_json::Value;
use thiserror::Error;

use crate::classifier::{Classifier, RuleRegistry};
use crate::decomposer::{DeferredPlan, ProviderQuery};
use crate::evaluator::{DeferredEvaluator, EvalError, FunctionRegistry};
use crate::expr::{Expr, ExprTree};

/// Rows produced by a provider
pub type RowStream<'a, E> = Box<dyn Iterator<Item = Result<Value, E>> + 'a>;

/// Executes provider queries
pub trait QueryProvider {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Starts executing `query`.
    ///
    /// Errors returned here mean the query was refused; errors inside the
    /// stream mean it failed part way.
    fn execute(&self, query: &ProviderQuery) -> Result<RowStream<'_, Self::Error>, Self::Error>;
}

/// In-memory provider errors
#[derive(Debug, Error)]
pub enum MemoryProviderError {
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("query is not a sequence over a collection: {0}")]
    InvalidQuery(String),

    /// Strict mode: the query contains shapes the registry does not translate
    #[error("query is not translatable: {0}")]
    Untranslatable(String),

    #[error("row stream interrupted after {after} row(s)")]
    StreamInterrupted { after: usize },

    #[error(transparent)]
    Evaluation(#[from] EvalError),
}

/// Provider over named in-memory collections
pub struct MemoryProvider {
    collections: HashMap<String, Vec<Value>>,
    functions: Arc<FunctionRegistry>,
    /// Strict mode registry
    capabilities: Option<Arc<RuleRegistry>>,
    fail_after: Option<usize>,
    executed: Mutex<Vec<Expr>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self {
            collections: HashMap::new(),
            functions: Arc::new(FunctionRegistry::with_builtins()),
            capabilities: None,
            fail_after: None,
            executed: Mutex::new(Vec::new()),
        }
    }

    /// Adds or replaces a collection
    pub fn with_collection(mut self, name: impl Into<String>, rows: Vec<Value>) -> Self {
        self.collections.insert(name.into(), rows);
        self
    }

    /// Functions available to provider-side `Call` nodes
    pub fn with_functions(mut self, functions: Arc<FunctionRegistry>) -> Self {
        self.functions = functions;
        self
    }

    /// Refuses subtree queries the registry does not classify as supported
    pub fn strict(mut self, capabilities: Arc<RuleRegistry>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    /// Every stream fails after yielding `rows` rows
    pub fn with_failure_after(mut self, rows: usize) -> Self {
        self.fail_after = Some(rows);
        self
    }

    /// Queries executed so far, oldest first
    pub fn executed_queries(&self) -> Vec<Expr> {
        match self.executed.lock() {
            Ok(executed) => executed.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn check_translatable(&self, query: &ProviderQuery) -> Result<(), MemoryProviderError> {
        let (Some(capabilities), ProviderQuery::Subtree(expr)) = (&self.capabilities, query) else {
            return Ok(());
        };

        let tree = ExprTree::new(expr.clone())
            .map_err(|err| MemoryProviderError::InvalidQuery(err.to_string()))?;
        let analyzed = Classifier::new(capabilities)
            .log_unregistered(false)
            .classify(&tree)
            .map_err(|err| MemoryProviderError::InvalidQuery(err.to_string()))?;

        if analyzed.root_classification().is_supported() {
            Ok(())
        } else {
            Err(MemoryProviderError::Untranslatable(expr.to_string()))
        }
    }

    fn record(&self, expr: Expr) {
        match self.executed.lock() {
            Ok(mut executed) => executed.push(expr),
            Err(poisoned) => poisoned.into_inner().push(expr),
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryProvider for MemoryProvider {
    type Error = MemoryProviderError;

    fn execute(&self, query: &ProviderQuery) -> Result<RowStream<'_, Self::Error>, Self::Error> {
        self.check_translatable(query)?;

        let expr = query.to_expr();
        let (source, plan) = DeferredPlan::lower_sequence(&expr)
            .ok_or_else(|| MemoryProviderError::InvalidQuery(expr.to_string()))?;
        let rows = self
            .collections
            .get(&source)
            .ok_or_else(|| MemoryProviderError::UnknownCollection(source.clone()))?;
        self.record(expr);

        let evaluator = DeferredEvaluator::new(Arc::clone(&self.functions));
        let results = evaluator
            .apply(&plan, rows.iter().cloned().map(Ok::<_, Infallible>))
            .map(|row| row.map_err(MemoryProviderError::from));

        match self.fail_after {
            None => Ok(Box::new(results)),
            Some(limit) => {
                let mut results = results;
                let mut yielded = 0;
                let mut failed = false;
                Ok(Box::new(std::iter::from_fn(move || {
                    if failed {
                        return None;
                    }
                    if yielded == limit {
                        failed = true;
                        return Some(Err(MemoryProviderError::StreamInterrupted { after: yielded }));
                    }
                    let row = results.next()?;
                    yielded += 1;
                    Some(row)
                })))
            }
        }
    }
}
