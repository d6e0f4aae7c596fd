//! Deferral engine
//!
//! Ties the passes together for one query:
//!
//! 1. build and validate the `ExprTree`
//! 2. classify it against the rule registry
//! 3. decompose it into provider query and deferred plan
//! 4. execute the provider query and apply the plan to its rows
//!
//! An engine is immutable once built and can be shared across threads.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::classifier::{AnalyzedTree, Classifier, ClassifierError, RuleRegistry};
use crate::config::{ConfigError, EngineConfig};
use crate::decomposer::{Decomposer, Decomposition, DeferredPlan, Explain, ProviderQuery};
use crate::evaluator::{BoxError, DeferredEvaluator, DeferredRows, EvalError, FunctionRegistry};
use crate::expr::{Expr, ExprTree, TreeError};
use crate::observability::{EngineMetrics, Event, Logger, MetricsSnapshot};
use crate::provider::QueryProvider;

/// Any failure while analyzing or executing a query
#[derive(Debug, Error)]
pub enum DeferError {
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Classification(#[from] ClassifierError),

    #[error(transparent)]
    Evaluation(#[from] EvalError),

    /// The provider refused the query
    #[error("provider rejected query: {0}")]
    Provider(#[source] BoxError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Classified tree and its decomposition
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub analyzed: AnalyzedTree,
    pub decomposition: Decomposition,
}

impl Analysis {
    pub fn provider_query(&self) -> &ProviderQuery {
        &self.decomposition.provider_query
    }

    pub fn deferred_plan(&self) -> &DeferredPlan {
        &self.decomposition.deferred_plan
    }

    pub fn explain(&self) -> Explain {
        self.decomposition.explain(&self.analyzed)
    }
}

/// Query deferral engine
pub struct DeferralEngine {
    registry: Arc<RuleRegistry>,
    functions: Arc<FunctionRegistry>,
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
}

impl DeferralEngine {
    /// Engine over an existing registry.
    ///
    /// Only the decomposition and logging settings of `config` are used;
    /// its capability lists are ignored.
    pub fn new(
        registry: Arc<RuleRegistry>,
        functions: Arc<FunctionRegistry>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            functions,
            config,
            metrics: Arc::new(EngineMetrics::new()),
        }
    }

    /// Engine whose registry is built from the config's capability lists,
    /// with the builtin local functions
    pub fn from_config(config: &EngineConfig) -> Result<Self, DeferError> {
        let registry = config.build_registry()?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(FunctionRegistry::with_builtins()),
            config.clone(),
        ))
    }

    pub fn registry(&self) -> &Arc<RuleRegistry> {
        &self.registry
    }

    pub fn functions(&self) -> &Arc<FunctionRegistry> {
        &self.functions
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Classifies and decomposes `expr`
    pub fn analyze(&self, expr: &Expr) -> Result<Analysis, DeferError> {
        let tree = ExprTree::new(expr.clone())?;

        let analyzed = Classifier::new(&self.registry)
            .with_metrics(&self.metrics)
            .log_unregistered(self.config.log_unregistered)
            .classify(&tree)?;

        let decomposition = Decomposer::new(&self.registry)
            .with_options(self.config.decompose_options())
            .with_metrics(&self.metrics)
            .decompose(&analyzed);

        Ok(Analysis {
            analyzed,
            decomposition,
        })
    }

    pub fn explain(&self, expr: &Expr) -> Result<Explain, DeferError> {
        Ok(self.analyze(expr)?.explain())
    }

    /// Applies a deferred plan to already fetched rows
    pub fn evaluate<'a, I, E>(&self, plan: &DeferredPlan, rows: I) -> DeferredRows<'a>
    where
        I: IntoIterator<Item = Result<Value, E>>,
        I::IntoIter: 'a,
        E: Into<BoxError> + 'a,
    {
        self.evaluator().apply(plan, rows)
    }

    /// Runs `expr` against `provider`, returning the lazy result sequence
    pub fn stream<'p, P>(&self, expr: &Expr, provider: &'p P) -> Result<DeferredRows<'p>, DeferError>
    where
        P: QueryProvider,
    {
        let analysis = self.analyze(expr)?;
        let query = analysis.provider_query();

        let rendered = query.to_string();
        Logger::emit(Event::ProviderExecute, &[("query", rendered.as_str())]);

        let rows = provider.execute(query).map_err(|err| {
            let error = err.to_string();
            Logger::emit(
                Event::ProviderFailed,
                &[("error", error.as_str()), ("query", rendered.as_str())],
            );
            DeferError::Provider(Box::new(err))
        })?;

        Ok(self.evaluator().apply(analysis.deferred_plan(), rows))
    }

    /// Runs `expr` against `provider` and collects every row
    pub fn execute<P>(&self, expr: &Expr, provider: &P) -> Result<Vec<Value>, DeferError>
    where
        P: QueryProvider,
    {
        Ok(self.stream(expr, provider)?.collect_rows()?)
    }

    fn evaluator(&self) -> DeferredEvaluator {
        DeferredEvaluator::new(Arc::clone(&self.functions)).with_metrics(Arc::clone(&self.metrics))
    }
}
