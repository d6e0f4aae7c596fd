//! Applies a deferred plan to provider rows.
//!
//! Operations are applied in plan order, each wrapping the previous stage's
//! iterator. Scan, filter, project, skip, take, and distinct stream row by
//! row; order_by buffers its whole input on the first pull.
//!
//! The first error ends the sequence. Upstream errors are yielded as
//! `EvalError::Upstream` carrying the row source's own error; nothing is
//! pulled from the source after that.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use crate::decomposer::{DeferredOperation, DeferredPlan};
use crate::expr::{Expr, SortDirection};
use crate::observability::{EngineMetrics, Event, Logger};

use super::compare::{compare_values, ValueKey};
use super::errors::{BoxError, EvalError, EvalResult};
use super::functions::FunctionRegistry;
use super::scalar::ScalarEvaluator;

type Stage<'a> = Box<dyn Iterator<Item = EvalResult<Value>> + 'a>;

/// Lazily evaluated result rows
pub struct DeferredRows<'a> {
    inner: Stage<'a>,
}

impl<'a> DeferredRows<'a> {
    /// Drains the sequence, stopping at the first error
    pub fn collect_rows(self) -> EvalResult<Vec<Value>> {
        self.collect()
    }
}

impl Iterator for DeferredRows<'_> {
    type Item = EvalResult<Value>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

/// Evaluates deferred plans
#[derive(Debug, Clone, Default)]
pub struct DeferredEvaluator {
    functions: Arc<FunctionRegistry>,
    metrics: Option<Arc<EngineMetrics>>,
}

impl DeferredEvaluator {
    pub fn new(functions: Arc<FunctionRegistry>) -> Self {
        Self {
            functions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Applies `plan` to `rows`.
    ///
    /// Nothing is pulled from `rows` until the result is iterated.
    pub fn apply<'a, I, E>(&self, plan: &DeferredPlan, rows: I) -> DeferredRows<'a>
    where
        I: IntoIterator<Item = Result<Value, E>>,
        I::IntoIter: 'a,
        E: Into<BoxError> + 'a,
    {
        let source = rows
            .into_iter()
            .map(|row| row.map_err(EvalError::upstream));
        let mut stage: Stage<'a> = Box::new(stop_after_error(source));

        for op in plan.iter() {
            stage = self.stage(stage, op.operation.clone());
        }

        DeferredRows {
            inner: Box::new(self.observe(stage)),
        }
    }

    fn stage<'a>(&self, input: Stage<'a>, operation: DeferredOperation) -> Stage<'a> {
        let functions = Arc::clone(&self.functions);

        match operation {
            DeferredOperation::Scan { .. } => input,
            DeferredOperation::Filter { predicate } => {
                Box::new(input.filter_map(move |row| {
                    let row = match row {
                        Ok(row) => row,
                        Err(err) => return Some(Err(err)),
                    };
                    match ScalarEvaluator::new(&functions).test(&predicate, &row) {
                        Ok(true) => Some(Ok(row)),
                        Ok(false) => None,
                        Err(err) => Some(Err(err)),
                    }
                }))
            }
            DeferredOperation::Project { selector } => Box::new(input.map(move |row| {
                let row = row?;
                ScalarEvaluator::new(&functions).apply_lambda(&selector, &row)
            })),
            DeferredOperation::OrderBy { key, direction } => {
                let mut pending = Some(input);
                let mut sorted: Option<std::vec::IntoIter<EvalResult<Value>>> = None;
                Box::new(std::iter::from_fn(move || {
                    if let Some(input) = pending.take() {
                        sorted = Some(sort_rows(input, &key, direction, &functions).into_iter());
                    }
                    sorted.as_mut()?.next()
                }))
            }
            DeferredOperation::Skip(count) => {
                let mut remaining = count;
                Box::new(input.filter(move |row| {
                    if row.is_err() || remaining == 0 {
                        return true;
                    }
                    remaining -= 1;
                    false
                }))
            }
            DeferredOperation::Take(count) => {
                let mut input = input;
                let mut remaining = count;
                // Stops pulling once `count` rows have been yielded
                Box::new(std::iter::from_fn(move || {
                    if remaining == 0 {
                        return None;
                    }
                    let row = input.next()?;
                    if row.is_ok() {
                        remaining -= 1;
                    }
                    Some(row)
                }))
            }
            DeferredOperation::Distinct => {
                let mut seen: HashSet<ValueKey> = HashSet::new();
                Box::new(input.filter(move |row| match row {
                    Ok(value) => seen.insert(ValueKey::of(value)),
                    Err(_) => true,
                }))
            }
        }
    }

    /// Final stage: stops after the first error and records outcomes
    fn observe<'a>(&self, stage: Stage<'a>) -> impl Iterator<Item = EvalResult<Value>> + 'a {
        let metrics = self.metrics.clone();
        stop_after_error(stage).inspect(move |row| match row {
            Ok(_) => {
                if let Some(metrics) = &metrics {
                    metrics.increment_rows_evaluated();
                }
            }
            Err(err) => {
                if let Some(metrics) = &metrics {
                    if err.is_upstream() {
                        metrics.increment_upstream_failures();
                    }
                }
                let (upstream, error) = (err.is_upstream().to_string(), err.to_string());
                Logger::emit(
                    Event::DeferredEvaluationFailed,
                    &[("error", error.as_str()), ("upstream", upstream.as_str())],
                );
            }
        })
    }
}

/// Yields items up to and including the first error, then ends
fn stop_after_error<'a, I>(mut rows: I) -> impl Iterator<Item = EvalResult<Value>> + 'a
where
    I: Iterator<Item = EvalResult<Value>> + 'a,
{
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed {
            return None;
        }
        let row = rows.next()?;
        failed = row.is_err();
        Some(row)
    })
}

/// Stable sort by key; an error replaces the whole output
fn sort_rows(
    input: Stage<'_>,
    key: &Expr,
    direction: SortDirection,
    functions: &FunctionRegistry,
) -> Vec<EvalResult<Value>> {
    let evaluator = ScalarEvaluator::new(functions);
    let mut keyed: Vec<(Value, Value)> = Vec::new();

    for row in input {
        let row = match row {
            Ok(row) => row,
            Err(err) => return vec![Err(err)],
        };
        match evaluator.apply_lambda(key, &row) {
            Ok(sort_key) => keyed.push((sort_key, row)),
            Err(err) => return vec![Err(err)],
        }
    }

    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_values(a, b);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    keyed.into_iter().map(|(_, row)| Ok(row)).collect()
}
