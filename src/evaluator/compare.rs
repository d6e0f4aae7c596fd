//! Value comparison for local evaluation
//!
//! Ordering rules:
//! - null < bool < number < string < array < object
//! - numbers compare as f64, so `1` and `1.0` are equal
//! - arrays compare element-wise, then by length
//! - objects of equal type rank compare as equal (stable sorts keep input
//!   order)

use std::cmp::Ordering;

use serde_json::{Number, Value};

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used by `OrderBy`
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let (a_rank, b_rank) = (type_rank(a), type_rank(b));
    if a_rank != b_rank {
        return a_rank.cmp(&b_rank);
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare_values(l, r))
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => Ordering::Equal,
    }
}

/// Equality used by `==`, `!=` and `Distinct`; no coercion across types.
///
/// Numbers are equal when they have the same mathematical value, so `1` and
/// `1.0` are equal at any nesting depth.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => NumberKey::of(x) == NumberKey::of(y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(key, l)| y.get(key).map_or(false, |r| values_equal(l, r)))
        }
        _ => a == b,
    }
}

/// Exact numeric identity; integral floats share the integer key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum NumberKey {
    Integer(i128),
    Float(u64),
}

impl NumberKey {
    fn of(number: &Number) -> Self {
        if let Some(i) = number.as_i64() {
            return NumberKey::Integer(i128::from(i));
        }
        if let Some(u) = number.as_u64() {
            return NumberKey::Integer(i128::from(u));
        }
        let f = number.as_f64().unwrap_or(0.0);
        if f.fract() == 0.0 && f.abs() < 1e38 {
            NumberKey::Integer(f as i128)
        } else {
            NumberKey::Float(f.to_bits())
        }
    }
}

/// Hashable form of a value; two values have equal keys exactly when
/// `values_equal` holds
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum ValueKey {
    Null,
    Bool(bool),
    Number(NumberKey),
    String(String),
    Array(Vec<ValueKey>),
    /// Fields sorted by name
    Object(Vec<(String, ValueKey)>),
}

impl ValueKey {
    pub(crate) fn of(value: &Value) -> Self {
        match value {
            Value::Null => ValueKey::Null,
            Value::Bool(b) => ValueKey::Bool(*b),
            Value::Number(n) => ValueKey::Number(NumberKey::of(n)),
            Value::String(s) => ValueKey::String(s.clone()),
            Value::Array(items) => ValueKey::Array(items.iter().map(ValueKey::of).collect()),
            Value::Object(fields) => {
                let mut fields: Vec<(String, ValueKey)> = fields
                    .iter()
                    .map(|(name, value)| (name.clone(), ValueKey::of(value)))
                    .collect();
                fields.sort_by(|a, b| a.0.cmp(&b.0));
                ValueKey::Object(fields)
            }
        }
    }
}

/// Ordering used by `<`, `<=`, `>`, `>=`.
///
/// Only numbers, strings, and booleans of the same type are comparable;
/// anything else yields `None`, which makes the comparison false.
pub fn partial_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}
