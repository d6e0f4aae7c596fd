//! Scalar expression evaluation against a bound row

use serde_json::{Map, Number, Value};

use crate::expr::{BinaryOp, Expr, ExprKind, UnaryOp};

use super::compare::{partial_compare, values_equal};
use super::errors::{EvalError, EvalResult};
use super::functions::FunctionRegistry;

/// Lambda parameter bound to a row
#[derive(Debug, Clone, Copy)]
pub struct Binding<'v> {
    pub param: &'v str,
    pub row: &'v Value,
}

/// Evaluates scalar expressions
#[derive(Debug, Clone, Copy)]
pub struct ScalarEvaluator<'f> {
    functions: &'f FunctionRegistry,
}

impl<'f> ScalarEvaluator<'f> {
    pub fn new(functions: &'f FunctionRegistry) -> Self {
        Self { functions }
    }

    /// Applies a one-parameter lambda to `row`
    pub fn apply_lambda(&self, lambda: &Expr, row: &Value) -> EvalResult<Value> {
        match (lambda.kind(), lambda.children()) {
            (ExprKind::Lambda { param }, [body]) => self.eval(body, Some(Binding { param, row })),
            (kind, _) => Err(EvalError::type_mismatch(
                "lambda application",
                format!("expected a lambda, got {}", kind.kind_name()),
            )),
        }
    }

    /// Applies a predicate lambda; `null` counts as false
    pub fn test(&self, predicate: &Expr, row: &Value) -> EvalResult<bool> {
        match self.apply_lambda(predicate, row)? {
            Value::Bool(keep) => Ok(keep),
            Value::Null => Ok(false),
            other => Err(EvalError::NonBooleanPredicate(other.to_string())),
        }
    }

    /// Evaluates `expr` with an optional parameter binding
    pub fn eval(&self, expr: &Expr, binding: Option<Binding<'_>>) -> EvalResult<Value> {
        let children = expr.children();
        let arg = |i: usize| {
            children.get(i).ok_or_else(|| {
                EvalError::type_mismatch(expr.kind().kind_name(), format!("missing operand {}", i))
            })
        };

        match expr.kind() {
            ExprKind::Parameter { name } => match binding {
                Some(binding) if binding.param == name => Ok(binding.row.clone()),
                _ => Err(EvalError::UnboundParameter(name.clone())),
            },
            ExprKind::Constant { value } => Ok(value.clone()),
            ExprKind::Member { name } => match self.eval(arg(0)?, binding)? {
                Value::Object(mut fields) => Ok(fields.remove(name).unwrap_or(Value::Null)),
                Value::Null => Ok(Value::Null),
                other => Err(EvalError::type_mismatch(
                    format!("member '{}'", name),
                    format!("expected an object, got {}", other),
                )),
            },
            ExprKind::Binary { op } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    let lhs = truthy(*op, self.eval(arg(0)?, binding)?)?;
                    // Short-circuit
                    if (*op == BinaryOp::And && !lhs) || (*op == BinaryOp::Or && lhs) {
                        return Ok(Value::Bool(lhs));
                    }
                    let rhs = truthy(*op, self.eval(arg(1)?, binding)?)?;
                    Ok(Value::Bool(rhs))
                }
                _ => {
                    let lhs = self.eval(arg(0)?, binding)?;
                    let rhs = self.eval(arg(1)?, binding)?;
                    binary(*op, &lhs, &rhs)
                }
            },
            ExprKind::Unary { op } => unary(*op, self.eval(arg(0)?, binding)?),
            ExprKind::Call { function } => {
                let args = children
                    .iter()
                    .map(|child| self.eval(child, binding))
                    .collect::<EvalResult<Vec<Value>>>()?;
                self.functions.call(function, &args)
            }
            ExprKind::Construct { fields } => {
                let mut row = Map::new();
                for (i, field) in fields.iter().enumerate() {
                    row.insert(field.clone(), self.eval(arg(i)?, binding)?);
                }
                Ok(Value::Object(row))
            }
            kind => Err(EvalError::NotScalar(kind.kind_name().to_string())),
        }
    }
}

/// Logical operand; `null` counts as false
fn truthy(op: BinaryOp, value: Value) -> EvalResult<bool> {
    match value {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        other => Err(EvalError::type_mismatch(
            op.as_str(),
            format!("expected a boolean, got {}", other),
        )),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let compare = |accept: fn(std::cmp::Ordering) -> bool| -> EvalResult<Value> {
        Ok(Value::Bool(partial_compare(lhs, rhs).map_or(false, accept)))
    };

    match op {
        BinaryOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),
        BinaryOp::Lt => compare(|o| o.is_lt()),
        BinaryOp::Le => compare(|o| o.is_le()),
        BinaryOp::Gt => compare(|o| o.is_gt()),
        BinaryOp::Ge => compare(|o| o.is_ge()),
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs)
        }
        BinaryOp::And | BinaryOp::Or => Ok(Value::Bool(
            truthy(op, lhs.clone())? && truthy(op, rhs.clone())?,
        )),
    }
}

/// Arithmetic on numbers.
///
/// `null` operands yield `null`. Integer results stay integral unless they
/// overflow or a division is inexact, in which case f64 is used. Results
/// that are not finite become `null`. `+` also concatenates two strings.
fn arithmetic(op: BinaryOp, lhs: &Value, rhs: &Value) -> EvalResult<Value> {
    let (a, b) = match (lhs, rhs) {
        (Value::Null, _) | (_, Value::Null) => return Ok(Value::Null),
        (Value::String(a), Value::String(b)) if op == BinaryOp::Add => {
            return Ok(Value::String(format!("{}{}", a, b)))
        }
        (Value::Number(a), Value::Number(b)) => (a, b),
        _ => {
            return Err(EvalError::type_mismatch(
                op.as_str(),
                format!("cannot apply '{}' to {} and {}", op.symbol(), lhs, rhs),
            ))
        }
    };

    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        if y == 0 && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
            return Err(EvalError::DivisionByZero);
        }
        let exact = match op {
            BinaryOp::Add => x.checked_add(y),
            BinaryOp::Sub => x.checked_sub(y),
            BinaryOp::Mul => x.checked_mul(y),
            BinaryOp::Div if x.checked_rem(y) == Some(0) => x.checked_div(y),
            BinaryOp::Rem => x.checked_rem(y),
            _ => None,
        };
        if let Some(result) = exact {
            return Ok(Value::from(result));
        }
    }

    let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
    if y == 0.0 && matches!(op, BinaryOp::Div | BinaryOp::Rem) {
        return Err(EvalError::DivisionByZero);
    }
    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
        _ => x % y,
    };
    Ok(Number::from_f64(result).map_or(Value::Null, Value::Number))
}

fn unary(op: UnaryOp, operand: Value) -> EvalResult<Value> {
    match (op, operand) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Number(n)) => {
            if let Some(negated) = n.as_i64().and_then(i64::checked_neg) {
                return Ok(Value::from(negated));
            }
            let f = -n.as_f64().unwrap_or(0.0);
            Ok(Number::from_f64(f).map_or(Value::Null, Value::Number))
        }
        (op, other) => Err(EvalError::type_mismatch(
            op.as_str(),
            format!("cannot apply '{}' to {}", op.symbol(), other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_on(expr: Expr, row: Value) -> EvalResult<Value> {
        let functions = FunctionRegistry::with_builtins();
        ScalarEvaluator::new(&functions).apply_lambda(&Expr::lambda("r", expr), &row)
    }

    fn r() -> Expr {
        Expr::param("r")
    }

    #[test]
    fn test_member_access() {
        let row = json!({"name": "ada", "address": {"city": "london"}});
        assert_eq!(eval_on(r().member("name"), row.clone()).unwrap(), json!("ada"));
        assert_eq!(
            eval_on(r().member("address").member("city"), row.clone()).unwrap(),
            json!("london")
        );
        assert_eq!(eval_on(r().member("missing"), row.clone()).unwrap(), json!(null));
        assert_eq!(eval_on(r().member("missing").member("x"), row).unwrap(), json!(null));
    }

    #[test]
    fn test_member_on_scalar_is_type_mismatch() {
        let err = eval_on(r().member("age"), json!(3)).unwrap_err();
        assert!(matches!(err, EvalError::TypeMismatch { .. }));
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_on(Expr::mul(r(), Expr::constant(2)), json!(21)).unwrap(), json!(42));
        assert_eq!(eval_on(Expr::rem(r(), Expr::constant(2)), json!(7)).unwrap(), json!(1));
        assert_eq!(
            eval_on(Expr::binary(BinaryOp::Div, r(), Expr::constant(2)), json!(7)).unwrap(),
            json!(3.5)
        );
        assert_eq!(
            eval_on(Expr::binary(BinaryOp::Div, r(), Expr::constant(2)), json!(8)).unwrap(),
            json!(4)
        );
        assert_eq!(eval_on(Expr::add(r(), Expr::constant(1)), json!(null)).unwrap(), json!(null));
        assert_eq!(
            eval_on(Expr::add(r(), Expr::constant("!")), json!("hi")).unwrap(),
            json!("hi!")
        );
    }

    #[test]
    fn test_integer_overflow_falls_back_to_float() {
        let value = eval_on(Expr::add(r(), Expr::constant(1)), json!(i64::MAX)).unwrap();
        assert!(value.is_f64());
    }

    #[test]
    fn test_division_by_zero() {
        let err = eval_on(Expr::rem(r(), Expr::constant(0)), json!(4)).unwrap_err();
        assert!(matches!(err, EvalError::DivisionByZero));
    }

    #[test]
    fn test_comparisons_and_logic() {
        let adult = Expr::and(
            Expr::ge(r().member("age"), Expr::constant(18)),
            Expr::not(r().member("banned")),
        );
        assert_eq!(eval_on(adult.clone(), json!({"age": 30, "banned": false})).unwrap(), json!(true));
        assert_eq!(eval_on(adult, json!({"age": 12, "banned": 7})).unwrap(), json!(false));

        // Incompatible types never compare
        assert_eq!(eval_on(Expr::gt(r(), Expr::constant(1)), json!("5")).unwrap(), json!(false));
    }

    #[test]
    fn test_construct_and_call() {
        let expr = Expr::construct(vec![
            ("upper".to_string(), Expr::call("upper", vec![r().member("name")])),
            ("one".to_string(), Expr::constant(1)),
        ]);
        assert_eq!(
            eval_on(expr, json!({"name": "ada"})).unwrap(),
            json!({"upper": "ADA", "one": 1})
        );
    }

    #[test]
    fn test_unbound_parameter() {
        let err = eval_on(Expr::param("other"), json!(1)).unwrap_err();
        assert!(matches!(err, EvalError::UnboundParameter(name) if name == "other"));
    }

    #[test]
    fn test_predicate_requires_boolean() {
        let functions = FunctionRegistry::with_builtins();
        let evaluator = ScalarEvaluator::new(&functions);

        assert!(evaluator.test(&Expr::lambda("r", r()), &json!(true)).unwrap());
        assert!(!evaluator.test(&Expr::lambda("r", r()), &json!(null)).unwrap());
        assert!(matches!(
            evaluator.test(&Expr::lambda("r", r()), &json!(1)),
            Err(EvalError::NonBooleanPredicate(_))
        ));
    }

    #[test]
    fn test_sequence_in_scalar_position() {
        let functions = FunctionRegistry::with_builtins();
        let err = ScalarEvaluator::new(&functions)
            .eval(&Expr::source("t"), None)
            .unwrap_err();
        assert!(matches!(err, EvalError::NotScalar(kind) if kind == "source"));
    }
}
