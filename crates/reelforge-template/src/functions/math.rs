use reelforge_common::{Error, Result, Value};

use super::arg;
use crate::registry::FunctionRegistry;

pub(super) fn register(registry: &FunctionRegistry) {
    registry.register("sum", |args| fold("sum", args, i64::checked_add, |a, b| a + b));
    registry.register("sub", |args| fold("sub", args, i64::checked_sub, |a, b| a - b));
    registry.register("mult", |args| fold("mult", args, i64::checked_mul, |a, b| a * b));
    registry.register("div", |args| fold("div", args, i64::checked_div, |a, b| a / b));
}

#[derive(Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn parse(function: &str, raw: &str) -> Result<Self> {
        if let Ok(i) = raw.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        raw.parse::<f64>()
            .map(Number::Float)
            .map_err(|_| Error::template_function(function, format!("not a number: {raw:?}")))
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

/// Left fold over two or more numeric arguments.
///
/// Stays in integer arithmetic while every operand is an integer, so
/// `div 7 2` is `3`; any float operand switches to float arithmetic.
fn fold(
    function: &str,
    args: &[&str],
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<String> {
    arg(function, args, 1)?;
    let mut acc = Number::parse(function, args[0])?;
    for raw in &args[1..] {
        let next = Number::parse(function, raw)?;
        acc = match (acc, next) {
            (Number::Int(a), Number::Int(b)) => Number::Int(int_op(a, b).ok_or_else(|| {
                Error::template_function(function, format!("invalid operands {a} and {b}"))
            })?),
            (a, b) => Number::Float(float_op(a.as_f64(), b.as_f64())),
        };
    }

    match acc {
        Number::Int(i) => Ok(i.to_string()),
        Number::Float(f) if f.is_finite() => Ok(Value::Float(f).to_string()),
        Number::Float(f) => Err(Error::template_function(function, format!("result is {f}"))),
    }
}
