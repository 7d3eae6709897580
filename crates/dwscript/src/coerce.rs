//! Small coercion helpers shared by the Evaluator, operator-overload
//! dispatch, and the built-in library (SPEC_FULL.md component A) so the
//! §4.A coercion table has one implementation instead of three.

use crate::ast::Position;
use crate::errors::{EvalResult, RuntimeError};
use crate::value::Value;

pub fn as_integer(value: &Value, pos: Position) -> EvalResult<i64> {
    match value.deref() {
        Value::Integer(n) => Ok(n),
        Value::Subrange { value: n, .. } => Ok(n),
        Value::Enum(e) => Ok(e.ordinal),
        other => Err(RuntimeError::new(
            pos,
            format!("type mismatch: expected Integer, found {}", other.type_name()),
        )
        .into()),
    }
}

pub fn as_float(value: &Value, pos: Position) -> EvalResult<f64> {
    match value.deref() {
        Value::Integer(n) => Ok(n as f64),
        Value::Float(f) => Ok(f),
        other => Err(RuntimeError::new(
            pos,
            format!("type mismatch: expected Float, found {}", other.type_name()),
        )
        .into()),
    }
}

pub fn as_string(value: &Value, pos: Position) -> EvalResult<String> {
    match value.deref() {
        Value::Str(s) => Ok(s),
        other => Err(RuntimeError::new(
            pos,
            format!("type mismatch: expected String, found {}", other.type_name()),
        )
        .into()),
    }
}

pub fn as_bool(value: &Value, pos: Position) -> EvalResult<bool> {
    value.truthy(pos)
}
