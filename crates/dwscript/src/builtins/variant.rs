//! Variant built-ins (§4.H): `VarType`/`VarIs*` introspect a boxed
//! [`crate::value::VariantData`], the `VarTo*` family coerces its wrapped
//! value, and `VarClear` resets a variant variable back to "unassigned"
//! through its lvalue.

use crate::ast::{Expr, Position};
use crate::coerce::{as_float, as_integer, as_string};
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::Evaluator;
use crate::value::Value;

use super::Builtin;

/// Unwraps one layer of `Variant` boxing; any other value passes through
/// unchanged so the `VarTo*` family also accepts a plain already-typed
/// value (DWScript's variants interoperate freely with concrete types).
fn unwrap(v: &Value) -> Value {
    match v {
        Value::Variant(b) => b.inner.clone().unwrap_or(Value::Null),
        other => other.clone(),
    }
}

pub(crate) fn dispatch(_ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    let v = args.first().ok_or_else(|| RuntimeError::new(pos, format!("{b} requires one argument")))?;
    match b {
        VarType => Ok(Value::Str(
            match v {
                Value::Variant(data) => match &data.inner {
                    None => "Empty",
                    Some(Value::Null) => "Null",
                    Some(Value::Integer(_)) => "Integer",
                    Some(Value::Float(_)) => "Float",
                    Some(Value::Str(_)) => "String",
                    Some(Value::Boolean(_)) => "Boolean",
                    Some(_) => "Variant",
                },
                other => other.type_name(),
            }
            .to_string(),
        )),
        VarIsNull => Ok(Value::Boolean(matches!(v, Value::Variant(d) if matches!(d.inner, Some(Value::Null))))),
        VarIsEmpty => Ok(Value::Boolean(matches!(v, Value::Variant(d) if d.inner.is_none()))),
        VarIsNumeric => Ok(Value::Boolean(matches!(unwrap(v), Value::Integer(_) | Value::Float(_)))),
        VarToStr => Ok(Value::Str(unwrap(v).display_string())),
        VarToInt => Ok(Value::Integer(as_integer(&unwrap(v), pos)?)),
        VarToFloat => Ok(Value::Float(as_float(&unwrap(v), pos)?)),
        VarToIntDef => {
            let default = args.get(1).ok_or_else(|| RuntimeError::new(pos, "VarToIntDef requires two arguments"))?;
            Ok(as_integer(&unwrap(v), pos).map(Value::Integer).unwrap_or_else(|_| default.clone()))
        }
        VarToFloatDef => {
            let default = args.get(1).ok_or_else(|| RuntimeError::new(pos, "VarToFloatDef requires two arguments"))?;
            Ok(as_float(&unwrap(v), pos).map(Value::Float).unwrap_or_else(|_| default.clone()))
        }
        VarAsType => {
            let type_name = as_string(args.get(1).ok_or_else(|| RuntimeError::new(pos, "VarAsType requires two arguments"))?, pos)?;
            let coerced = match type_name.to_lowercase().as_str() {
                "integer" => Value::Integer(as_integer(&unwrap(v), pos)?),
                "float" => Value::Float(as_float(&unwrap(v), pos)?),
                "string" => Value::Str(unwrap(v).display_string()),
                "boolean" => Value::Boolean(unwrap(v).truthy(pos)?),
                other => return Err(RuntimeError::new(pos, format!("VarAsType: unknown target type '{other}'")).into()),
            };
            Ok(Value::boxed_variant(coerced))
        }
        _ => unreachable!("variant::dispatch called with a non-variant builtin"),
    }
}

pub(crate) fn eval_var_clear(ev: &Evaluator, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
    let target = args.first().ok_or_else(|| RuntimeError::new(pos, "VarClear requires a variable argument"))?;
    let lv = ev.eval_lvalue(target, env)?;
    lv.set(Value::unassigned_variant())?;
    Ok(Value::Nil)
}
