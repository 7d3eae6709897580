//! `Inc`/`Dec`/`Succ`/`Pred`/`Ord`/`Assert` (§4.H "Math/ordinal" subset).
//!
//! `Inc`/`Dec` need the raw lvalue of their first argument (they mutate in
//! place, the same as `:=` would) so they're dispatched straight from
//! [`super::call_builtin`] on unevaluated `Expr`s rather than through the
//! common pre-evaluated-args path every other built-in uses.

use crate::ast::{Expr, Position};
use crate::builtins::Builtin;
use crate::coerce::as_integer;
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::Evaluator;
use crate::value::Value;

pub(crate) fn eval_inc_dec(
    ev: &Evaluator,
    builtin: Builtin,
    args: &[Expr],
    pos: Position,
    env: &Environment,
) -> EvalResult<Value> {
    let name = if builtin == Builtin::Inc { "Inc" } else { "Dec" };
    let target = args
        .first()
        .ok_or_else(|| RuntimeError::new(pos, format!("{name} requires a variable argument")))?;
    let lv = ev.eval_lvalue(target, env)?;
    let step = match args.get(1) {
        Some(e) => as_integer(&ev.eval_expr(e, env)?.deref(), pos)?,
        None => 1,
    };
    let current = lv.get();
    let updated = match &current {
        Value::Integer(n) => Value::Integer(if builtin == Builtin::Inc { n + step } else { n - step }),
        Value::Enum(e) => {
            if step.abs() >= 2 {
                return Err(RuntimeError::new(pos, format!("{name} on an enum by {step} is not allowed")).into());
            }
            let ordinal = if builtin == Builtin::Inc { e.ordinal + step } else { e.ordinal - step };
            Value::new_enum(e.enum_type.clone(), ordinal)
        }
        other => return Err(RuntimeError::new(pos, format!("type mismatch: {name} expects Integer or enum, found {}", other.type_name())).into()),
    };
    lv.set(updated)?;
    Ok(Value::Nil)
}

pub(crate) fn dispatch(ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    match b {
        Succ | Pred => {
            let v = args
                .first()
                .ok_or_else(|| RuntimeError::new(pos, "Succ/Pred requires one argument"))?;
            match v {
                Value::Integer(n) => Ok(Value::Integer(if b == Succ { n + 1 } else { n - 1 })),
                Value::Enum(e) => {
                    let ordinal = if b == Succ { e.ordinal + 1 } else { e.ordinal - 1 };
                    Ok(Value::new_enum(e.enum_type.clone(), ordinal))
                }
                other => Err(RuntimeError::new(pos, format!("type mismatch: Succ/Pred expects Integer or enum, found {}", other.type_name())).into()),
            }
        }
        Ord => {
            let v = args.first().ok_or_else(|| RuntimeError::new(pos, "Ord requires one argument"))?;
            match v {
                Value::Enum(e) => Ok(Value::Integer(e.ordinal)),
                Value::Integer(n) => Ok(Value::Integer(*n)),
                Value::Boolean(b) => Ok(Value::Integer(if *b { 1 } else { 0 })),
                Value::Str(s) if s.chars().count() == 1 => Ok(Value::Integer(s.chars().next().unwrap() as i64)),
                other => Err(RuntimeError::new(pos, format!("type mismatch: Ord expects an ordinal value, found {}", other.type_name())).into()),
            }
        }
        Assert => {
            let cond = args.first().ok_or_else(|| RuntimeError::new(pos, "Assert requires a condition"))?;
            if cond.truthy(pos)? {
                return Ok(Value::Nil);
            }
            let msg = match args.get(1) {
                Some(Value::Str(s)) => format!("Assertion failed [line: {}, column: {}] : {s}", pos.line, pos.column),
                _ => format!("Assertion failed [line: {}, column: {}]", pos.line, pos.column),
            };
            Err(ev.new_exception_unwind(&ev.exceptions.e_assertion_failed.clone(), msg))
        }
        _ => unreachable!("ordinal::dispatch called with a non-ordinal builtin"),
    }
}
