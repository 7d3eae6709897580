//! Array built-ins (§4.H): `Low`/`High`/`Join` read without touching the
//! array's identity; `Add`/`Delete` mutate a dynamic array's backing
//! `Vec` in place through the shared `Rc<RefCell<..>>` cell, so unlike
//! `Inc`/`Dec`/`SetLength` they need no lvalue at all — mutating the
//! referenced cell is visible to every alias of the same array already.

use crate::ast::{Expr, Position};
use crate::coerce::{as_integer, as_string};
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::object::{array_high, array_low};
use crate::eval::Evaluator;
use crate::value::{ArrayRef, Value};

use super::Builtin;

fn expect_array(v: Value, pos: Position, name: &str) -> EvalResult<ArrayRef> {
    match v {
        Value::Array(a) => Ok(a),
        other => Err(RuntimeError::new(pos, format!("type mismatch: {name} expects an array, found {}", other.type_name())).into()),
    }
}

fn expect_dynamic(arr: &ArrayRef, pos: Position, name: &str) -> EvalResult<()> {
    if arr.borrow().descriptor.is_dynamic() {
        Ok(())
    } else {
        Err(RuntimeError::new(pos, format!("{name} requires a dynamic array")).into())
    }
}

pub(crate) fn dispatch(_ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    match b {
        Low => {
            let arr = expect_array(args.first().cloned().unwrap_or(Value::Nil), pos, "Low")?;
            Ok(Value::Integer(array_low(&arr.borrow())))
        }
        High => {
            let arr = expect_array(args.first().cloned().unwrap_or(Value::Nil), pos, "High")?;
            Ok(Value::Integer(array_high(&arr.borrow())))
        }
        Join => {
            let arr = expect_array(args.first().cloned().unwrap_or(Value::Nil), pos, "Join")?;
            let sep = match args.get(1) {
                Some(v) => as_string(v, pos)?,
                None => String::new(),
            };
            let parts: Vec<String> = arr.borrow().elements.iter().map(Value::display_string).collect();
            Ok(Value::Str(parts.join(&sep)))
        }
        _ => unreachable!("arrays::dispatch called with a non-array builtin"),
    }
}

pub(crate) fn eval_add(ev: &Evaluator, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
    let target = args.first().ok_or_else(|| RuntimeError::new(pos, "Add requires an array argument"))?;
    let arr = expect_array(ev.eval_expr(target, env)?.deref(), pos, "Add")?;
    expect_dynamic(&arr, pos, "Add")?;
    let value_expr = args.get(1).ok_or_else(|| RuntimeError::new(pos, "Add requires a value argument"))?;
    let value = ev.eval_expr(value_expr, env)?.deref();
    arr.borrow_mut().elements.push(value);
    Ok(Value::Nil)
}

pub(crate) fn eval_delete(ev: &Evaluator, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
    let target = args.first().ok_or_else(|| RuntimeError::new(pos, "Delete requires an array argument"))?;
    let arr = expect_array(ev.eval_expr(target, env)?.deref(), pos, "Delete")?;
    expect_dynamic(&arr, pos, "Delete")?;
    let idx_expr = args.get(1).ok_or_else(|| RuntimeError::new(pos, "Delete requires an index argument"))?;
    let idx = as_integer(&ev.eval_expr(idx_expr, env)?.deref(), pos)?;
    let count = match args.get(2) {
        Some(e) => as_integer(&ev.eval_expr(e, env)?.deref(), pos)?,
        None => 1,
    };
    let mut data = arr.borrow_mut();
    let len = data.elements.len() as i64;
    if idx < 0 || count < 0 || idx + count > len {
        return Err(RuntimeError::new(pos, format!("Delete range out of bounds: index {idx}, count {count}")).into());
    }
    let start = idx as usize;
    let end = (idx + count) as usize;
    data.elements.drain(start..end);
    Ok(Value::Nil)
}
