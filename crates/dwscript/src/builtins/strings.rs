//! String built-ins (§4.H, plus the `Def`-suffixed and case/trim helpers
//! SPEC_FULL.md's component H adds to complete the pattern the spec's own
//! `VarToIntDef`/`VarToFloatDef` pairing implies).

use crate::ast::{Expr, Position};
use crate::coerce::{as_integer, as_string};
use crate::env::Environment;
use crate::errors::{EvalResult, RuntimeError};
use crate::eval::Evaluator;
use crate::value::Value;

use super::Builtin;

fn parse_radix(s: &str, radix: u32, prefixes: &[&str]) -> Option<i64> {
    let trimmed = s.trim();
    let negative = trimmed.starts_with('-');
    let unsigned = trimmed.trim_start_matches('-');
    let digits = prefixes
        .iter()
        .find_map(|p| unsigned.strip_prefix(p))
        .unwrap_or(unsigned);
    i64::from_str_radix(digits, radix).ok().map(|n| if negative { -n } else { n })
}

pub(crate) fn dispatch(_ev: &Evaluator, b: Builtin, args: &[Value], pos: Position) -> EvalResult<Value> {
    use Builtin::*;
    match b {
        Length => match args.first() {
            Some(Value::Str(s)) => Ok(Value::Integer(s.chars().count() as i64)),
            Some(Value::Array(a)) => Ok(Value::Integer(a.borrow().elements.len() as i64)),
            Some(other) => Err(RuntimeError::new(pos, format!("type mismatch: Length expects a String or array, found {}", other.type_name())).into()),
            None => Err(RuntimeError::new(pos, "Length requires one argument").into()),
        },
        IntToStr => {
            let v = args.first().ok_or_else(|| RuntimeError::new(pos, "IntToStr requires one argument"))?;
            Ok(Value::Str(as_integer(v, pos)?.to_string()))
        }
        FloatToStr => {
            let v = args.first().ok_or_else(|| RuntimeError::new(pos, "FloatToStr requires one argument"))?;
            Ok(Value::Str(Value::Float(crate::coerce::as_float(v, pos)?).display_string()))
        }
        StrToInt => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "StrToInt requires one argument"))?, pos)?;
            s.trim()
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|_| RuntimeError::new(pos, format!("'{s}' is not a valid integer")).into())
        }
        StrToFloat => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "StrToFloat requires one argument"))?, pos)?;
            s.trim()
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| RuntimeError::new(pos, format!("'{s}' is not a valid float")).into())
        }
        StrToIntDef => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "StrToIntDef requires two arguments"))?, pos)?;
            let default = args.get(1).ok_or_else(|| RuntimeError::new(pos, "StrToIntDef requires two arguments"))?;
            Ok(s.trim().parse::<i64>().map(Value::Integer).unwrap_or_else(|_| default.clone()))
        }
        StrToFloatDef => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "StrToFloatDef requires two arguments"))?, pos)?;
            let default = args.get(1).ok_or_else(|| RuntimeError::new(pos, "StrToFloatDef requires two arguments"))?;
            Ok(s.trim().parse::<f64>().map(Value::Float).unwrap_or_else(|_| default.clone()))
        }
        HexToInt => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "HexToInt requires one argument"))?, pos)?;
            parse_radix(&s, 16, &["0x", "0X", "$"])
                .map(Value::Integer)
                .ok_or_else(|| RuntimeError::new(pos, format!("'{s}' is not a valid hexadecimal integer")).into())
        }
        BinToInt => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "BinToInt requires one argument"))?, pos)?;
            parse_radix(&s, 2, &["0b", "0B"])
                .map(Value::Integer)
                .ok_or_else(|| RuntimeError::new(pos, format!("'{s}' is not a valid binary integer")).into())
        }
        Copy => {
            let s = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "Copy requires a string argument"))?, pos)?;
            let start = as_integer(args.get(1).ok_or_else(|| RuntimeError::new(pos, "Copy requires an index argument"))?, pos)?;
            let count = match args.get(2) {
                Some(v) => as_integer(v, pos)?,
                None => i64::MAX,
            };
            let chars: Vec<char> = s.chars().collect();
            let skip = (start - 1).max(0) as usize;
            let taken: String = chars.into_iter().skip(skip).take(count.max(0) as usize).collect();
            Ok(Value::Str(taken))
        }
        Pos => {
            let needle = as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "Pos requires two string arguments"))?, pos)?;
            let haystack = as_string(args.get(1).ok_or_else(|| RuntimeError::new(pos, "Pos requires two string arguments"))?, pos)?;
            let chars: Vec<char> = haystack.chars().collect();
            let needle_chars: Vec<char> = needle.chars().collect();
            if needle_chars.is_empty() {
                return Ok(Value::Integer(0));
            }
            let found = chars
                .windows(needle_chars.len())
                .position(|w| w == needle_chars.as_slice())
                .map(|i| i as i64 + 1)
                .unwrap_or(0);
            Ok(Value::Integer(found))
        }
        UpperCase => Ok(Value::Str(as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "UpperCase requires one argument"))?, pos)?.to_uppercase())),
        LowerCase => Ok(Value::Str(as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "LowerCase requires one argument"))?, pos)?.to_lowercase())),
        Trim => Ok(Value::Str(as_string(args.first().ok_or_else(|| RuntimeError::new(pos, "Trim requires one argument"))?, pos)?.trim().to_string())),
        _ => unreachable!("strings::dispatch called with a non-string builtin"),
    }
}

/// `SetLength(var target, n)` (§4.H): pads a string with spaces or
/// truncates it in place through its lvalue; a dynamic array target is
/// resized through its shared cell instead, needing no lvalue write-back.
pub(crate) fn eval_set_length(ev: &Evaluator, args: &[Expr], pos: Position, env: &Environment) -> EvalResult<Value> {
    let target = args.first().ok_or_else(|| RuntimeError::new(pos, "SetLength requires a variable argument"))?;
    let len_expr = args.get(1).ok_or_else(|| RuntimeError::new(pos, "SetLength requires a length argument"))?;
    let new_len = as_integer(&ev.eval_expr(len_expr, env)?.deref(), pos)?;
    if new_len < 0 {
        return Err(RuntimeError::new(pos, "SetLength requires a non-negative length").into());
    }
    let lv = ev.eval_lvalue(target, env)?;
    match lv.get() {
        Value::Str(s) => {
            let mut chars: Vec<char> = s.chars().collect();
            chars.resize(new_len as usize, ' ');
            lv.set(Value::Str(chars.into_iter().collect()))
        }
        Value::Array(arr) => {
            if !arr.borrow().descriptor.is_dynamic() {
                return Err(RuntimeError::new(pos, "SetLength cannot resize a static array").into());
            }
            arr.borrow_mut().elements.resize(new_len as usize, Value::Nil);
            Ok(())
        }
        other => Err(RuntimeError::new(pos, format!("type mismatch: SetLength expects String or dynamic array, found {}", other.type_name())).into()),
    }?;
    Ok(Value::Nil)
}
